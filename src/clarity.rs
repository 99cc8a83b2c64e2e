//! Clarity typed-value serialization
//!
//! Read-only contract calls exchange arguments and results as hex-encoded
//! consensus-serialized values. This module covers the subset of the wire
//! format the payment, registry and token contracts use, plus the textual
//! `repr` the indexer prints for function arguments.

use serde_json::{json, Value};

use crate::c32::{c32_address, c32_address_decode};
use crate::error::StackPayError;

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_TRUE: u8 = 0x03;
const TYPE_FALSE: u8 = 0x04;
const TYPE_STANDARD_PRINCIPAL: u8 = 0x05;
const TYPE_CONTRACT_PRINCIPAL: u8 = 0x06;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_NONE: u8 = 0x09;
const TYPE_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;
const TYPE_STRING_UTF8: u8 = 0x0e;

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    StandardPrincipal { version: u8, hash160: [u8; 20] },
    ContractPrincipal { version: u8, hash160: [u8; 20], name: String },
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    /// Fields keep their wire order
    Tuple(Vec<(String, ClarityValue)>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn uint(value: impl Into<u128>) -> Self {
        Self::UInt(value.into())
    }

    /// `string-ascii` value; non-ASCII input is rejected
    pub fn ascii(text: &str) -> Result<Self, StackPayError> {
        if !text.is_ascii() {
            return Err(StackPayError::Codec(format!(
                "string-ascii value contains non-ASCII characters: {}",
                text
            )));
        }
        Ok(Self::StringAscii(text.to_string()))
    }

    pub fn utf8(text: &str) -> Self {
        Self::StringUtf8(text.to_string())
    }

    pub fn some(value: ClarityValue) -> Self {
        Self::OptionalSome(Box::new(value))
    }

    /// Standard (`ST…`) or contract (`ST….name`) principal
    pub fn principal(text: &str) -> Result<Self, StackPayError> {
        match text.split_once('.') {
            Some((address, name)) => {
                let (version, hash160) = c32_address_decode(address)?;
                if name.is_empty() || name.len() > 128 {
                    return Err(StackPayError::InvalidAddress(text.to_string()));
                }
                Ok(Self::ContractPrincipal {
                    version,
                    hash160,
                    name: name.to_string(),
                })
            }
            None => {
                let (version, hash160) = c32_address_decode(text)?;
                Ok(Self::StandardPrincipal { version, hash160 })
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Principal rendered back to its address form
    pub fn as_principal(&self) -> Option<String> {
        match self {
            Self::StandardPrincipal { version, hash160 } => Some(c32_address(*version, hash160)),
            Self::ContractPrincipal {
                version,
                hash160,
                name,
            } => Some(format!("{}.{}", c32_address(*version, hash160), name)),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringAscii(s) | Self::StringUtf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn tuple_field(&self, field: &str) -> Option<&ClarityValue> {
        match self {
            Self::Tuple(fields) => fields.iter().find(|(k, _)| k == field).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Strip `(ok …)` / `(some …)` wrappers; `none` and `(err …)` yield `None`
    pub fn unwrap_present(&self) -> Option<&ClarityValue> {
        match self {
            Self::ResponseOk(inner) | Self::OptionalSome(inner) => inner.unwrap_present(),
            Self::OptionalNone | Self::ResponseErr(_) => None,
            other => Some(other),
        }
    }

    // ========================================================================
    // Wire format
    // ========================================================================

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => {
                out.push(TYPE_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::UInt(v) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Buffer(bytes) => {
                out.push(TYPE_BUFFER);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Self::Bool(true) => out.push(TYPE_TRUE),
            Self::Bool(false) => out.push(TYPE_FALSE),
            Self::StandardPrincipal { version, hash160 } => {
                out.push(TYPE_STANDARD_PRINCIPAL);
                out.push(*version);
                out.extend_from_slice(hash160);
            }
            Self::ContractPrincipal {
                version,
                hash160,
                name,
            } => {
                out.push(TYPE_CONTRACT_PRINCIPAL);
                out.push(*version);
                out.extend_from_slice(hash160);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Self::ResponseOk(inner) => {
                out.push(TYPE_RESPONSE_OK);
                inner.write_to(out);
            }
            Self::ResponseErr(inner) => {
                out.push(TYPE_RESPONSE_ERR);
                inner.write_to(out);
            }
            Self::OptionalNone => out.push(TYPE_NONE),
            Self::OptionalSome(inner) => {
                out.push(TYPE_SOME);
                inner.write_to(out);
            }
            Self::List(items) => {
                out.push(TYPE_LIST);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
            Self::Tuple(fields) => {
                out.push(TYPE_TUPLE);
                out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
                for (name, value) in fields {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_to(out);
                }
            }
            Self::StringAscii(s) => {
                out.push(TYPE_STRING_ASCII);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Self::StringUtf8(s) => {
                out.push(TYPE_STRING_UTF8);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// `0x`-prefixed hex, the form the call-read endpoint expects
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.serialize()))
    }

    pub fn from_hex(text: &str) -> Result<Self, StackPayError> {
        let stripped = text.strip_prefix("0x").unwrap_or(text);
        let bytes = hex::decode(stripped)
            .map_err(|e| StackPayError::Codec(format!("invalid hex: {}", e)))?;
        Self::deserialize(&bytes)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, StackPayError> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.read_value(0)?;
        if reader.pos != bytes.len() {
            return Err(StackPayError::Codec(format!(
                "{} trailing bytes after value",
                bytes.len() - reader.pos
            )));
        }
        Ok(value)
    }

    // ========================================================================
    // Textual forms
    // ========================================================================

    /// Representation printed by the indexer in `function_args[].repr`
    pub fn repr(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => format!("u{}", v),
            Self::Buffer(bytes) => format!("0x{}", hex::encode(bytes)),
            Self::Bool(b) => b.to_string(),
            Self::StandardPrincipal { .. } | Self::ContractPrincipal { .. } => {
                format!("'{}", self.as_principal().unwrap_or_default())
            }
            Self::ResponseOk(inner) => format!("(ok {})", inner.repr()),
            Self::ResponseErr(inner) => format!("(err {})", inner.repr()),
            Self::OptionalNone => "none".to_string(),
            Self::OptionalSome(inner) => format!("(some {})", inner.repr()),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(|i| i.repr()).collect();
                format!("(list {})", inner.join(" "))
            }
            Self::Tuple(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("({} {})", k, v.repr()))
                    .collect();
                format!("(tuple {})", inner.join(" "))
            }
            Self::StringAscii(s) => format!("{:?}", s),
            Self::StringUtf8(s) => format!("u{:?}", s),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Int(_) => "int".to_string(),
            Self::UInt(_) => "uint".to_string(),
            Self::Buffer(b) => format!("(buff {})", b.len()),
            Self::Bool(_) => "bool".to_string(),
            Self::StandardPrincipal { .. } | Self::ContractPrincipal { .. } => {
                "principal".to_string()
            }
            Self::ResponseOk(inner) => format!("(response {} UnknownType)", inner.type_name()),
            Self::ResponseErr(inner) => format!("(response UnknownType {})", inner.type_name()),
            Self::OptionalNone => "(optional none)".to_string(),
            Self::OptionalSome(inner) => format!("(optional {})", inner.type_name()),
            Self::List(items) => match items.first() {
                Some(first) => format!("(list {} {})", items.len(), first.type_name()),
                None => "(list 0 UnknownType)".to_string(),
            },
            Self::Tuple(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("({} {})", k, v.type_name()))
                    .collect();
                format!("(tuple {})", inner.join(" "))
            }
            Self::StringAscii(s) => format!("(string-ascii {})", s.len()),
            Self::StringUtf8(s) => format!("(string-utf8 {})", s.len()),
        }
    }

    /// `{"type": …, "value": …}` projection for API consumers
    pub fn to_json(&self) -> Value {
        let value = match self {
            Self::Int(v) => json!(v.to_string()),
            Self::UInt(v) => json!(v.to_string()),
            Self::Buffer(bytes) => json!(format!("0x{}", hex::encode(bytes))),
            Self::Bool(b) => json!(b),
            Self::StandardPrincipal { .. } | Self::ContractPrincipal { .. } => {
                json!(self.as_principal())
            }
            Self::ResponseOk(inner) | Self::ResponseErr(inner) | Self::OptionalSome(inner) => {
                inner.to_json()
            }
            Self::OptionalNone => Value::Null,
            Self::List(items) => Value::Array(items.iter().map(|i| i.to_json()).collect()),
            Self::Tuple(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::StringAscii(s) | Self::StringUtf8(s) => json!(s),
        };

        let mut out = json!({ "type": self.type_name(), "value": value });
        match self {
            Self::ResponseOk(_) => out["success"] = json!(true),
            Self::ResponseErr(_) => out["success"] = json!(false),
            _ => {}
        }
        out
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], StackPayError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| StackPayError::Codec("unexpected end of input".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, StackPayError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, StackPayError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn hash160(&mut self) -> Result<[u8; 20], StackPayError> {
        let mut buf = [0u8; 20];
        buf.copy_from_slice(self.take(20)?);
        Ok(buf)
    }

    fn string(&mut self, len: usize) -> Result<String, StackPayError> {
        String::from_utf8(self.take(len)?.to_vec())
            .map_err(|e| StackPayError::Codec(format!("invalid string bytes: {}", e)))
    }

    fn read_value(&mut self, depth: usize) -> Result<ClarityValue, StackPayError> {
        if depth > MAX_DEPTH {
            return Err(StackPayError::Codec("value nesting too deep".to_string()));
        }

        let type_id = self.u8()?;
        let value = match type_id {
            TYPE_INT => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(self.take(16)?);
                ClarityValue::Int(i128::from_be_bytes(buf))
            }
            TYPE_UINT => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(self.take(16)?);
                ClarityValue::UInt(u128::from_be_bytes(buf))
            }
            TYPE_BUFFER => {
                let len = self.u32()? as usize;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            TYPE_TRUE => ClarityValue::Bool(true),
            TYPE_FALSE => ClarityValue::Bool(false),
            TYPE_STANDARD_PRINCIPAL => {
                let version = self.u8()?;
                let hash160 = self.hash160()?;
                ClarityValue::StandardPrincipal { version, hash160 }
            }
            TYPE_CONTRACT_PRINCIPAL => {
                let version = self.u8()?;
                let hash160 = self.hash160()?;
                let len = self.u8()? as usize;
                let name = self.string(len)?;
                ClarityValue::ContractPrincipal {
                    version,
                    hash160,
                    name,
                }
            }
            TYPE_RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.read_value(depth + 1)?)),
            TYPE_RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.read_value(depth + 1)?)),
            TYPE_NONE => ClarityValue::OptionalNone,
            TYPE_SOME => ClarityValue::OptionalSome(Box::new(self.read_value(depth + 1)?)),
            TYPE_LIST => {
                let len = self.u32()? as usize;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TYPE_TUPLE => {
                let len = self.u32()? as usize;
                let mut fields = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let name_len = self.u8()? as usize;
                    let name = self.string(name_len)?;
                    fields.push((name, self.read_value(depth + 1)?));
                }
                ClarityValue::Tuple(fields)
            }
            TYPE_STRING_ASCII => {
                let len = self.u32()? as usize;
                let text = self.string(len)?;
                if !text.is_ascii() {
                    return Err(StackPayError::Codec("string-ascii with non-ASCII bytes".into()));
                }
                ClarityValue::StringAscii(text)
            }
            TYPE_STRING_UTF8 => {
                let len = self.u32()? as usize;
                ClarityValue::StringUtf8(self.string(len)?)
            }
            other => {
                return Err(StackPayError::Codec(format!(
                    "unknown type prefix 0x{:02x}",
                    other
                )))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";

    #[test]
    fn test_ascii_wire_format() {
        let value = ClarityValue::ascii("alice").unwrap();
        assert_eq!(value.to_hex(), "0x0d00000005616c696365");
    }

    #[test]
    fn test_uint_wire_format() {
        let value = ClarityValue::uint(1u64);
        assert_eq!(
            value.to_hex(),
            "0x0100000000000000000000000000000001"
        );
    }

    #[test]
    fn test_optional_principal_from_hex() {
        let encoded = ClarityValue::some(ClarityValue::principal(ALICE).unwrap()).to_hex();
        assert!(encoded.starts_with("0x0a051a"));

        let decoded = ClarityValue::from_hex(&encoded).unwrap();
        assert_eq!(
            decoded.unwrap_present().and_then(|v| v.as_principal()),
            Some(ALICE.to_string())
        );
    }

    #[test]
    fn test_contract_principal() {
        let text = format!("{}.payment-requests-v9", ALICE);
        let value = ClarityValue::principal(&text).unwrap();
        assert_eq!(value.as_principal(), Some(text.clone()));
        assert_eq!(value.repr(), format!("'{}", text));
        assert_eq!(ClarityValue::deserialize(&value.serialize()).unwrap(), value);
    }

    #[test]
    fn test_tuple_fields_and_json() {
        let value = ClarityValue::Tuple(vec![
            ("amount".to_string(), ClarityValue::uint(20_000_000u64)),
            ("claimed".to_string(), ClarityValue::Bool(false)),
            ("memo".to_string(), ClarityValue::utf8("lunch")),
        ]);
        let decoded = ClarityValue::from_hex(&value.to_hex()).unwrap();
        assert_eq!(decoded.tuple_field("amount").and_then(|v| v.as_uint()), Some(20_000_000));
        assert_eq!(decoded.tuple_field("claimed").and_then(|v| v.as_bool()), Some(false));

        let json = decoded.to_json();
        assert_eq!(json["value"]["memo"]["value"], "lunch");
    }

    #[test]
    fn test_repr_matches_indexer_format() {
        assert_eq!(ClarityValue::uint(20_000_000u64).repr(), "u20000000");
        assert_eq!(ClarityValue::ascii("req-1").unwrap().repr(), "\"req-1\"");
        assert_eq!(ClarityValue::utf8("hi").repr(), "u\"hi\"");
        assert_eq!(ClarityValue::OptionalNone.repr(), "none");
    }

    #[test]
    fn test_none_and_err_are_absent() {
        assert!(ClarityValue::OptionalNone.unwrap_present().is_none());
        let err = ClarityValue::ResponseErr(Box::new(ClarityValue::uint(404u32)));
        assert!(err.unwrap_present().is_none());
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        assert!(ClarityValue::from_hex("0x0d00000005616c").is_err());
        assert!(ClarityValue::from_hex("0xff").is_err());
        assert!(ClarityValue::from_hex("zz").is_err());
    }
}
