//! c32check address codec
//!
//! Stacks addresses are `S` + version character + c32(hash160 || checksum),
//! where the checksum is the first 4 bytes of SHA256(SHA256(version || hash160)).

use sha2::{Digest, Sha256};

use crate::error::StackPayError;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

pub const VERSION_MAINNET_SINGLESIG: u8 = 22;
pub const VERSION_MAINNET_MULTISIG: u8 = 20;
pub const VERSION_TESTNET_SINGLESIG: u8 = 26;
pub const VERSION_TESTNET_MULTISIG: u8 = 21;

/// Prefixes that identify an input as a chain address rather than a username
const ADDRESS_PREFIXES: [&str; 4] = ["SP", "SM", "ST", "SN"];

/// Cheap prefix check used by the resolver passthrough
pub fn looks_like_address(input: &str) -> bool {
    ADDRESS_PREFIXES.iter().any(|p| input.starts_with(p))
}

fn c32_digit(c: char) -> Option<u8> {
    let normalized = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|&a| a as char == normalized)
        .map(|p| p as u8)
}

/// Encode bytes as c32 text (leading zero bytes become leading `0`s)
pub fn c32_encode(input: &[u8]) -> String {
    let mut result: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u8 = 0;
    let mut carry_bits: u32 = 0;

    for &value in input.iter().rev() {
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = value & ((1u8 << low_bits_to_take) - 1);
        let digit = (low_bits << carry_bits) + carry;
        result.push(C32_ALPHABET[digit as usize]);
        carry_bits = 8 + carry_bits - 5;
        carry = value >> (8 - carry_bits);

        if carry_bits >= 5 {
            result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }
    if carry_bits > 0 {
        result.push(C32_ALPHABET[carry as usize]);
    }

    while result.last() == Some(&C32_ALPHABET[0]) {
        result.pop();
    }
    for &value in input {
        if value != 0 {
            break;
        }
        result.push(C32_ALPHABET[0]);
    }

    result.reverse();
    result.into_iter().map(char::from).collect()
}

/// Decode c32 text back into bytes
pub fn c32_decode(input: &str) -> Result<Vec<u8>, StackPayError> {
    let digits = input
        .chars()
        .map(|c| {
            c32_digit(c)
                .ok_or_else(|| StackPayError::InvalidAddress(format!("invalid c32 character '{}'", c)))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let mut result = Vec::with_capacity(digits.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for &digit in digits.iter().rev() {
        carry += (digit as u16) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            result.push((carry & 0xff) as u8);
            carry_bits -= 8;
            carry >>= 8;
        }
    }
    if carry_bits > 0 {
        result.push(carry as u8);
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    for &digit in &digits {
        if digit != 0 {
            break;
        }
        result.push(0);
    }

    result.reverse();
    Ok(result)
}

fn checksum(version: u8, hash160: &[u8]) -> [u8; 4] {
    let mut payload = Vec::with_capacity(1 + hash160.len());
    payload.push(version);
    payload.extend_from_slice(hash160);
    let first = Sha256::digest(&payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Build a Stacks address from version byte and hash160
pub fn c32_address(version: u8, hash160: &[u8; 20]) -> String {
    let mut data = hash160.to_vec();
    data.extend_from_slice(&checksum(version, hash160));
    format!(
        "S{}{}",
        C32_ALPHABET[(version & 0x1f) as usize] as char,
        c32_encode(&data)
    )
}

/// Decode a Stacks address into `(version, hash160)`, verifying the checksum
pub fn c32_address_decode(address: &str) -> Result<(u8, [u8; 20]), StackPayError> {
    let invalid = |reason: &str| StackPayError::InvalidAddress(format!("{}: {}", address, reason));

    let mut chars = address.chars();
    if chars.next() != Some('S') {
        return Err(invalid("missing 'S' prefix"));
    }
    let version = chars
        .next()
        .and_then(c32_digit)
        .ok_or_else(|| invalid("bad version character"))?;

    let data = c32_decode(chars.as_str())?;
    if data.len() != 24 {
        return Err(invalid("wrong payload length"));
    }

    let (hash, check) = data.split_at(20);
    if check != checksum(version, hash) {
        return Err(invalid("checksum mismatch"));
    }

    let mut hash160 = [0u8; 20];
    hash160.copy_from_slice(hash);
    Ok((version, hash160))
}
