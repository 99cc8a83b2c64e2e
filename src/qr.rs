//! Payment links and QR codes
//!
//! A payment request is shared as `{origin}/pay/{id}`. Scanning is a
//! best-effort convenience: anything that does not parse yields no id and the
//! request lookup downstream rejects unknown ids.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use qrcode::render::svg;
use qrcode::QrCode;
use url::Url;

use crate::error::StackPayError;

/// Unreserved characters stay literal inside the id segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// Canonical deep link for a request id
pub fn build_payment_url(origin: &str, id: &str) -> String {
    format!(
        "{}/pay/{}",
        origin.trim_end_matches('/'),
        utf8_percent_encode(id, PATH_SEGMENT)
    )
}

/// Candidate request id from scanned text: the final path segment of a URL
pub fn parse_payment_id(text: &str) -> Option<String> {
    let url = Url::parse(text.trim()).ok()?;
    let last = url.path_segments()?.last()?;
    if last.is_empty() {
        return None;
    }
    percent_decode_str(last)
        .decode_utf8()
        .ok()
        .map(|id| id.into_owned())
}

fn encode(data: &str) -> Result<QrCode, StackPayError> {
    QrCode::new(data.as_bytes()).map_err(|e| StackPayError::Codec(format!("QR generation failed: {}", e)))
}

/// SVG document for `data`
pub fn render_svg(data: &str) -> Result<String, StackPayError> {
    let code = encode(data)?;
    Ok(code
        .render()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Character art for terminals
pub fn render_terminal(data: &str) -> Result<String, StackPayError> {
    let code = encode(data)?;
    Ok(code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build())
}
