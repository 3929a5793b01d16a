//! Content type inference for cached payloads.
//!
//! Cached entries store only bytes, so the type is recovered from the
//! leading signature. Anything that is not PNG is served as JPEG.

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub const PNG: &str = "image/png";
pub const FALLBACK: &str = crate::origin::DEFAULT_CONTENT_TYPE;

pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(PNG_SIGNATURE) {
        PNG
    } else {
        FALLBACK
    }
}
