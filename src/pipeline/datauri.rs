//! `data:` URIs: the wire form of a cleaned image.
//!
//! The cleanup service hands results back as a mime type plus a base64
//! payload; keeping them in that form until composition avoids holding both
//! the encoded and decoded bytes for every page at once.

use crate::error::Scan2PdfError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

/// A `data:<mime>;base64,<payload>` URI, held in decomposed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    /// Base64-encoded payload (standard alphabet, padded).
    pub data: String,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encode raw bytes into a data URI.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Parse the textual `data:` form.
    pub fn parse(s: &str) -> Result<Self, Scan2PdfError> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| Scan2PdfError::InvalidDataUri(format!("missing data: prefix in '{s}'")))?;
        let (mime_type, data) = rest.split_once(";base64,").ok_or_else(|| {
            Scan2PdfError::InvalidDataUri("missing ';base64,' separator".to_string())
        })?;
        if mime_type.is_empty() {
            return Err(Scan2PdfError::InvalidDataUri("empty mime type".to_string()));
        }
        Ok(Self::new(mime_type, data))
    }

    /// Decode the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, Scan2PdfError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| Scan2PdfError::InvalidDataUri(format!("bad base64 payload: {e}")))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text_form() {
        let uri = DataUri::from_bytes("image/png", b"\x89PNG");
        let text = uri.to_string();
        assert!(text.starts_with("data:image/png;base64,"));

        let back = DataUri::parse(&text).expect("parse");
        assert_eq!(back, uri);
        assert_eq!(back.decode().expect("decode"), b"\x89PNG");
    }

    #[test]
    fn rejects_non_data_scheme() {
        assert!(DataUri::parse("https://example.com/x.png").is_err());
    }

    #[test]
    fn rejects_missing_base64_marker() {
        assert!(DataUri::parse("data:image/png,rawbytes").is_err());
    }

    #[test]
    fn rejects_empty_mime() {
        assert!(DataUri::parse("data:;base64,AAAA").is_err());
    }

    #[test]
    fn decode_rejects_bad_payload() {
        let uri = DataUri::new("image/png", "not-base64!!!");
        assert!(uri.decode().is_err());
    }
}
