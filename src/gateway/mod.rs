//! Face recognition gateway. The vendor does the matching; this module only
//! speaks its HTTP API and hands back candidates.

pub mod luxand;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use luxand::LuxandClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Recognition service is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Recognition API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

/// A face matched against a registered subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Candidate {
    /// Subject name, which is the student id it was registered under
    #[schema(example = "7")]
    pub student_id: String,
    #[schema(example = 0.94)]
    pub confidence: f64,
    /// `[left, top, width, height]`
    #[schema(value_type = Vec<f64>)]
    pub bbox: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Registration {
    pub person_id: String,
    pub face_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Verification {
    pub matched: bool,
    pub probability: f64,
}

/// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL.
pub fn decode_image(image: &str) -> Result<Vec<u8>, GatewayError> {
    let payload = match image.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| GatewayError::InvalidImage("malformed data URL".to_string()))?,
        None => image,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| GatewayError::InvalidImage(e.to_string()))?;

    if bytes.is_empty() {
        return Err(GatewayError::InvalidImage("empty image".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_data_url_images() {
        let plain = STANDARD.encode(b"jpegbytes");
        assert_eq!(decode_image(&plain).unwrap(), b"jpegbytes");

        let url = format!("data:image/jpeg;base64,{plain}");
        assert_eq!(decode_image(&url).unwrap(), b"jpegbytes");
    }

    #[test]
    fn rejects_garbage_and_empty_images() {
        assert!(matches!(decode_image("data:image/png,abc"), Err(GatewayError::InvalidImage(_))));
        assert!(matches!(decode_image("%%%"), Err(GatewayError::InvalidImage(_))));
        assert!(matches!(decode_image(""), Err(GatewayError::InvalidImage(_))));
    }
}
