//! QR code rendering for pairing payloads
//!
//! The messaging client hands us the raw QR payload; the browser wants an
//! image it can show without another round trip, so payloads are rendered
//! to PNG and inlined as a base64 data URI.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use thiserror::Error;

/// Prefix of every data URI produced by [`encode_data_uri`]
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Minimum rendered edge length in pixels
const MIN_QR_SIZE: u32 = 256;

/// QR rendering errors
#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Render a QR payload as a `data:image/png;base64,...` URI
pub fn encode_data_uri(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_QR_SIZE, MIN_QR_SIZE)
        .build();

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;

    Ok(format!("{}{}", DATA_URI_PREFIX, BASE64.encode(buffer.into_inner())))
}

/// Render a QR payload as Unicode blocks for terminal display
pub fn render_terminal(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;

    Ok(code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build())
}
