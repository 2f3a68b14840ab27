//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Scanned pages are sent as inline base64 images in the request body. PNG
//! keeps glyph edges intact; JPEG ringing around thin Fraktur strokes and
//! umlaut dots costs more recognition accuracy than the bytes it saves.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG image payload.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
