// Data-URI handling and bitmap export of captured images
//
// Images arrive as `data:<mime>;base64,<payload>`. Saved files are always
// BMP: payloads that already are bitmaps are written byte for byte, anything
// else is decoded and re-encoded.

use crate::error::{PanelError, PanelResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Decoded data-URI
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 data-URI; bare base64 is accepted and sniffed.
    pub fn parse(input: &str) -> PanelResult<Self> {
        let input = input.trim();

        let (mime, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').ok_or_else(|| {
                    PanelError::InvalidRequest("data URI without payload".to_string())
                })?;
                let mime = meta.strip_suffix(";base64").ok_or_else(|| {
                    PanelError::InvalidRequest("only base64 data URIs are supported".to_string())
                })?;
                (Some(mime.to_string()), payload)
            }
            None => (None, input),
        };

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| PanelError::InvalidRequest(format!("invalid base64 image: {}", e)))?;

        let mime = match mime.filter(|m| !m.is_empty()) {
            Some(mime) => mime,
            None => image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        };

        Ok(Self { mime, bytes })
    }

    /// Format detected from the bytes themselves; the declared mime is not trusted
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.bytes).ok()
    }

    /// The image as BMP bytes, re-encoding when needed
    pub fn to_bitmap(&self) -> PanelResult<Vec<u8>> {
        if self.format() == Some(ImageFormat::Bmp) {
            debug!("Image already BMP ({} bytes), relabeling", self.bytes.len());
            return Ok(self.bytes.clone());
        }

        let decoded = image::load_from_memory(&self.bytes)?;
        let mut out = std::io::Cursor::new(Vec::new());
        decoded.write_to(&mut out, ImageFormat::Bmp)?;
        debug!(
            "Re-encoded {} image as BMP ({} -> {} bytes)",
            self.mime,
            self.bytes.len(),
            out.get_ref().len()
        );
        Ok(out.into_inner())
    }
}

/// File name used for saved captures
pub fn capture_file_name() -> String {
    format!("fingerprint_{}.bmp", Utc::now().timestamp_millis())
}

/// Write `image` (a data-URI) as a bitmap into `dir`, returning the path
pub fn export_bitmap(image: &str, dir: &Path) -> PanelResult<PathBuf> {
    let uri = DataUri::parse(image)?;
    let bitmap = uri.to_bitmap()?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(capture_file_name());
    std::fs::write(&path, bitmap)?;

    info!("Saved capture to {}", path.display());
    Ok(path)
}
