//! Image lookup for the [`ImageProvider`] seam: `data:` URLs and local files.
//!
//! [§ 4.8.3 The img element](https://html.spec.whatwg.org/multipage/embedded-content.html#the-img-element)
//!
//! Only the intrinsic size is needed for layout, so images are decoded
//! once here and the pixels are dropped. Files larger than the byte cap are
//! rejected from their metadata without being read.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use url::Url;
use vellum_common::Warnings;
use vellum_layout::{ImageLoadResult, ImageProvider, ImageStatus};

/// Loads images from `data:` URLs and the file system.
///
/// Remote URLs are never fetched and report [`ImageStatus::Missing`].
#[derive(Debug, Default)]
pub struct FileImageProvider {
    warnings: Warnings,
}

const OVERSIZE: ImageLoadResult = ImageLoadResult {
    status: ImageStatus::Oversize,
    intrinsic_size: None,
};

impl FileImageProvider {
    /// A provider that has reported nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Problems reported while loading, once each.
    #[must_use]
    pub const fn warnings(&self) -> &Warnings {
        &self.warnings
    }
}

impl ImageProvider for FileImageProvider {
    fn load(&self, src: &str, base_directory: Option<&Path>, max_bytes: u64) -> ImageLoadResult {
        let bytes = if src.starts_with("data:") {
            match decode_data_url(src) {
                Ok(bytes) => bytes,
                Err(reason) => {
                    self.warnings.warn_once("image", &format!("{}: {reason}", short(src)));
                    return ImageLoadResult::MISSING;
                }
            }
        } else {
            let Some(path) = resolve_path(src, base_directory) else {
                self.warnings
                    .warn_once("image", &format!("{} is not a local file", short(src)));
                return ImageLoadResult::MISSING;
            };
            let Ok(metadata) = fs::metadata(&path) else {
                return ImageLoadResult::MISSING;
            };
            if metadata.len() > max_bytes {
                return OVERSIZE;
            }
            match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.warnings
                        .warn_once("image", &format!("failed to read '{}': {e}", path.display()));
                    return ImageLoadResult::MISSING;
                }
            }
        };

        if bytes.len() as u64 > max_bytes {
            return OVERSIZE;
        }
        match image::load_from_memory(&bytes) {
            Ok(decoded) => ImageLoadResult {
                status: ImageStatus::Ok,
                intrinsic_size: Some((decoded.width(), decoded.height())),
            },
            Err(e) => {
                self.warnings
                    .warn_once("image", &format!("could not decode {} ({e})", short(src)));
                ImageLoadResult::MISSING
            }
        }
    }
}

/// [URL Standard § 4.4 URL parsing](https://url.spec.whatwg.org/#url-parsing)
///
/// Resolve `src` against `base_directory` (else the working directory) as
/// a URL and return its file path. Escapes are decoded; query and fragment
/// are dropped. Non-`file` schemes give `None`.
fn resolve_path(src: &str, base_directory: Option<&Path>) -> Option<PathBuf> {
    let url = match Url::parse(src) {
        Ok(url) => url,
        Err(_) => {
            let cwd = || std::env::current_dir().ok();
            let base = match base_directory {
                Some(base) if base.is_absolute() => base.to_path_buf(),
                Some(base) => cwd()?.join(base),
                None => cwd()?,
            };
            Url::from_directory_path(&base).ok()?.join(src).ok()?
        }
    };
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// [RFC 2397 § 2](https://www.rfc-editor.org/rfc/rfc2397#section-2)
///
/// `data:[<mediatype>][;base64],<data>`
fn decode_data_url(url: &str) -> Result<Vec<u8>, String> {
    let body = url.trim_start_matches("data:");
    let (metadata, data) = body
        .split_once(',')
        .ok_or_else(|| "invalid data URL: missing comma".to_string())?;
    if metadata.ends_with(";base64") {
        STANDARD
            .decode(data.trim())
            .map_err(|e| format!("base64 decode error: {e}"))
    } else {
        Ok(percent_decode_str(data).collect())
    }
}

/// A source short enough for a warning line.
fn short(src: &str) -> String {
    const LIMIT: usize = 48;
    match src.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("'{}...'", &src[..end]),
        None => format!("'{src}'"),
    }
}
