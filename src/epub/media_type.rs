//! Media type lookup by file extension.
//!
//! EPUB core media types come from a fixed table; anything else falls back to
//! the `mime_guess` registry and finally to `application/octet-stream`.

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

fn core_media_type(ext: &str) -> Option<&'static str> {
    let media_type = match ext {
        "gif" => "image/gif",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "htm" | "html" | "xhtm" | "xhtml" => "application/xhtml+xml",
        "ncx" => "application/x-dtbncx+xml",
        "opf" => "application/oebps-package+xml",
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "smil" | "smi" | "sml" => "application/smil+xml",
        "pls" => "application/pls+xml",
        "mp3" => "audio/mpeg",
        "mp4" | "aac" | "m4a" | "m4v" | "m4b" | "m4p" | "m4r" => "audio/mp4",
        "css" => "text/css",
        "js" | "javascript" => "text/javascript",
        _ => return None,
    };
    Some(media_type)
}

/// Media type for a resource path, derived from its extension.
pub fn media_type_for(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if let Some(media_type) = core_media_type(&ext) {
        return media_type.to_string();
    }
    if ext.is_empty() {
        return OCTET_STREAM.to_string();
    }
    mime_guess::from_ext(&ext)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}
