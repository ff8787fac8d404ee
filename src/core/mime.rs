// src/core/mime.rs

//! Content-type inference from file extensions.
//!
//! A pure lookup, deliberately independent of the protocol: FTP transfers
//! carry no content-type, so the editor infers one from the path alone.

/// Returns the MIME type for a path based on its extension.
///
/// Unknown and missing extensions fall back to `text/plain`, which is the
/// sane default for a text editor surface.
pub fn mime_type(path: &str) -> &'static str {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or("");

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "txt" | "log" | "conf" | "ini" => "text/plain",
        "yaml" | "yml" => "text/yaml",
        "toml" => "text/plain",
        "php" => "application/x-httpd-php",
        "sh" => "application/x-sh",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        _ => "text/plain",
    }
}
