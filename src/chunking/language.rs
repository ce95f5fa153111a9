//! Language detection by file extension.

use std::path::Path;

/// Maps a file path to its language identifier.
///
/// Recognized extensions: `java`, `py`, `js`, `ts`, `html`, `css`, `xml`,
/// `json`, `yaml`/`yml`, `properties`. Everything else is `plaintext`.
///
/// # Examples
///
/// ```
/// use repolens::chunking::detect_language;
///
/// assert_eq!(detect_language("src/Main.java"), "java");
/// assert_eq!(detect_language("README"), "plaintext");
/// ```
#[must_use]
pub fn detect_language(file_path: &str) -> &'static str {
    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("java") => "java",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("html") => "html",
        Some("css") => "css",
        Some("xml") => "xml",
        Some("json") => "json",
        Some("yaml" | "yml") => "yaml",
        Some("properties") => "properties",
        _ => "plaintext",
    }
}

/// Returns `true` for languages whose sources are scanned for log statements.
#[must_use]
pub fn is_jvm_family(language: &str) -> bool {
    language == "java"
}
