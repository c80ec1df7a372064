//! Source inspection helpers for providers

use url::Url;

/// Lowercase file extension of a URL or path, ignoring query and fragment.
///
/// ```
/// use kino_runtime::source::extension;
///
/// assert_eq!(extension("https://cdn.example.com/live/index.M3U8?token=abc").as_deref(), Some("m3u8"));
/// assert_eq!(extension("clip.mp4#t=10").as_deref(), Some("mp4"));
/// assert_eq!(extension("https://example.com/stream"), None);
/// ```
pub fn extension(source: &str) -> Option<String> {
    let path = match Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether `source` has one of `extensions` (compared case-insensitively)
pub fn has_extension(source: &str, extensions: &[&str]) -> bool {
    extension(source).is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}
