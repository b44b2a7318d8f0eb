use chrono::Utc;
use rand::Rng;

/// Longest entry name most filesystems accept, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// Upper bound (inclusive) of the random stored-name component.
const RANDOM_SUFFIX_MAX: u32 = 1_000_000_000;

const FALLBACK_NAME: &str = "file";

/// Make a client-supplied name safe to embed in a stored file name.
///
/// Removes path separators, characters Windows refuses, and control characters;
/// drops dot-only and Windows device names; trims trailing dots and spaces and
/// truncates to 255 bytes. Falls back to `file` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(*c, '/' | '\\' | '?' | '<' | '>' | ':' | '*' | '|' | '"'))
        .filter(|c| !matches!(*c as u32, 0x00..=0x1f | 0x80..=0x9f))
        .collect();

    if cleaned.chars().all(|c| c == '.') || is_windows_device_name(&cleaned) {
        return FALLBACK_NAME.to_string();
    }

    let trimmed = cleaned.trim_end_matches(|c| c == '.' || c == ' ');
    let truncated = truncate_to_bytes(trimmed, MAX_NAME_BYTES);
    if truncated.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

fn is_windows_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).to_ascii_lowercase();
    match stem.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        s if s.len() == 4 && (s.starts_with("com") || s.starts_with("lpt")) => {
            s.as_bytes()[3].is_ascii_digit()
        }
        _ => false,
    }
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `<ms-timestamp>-<random>-<sanitized name>`, kept within 255 bytes.
pub fn stored_file_name(original_name: &str) -> String {
    let random = rand::thread_rng().gen_range(0..=RANDOM_SUFFIX_MAX);
    let prefix = format!("{}-{}-", Utc::now().timestamp_millis(), random);
    let sanitized = sanitize_file_name(original_name);
    let budget = MAX_NAME_BYTES.saturating_sub(prefix.len());
    format!("{prefix}{}", truncate_to_bytes(&sanitized, budget))
}

/// Extension of `name` without the dot, as the path library sees it.
/// Dotfiles such as `.apk` have none.
pub fn extension_of(name: &str) -> Option<&str> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
}

/// The upload gate: the name must mention `apk` and so must its (lower-cased) extension.
pub fn is_apk(name: &str) -> bool {
    let extension_matches = extension_of(name)
        .map(|ext| ext.to_lowercase().contains("apk"))
        .unwrap_or(false);
    name.contains("apk") && extension_matches
}

/// Everything after the last `.`; the whole name when there is no dot.
pub fn mime_type_of(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Bytes to MiB, rounded to two decimals.
pub fn size_in_mib(bytes: u64) -> f64 {
    let mib = bytes as f64 / 1024.0 / 1024.0;
    (mib * 100.0).round() / 100.0
}

/// Version token from names following the `<app>-<label>(<version>)-<build>.apk` convention.
///
/// Takes the second `-` segment, the part after its first `(`, minus the final
/// character. Anything that doesn't fit yields `None`. This only works for that one
/// naming convention; treat the result as a hint.
pub fn apk_version(name: &str) -> Option<String> {
    let segment = name.split('-').nth(1)?;
    let inner = segment.split('(').nth(1)?;
    let mut chars = inner.chars();
    chars.next_back()?;
    let version = chars.as_str();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// `<base>/media/<url-encoded stored name>`
pub fn download_url(base_url: &str, stored_name: &str) -> String {
    format!(
        "{}/media/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(stored_name)
    )
}
