//! Text processing utilities

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use std::path::Path;

/// Encoding used when the input is empty or already valid UTF-8
pub const DEFAULT_ENCODING: &Encoding = UTF_8;

/// Result of decoding raw file bytes
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding the bytes were decoded with
    pub encoding: &'static str,
    /// Whether undecodable bytes were replaced with U+FFFD
    pub had_errors: bool,
}

/// Decode bytes of unknown encoding into text.
///
/// Valid UTF-8 (with or without BOM) is taken as is. Anything else goes
/// through charset detection, and undecodable sequences become replacement
/// characters instead of failing.
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
            encoding: DEFAULT_ENCODING.name(),
            had_errors: false,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);

    // decode() sniffs a BOM first, so the encoding actually used may differ
    let (text, used, had_errors) = guessed.decode(bytes);
    if had_errors {
        tracing::debug!("Decoded with replacement characters as {}", used.name());
    }

    DecodedText {
        text: text.into_owned(),
        encoding: used.name(),
        had_errors,
    }
}

/// Read a file and decode it with [`decode_bytes`]
pub fn read_text_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(decode_bytes(&bytes).text)
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else if max_length <= 3 {
        "...".to_string()
    } else {
        let kept: String = text.chars().take(max_length - 3).collect();
        format!("{}...", kept)
    }
}

/// Split a comma separated list, trimming entries and dropping empty ones
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Show only the first few characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.is_empty() {
        "(none)".to_string()
    } else if visible.chars().count() == secret.chars().count() {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough_strips_bom() {
        let decoded = decode_bytes("\u{feff}fn main() {}".as_bytes());
        assert_eq!(decoded.text, "fn main() {}");
        assert_eq!(decoded.encoding, "UTF-8");
        assert!(!decoded.had_errors);
    }

    #[test]
    fn test_non_utf8_input_is_decoded_without_failing() {
        // "café" in windows-1252
        let bytes = b"# caf\xe9 menu\nprint('hello')\n";
        let decoded = decode_bytes(bytes);
        assert!(decoded.text.contains("print('hello')"));
        assert!(decoded.text.starts_with("# caf"));
        assert_ne!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn test_empty_input() {
        let decoded = decode_bytes(b"");
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 6), "hél...");
        assert_eq!(truncate("abc", 2), "...");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" .py, .rs ,,"), vec![".py", ".rs"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-1234567890"), "sk-1****");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret(""), "(none)");
    }
}
