//! File and folder name validation.

use crate::error::{EngineError, EngineResult};

/// Characters that may never appear in a name.
pub const RESERVED_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Maximum name length in bytes.
pub const MAX_NAME_LEN: usize = 255;

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Check whether `name` is acceptable as the final segment of a path.
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

/// Validate a file or folder name, explaining the first problem found.
pub fn validate_name(name: &str) -> EngineResult<()> {
    if name.trim().is_empty() {
        return Err(EngineError::invalid_name(name, "name cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::invalid_name(
            name,
            format!("name is too long (max {MAX_NAME_LEN} bytes)"),
        ));
    }

    if name == "." || name == ".." {
        return Err(EngineError::invalid_name(name, "'.' and '..' are reserved"));
    }

    if let Some(c) = name.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(EngineError::invalid_name(
            name,
            format!("name cannot contain '{c}'"),
        ));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(EngineError::invalid_name(
            name,
            "name cannot contain path separators",
        ));
    }

    if name.chars().any(char::is_control) {
        return Err(EngineError::invalid_name(
            name,
            "name cannot contain control characters",
        ));
    }

    if name.ends_with('.') || name.ends_with(' ') {
        return Err(EngineError::invalid_name(
            name,
            "name cannot end with a dot or space",
        ));
    }

    let upper = name.to_uppercase();
    let base = upper.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&base) {
        return Err(EngineError::invalid_name(name, "reserved device name"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("test.txt"));
        assert!(is_valid_name("my-file"));
        assert!(is_valid_name(".hidden"));
        assert!(is_valid_name("file with spaces"));
        assert!(is_valid_name("Übersicht 2024"));
    }

    #[test]
    fn test_reserved_characters() {
        for c in RESERVED_CHARS {
            let name = format!("a{c}b");
            assert!(!is_valid_name(&name), "{name} should be rejected");
        }
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name("\t"));
    }

    #[test]
    fn test_control_and_separators() {
        assert!(!is_valid_name("line\nbreak"));
        assert!(!is_valid_name("nul\0byte"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
        assert!(!is_valid_name("."));
        assert!(!is_valid_name(".."));
    }

    #[test]
    fn test_trailing_and_reserved_names() {
        assert!(!is_valid_name("file."));
        assert!(!is_valid_name("file "));
        assert!(!is_valid_name("CON"));
        assert!(!is_valid_name("con.txt"));
        assert!(!is_valid_name("lpt9"));
        assert!(is_valid_name("console"));
    }

    #[test]
    fn test_reason_mentions_character() {
        let err = validate_name("a:b").unwrap_err();
        assert!(matches!(err, EngineError::InvalidName { .. }));
        assert!(err.to_string().contains(':'));
    }

    #[test]
    fn test_too_long() {
        assert!(!is_valid_name(&"x".repeat(MAX_NAME_LEN + 1)));
        assert!(is_valid_name(&"x".repeat(MAX_NAME_LEN)));
    }
}
