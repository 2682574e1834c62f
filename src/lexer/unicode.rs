//! Unicode-aware character classification for shell identifiers
//!
//! POSIX mode restricts identifiers and whitespace to the ASCII sets; outside
//! POSIX mode the Unicode letter/number categories apply and identifier names
//! are NFC-normalized so visually identical spellings compare equal.

use unicode_normalization::UnicodeNormalization;

/// Check if a character can start an identifier (variable name).
pub fn is_identifier_start(c: char, posix_mode: bool) -> bool {
    if posix_mode {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c == '_' || c.is_alphabetic()
    }
}

/// Check if a character can continue an identifier.
pub fn is_identifier_char(c: char, posix_mode: bool) -> bool {
    if posix_mode {
        c.is_ascii_alphanumeric() || c == '_'
    } else {
        c == '_' || c.is_alphanumeric()
    }
}

/// Check if a character is whitespace under the given mode.
pub fn is_whitespace(c: char, posix_mode: bool) -> bool {
    if posix_mode {
        matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c' | '\x0b')
    } else {
        c.is_whitespace()
    }
}

/// Horizontal whitespace only; newline is an operator token, never skipped.
pub fn is_horizontal_whitespace(c: char, posix_mode: bool) -> bool {
    c != '\n' && is_whitespace(c, posix_mode)
}

/// Normalize an identifier name according to configuration.
///
/// NFC normalization applies outside POSIX mode; lowercasing applies when the
/// lexer is case-insensitive.
pub fn normalize_identifier(name: &str, posix_mode: bool, case_sensitive: bool) -> String {
    let normalized = if posix_mode {
        name.to_string()
    } else {
        name.nfc().collect()
    };
    if case_sensitive {
        normalized
    } else {
        normalized.to_lowercase()
    }
}

/// Validate that a string is a well-formed identifier.
pub fn validate_identifier(name: &str, posix_mode: bool) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_identifier_start(c, posix_mode) => {
            chars.all(|c| is_identifier_char(c, posix_mode))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identifiers() {
        assert!(is_identifier_start('a', true));
        assert!(is_identifier_start('_', true));
        assert!(!is_identifier_start('1', true));
        assert!(is_identifier_char('1', true));
        assert!(!is_identifier_char('-', true));
    }

    #[test]
    fn test_unicode_identifiers_outside_posix() {
        assert!(is_identifier_start('é', false));
        assert!(is_identifier_start('変', false));
        assert!(!is_identifier_start('é', true));
        assert!(is_identifier_char('é', false));
    }

    #[test]
    fn test_whitespace_modes() {
        assert!(is_whitespace(' ', true));
        assert!(is_whitespace('\u{00A0}', false)); // no-break space
        assert!(!is_whitespace('\u{00A0}', true));
        assert!(is_horizontal_whitespace('\t', true));
        assert!(!is_horizontal_whitespace('\n', true));
    }

    #[test]
    fn test_normalize_nfc() {
        // e + combining acute composes to é under NFC
        let decomposed = "e\u{0301}";
        assert_eq!(normalize_identifier(decomposed, false, true), "é");
        // POSIX mode leaves it alone
        assert_eq!(normalize_identifier(decomposed, true, true), decomposed);
    }

    #[test]
    fn test_normalize_case_folding() {
        assert_eq!(normalize_identifier("Foo", false, false), "foo");
        assert_eq!(normalize_identifier("Foo", false, true), "Foo");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("_x1", true));
        assert!(!validate_identifier("1x", true));
        assert!(!validate_identifier("", true));
    }
}
