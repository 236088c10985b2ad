//! Player name rules.

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 16;

/// 3 to 16 characters, each an ASCII letter, digit or underscore.
pub fn is_valid_username(name: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for name in ["Steve", "jeb_", "abc", "A_B_C_1234567890", "___"] {
            assert!(is_valid_username(name), "{name}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "ab", "seventeen_chars_x", "with space", "dash-name", "émile", "a.b.c"] {
            assert!(!is_valid_username(name), "{name}");
        }
    }
}
