//! Extension traits for `str` type conversions.
//!
//! Multipart fields and JSON bodies often carry blank strings where "absent"
//! is meant; these helpers normalize that.

/// Extension trait for `str` to handle blank-as-none semantics.
pub trait StrExt {
    /// Returns `Some(trimmed)` if non-blank, `None` otherwise.
    #[must_use]
    fn to_opt(&self) -> Option<String>;

    /// Returns self if non-blank, otherwise returns `default`.
    #[must_use]
    fn or_str<'a>(&'a self, default: &'a str) -> &'a str;

    /// Truncate to at most `max_chars` characters on a char boundary.
    #[must_use]
    fn truncate_chars(&self, max_chars: usize) -> &str;
}

impl StrExt for str {
    #[inline]
    fn to_opt(&self) -> Option<String> {
        let trimmed = self.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    #[inline]
    fn or_str<'a>(&'a self, default: &'a str) -> &'a str {
        if self.trim().is_empty() { default } else { self }
    }

    fn truncate_chars(&self, max_chars: usize) -> &str {
        match self.char_indices().nth(max_chars) {
            Some((idx, _)) => &self[..idx],
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_become_none() {
        assert_eq!("".to_opt(), None);
        assert_eq!("   ".to_opt(), None);
        assert_eq!(" value ".to_opt(), Some("value".to_string()));
    }

    #[test]
    fn or_str_falls_back_on_blank() {
        assert_eq!("".or_str("default"), "default");
        assert_eq!("set".or_str("default"), "set");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!("héllo".truncate_chars(2), "hé");
        assert_eq!("abc".truncate_chars(10), "abc");
        assert_eq!("abc".truncate_chars(0), "");
    }
}
