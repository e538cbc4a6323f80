//! Encoding name comparison.
//!
//! Charset names arrive from many authorities (MIME headers, IANA, vendor
//! code page tables, locale strings) and rarely agree on punctuation or case.
//! [`names_match`] compares two names by their alphanumeric content only.

/// Returns `true` when `query` names the same encoding as `candidate`.
///
/// Two names match when they are equal ignoring ASCII case, or when their
/// alphanumeric characters are equal in sequence (ignoring ASCII case) once
/// every other character is discarded. A query that continues with further
/// alphanumerics after `candidate` is exhausted does not match, so
/// `"ISO-8859-12"` never matches `"ISO-8859-1"`.
///
/// ```
/// use textcodec::names_match;
///
/// assert!(names_match("ISO-8859-1", "iso8859_1"));
/// assert!(names_match("UTF-16LE", "utf16le"));
/// assert!(!names_match("ISO-8859-1", "ISO-8859-12"));
/// ```
pub fn names_match(candidate: impl AsRef<[u8]>, query: impl AsRef<[u8]>) -> bool {
    let candidate = candidate.as_ref();
    let query = query.as_ref();

    if candidate.eq_ignore_ascii_case(query) {
        return true;
    }

    let mut rest = query.iter().copied();
    for c in candidate.iter().copied().filter(u8::is_ascii_alphanumeric) {
        let next = loop {
            match rest.next() {
                Some(q) if q.is_ascii_alphanumeric() => break q,
                Some(_) => continue,
                None => return false,
            }
        };
        if !next.eq_ignore_ascii_case(&c) {
            return false;
        }
    }

    rest.all(|q| !q.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case() {
        assert!(names_match("UTF-8", "UTF-8"));
        assert!(names_match("UTF-8", "utf-8"));
        assert!(names_match("Shift_JIS", "SHIFT_JIS"));
    }

    #[test]
    fn test_punctuation_ignored() {
        for query in ["ISO-8859-1", "iso8859-1", "ISO_8859_1", "ISO8859-1", "iso 8859 1"] {
            assert!(names_match("ISO-8859-1", query), "{query}");
        }
        assert!(names_match("UTF-16BE", "utf_16_be"));
    }

    #[test]
    fn test_superset_rejected() {
        assert!(!names_match("ISO-8859-1", "ISO-8859-12"));
        assert!(!names_match("ISO-8859-12", "ISO-8859-1"));
        assert!(!names_match("UTF-16", "UTF-16LE"));
        assert!(!names_match("UTF-16LE", "UTF-16"));
    }

    #[test]
    fn test_trailing_punctuation_allowed() {
        assert!(names_match("UTF-8", "utf8;"));
        assert!(names_match("UTF-8", "  utf-8  "));
    }

    #[test]
    fn test_only_alphanumeric_runs_compared() {
        // The ":1987" suffix carries alphanumerics of its own.
        assert!(!names_match("ISO-8859-1", "ISO_8859-1:1987"));
        assert!(!names_match("latin1", "latin"));
        assert!(names_match("", "---"));
        assert!(!names_match("", "a"));
    }
}
