//! Encoding detection from byte order marks and HTML charset declarations.

use crate::mib::{MIB_UTF16BE, MIB_UTF16LE, MIB_UTF32BE, MIB_UTF32LE, MIB_UTF8};

/// Number of leading bytes searched for a `<meta>` charset declaration.
pub const META_SCAN_LIMIT: usize = 512;

/// A byte order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bom {
    /// `00 00 FE FF`
    Utf32Be,
    /// `FF FE 00 00`
    Utf32Le,
    /// `FE FF`
    Utf16Be,
    /// `FF FE`
    Utf16Le,
    /// `EF BB BF`
    Utf8,
}

impl Bom {
    /// In detection order. `FF FE` is a prefix of `FF FE 00 00`, so the
    /// 32-bit marks come first.
    const ALL: [Bom; 5] = [Bom::Utf32Be, Bom::Utf32Le, Bom::Utf16Be, Bom::Utf16Le, Bom::Utf8];

    /// Returns the mark `bytes` starts with.
    pub fn detect(bytes: &[u8]) -> Option<Bom> {
        Self::ALL.into_iter().find(|bom| bytes.starts_with(bom.bytes()))
    }

    /// The mark's bytes.
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Bom::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
            Bom::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            Bom::Utf16Be => &[0xFE, 0xFF],
            Bom::Utf16Le => &[0xFF, 0xFE],
            Bom::Utf8 => &[0xEF, 0xBB, 0xBF],
        }
    }

    /// MIB of the encoding the mark announces.
    pub fn mib(self) -> i32 {
        match self {
            Bom::Utf32Be => MIB_UTF32BE,
            Bom::Utf32Le => MIB_UTF32LE,
            Bom::Utf16Be => MIB_UTF16BE,
            Bom::Utf16Le => MIB_UTF16LE,
            Bom::Utf8 => MIB_UTF8,
        }
    }
}

/// Returns the MIB announced by a BOM at the start of `bytes`, or `default`.
///
/// ```
/// use textcodec::sniff::mib_for_utf_text;
///
/// assert_eq!(mib_for_utf_text(b"\xFF\xFE\x00\x00", 4), 1019);
/// assert_eq!(mib_for_utf_text(b"\xFF\xFEa\x00", 4), 1014);
/// assert_eq!(mib_for_utf_text(b"plain", 4), 4);
/// ```
pub fn mib_for_utf_text(bytes: &[u8], default: i32) -> i32 {
    Bom::detect(bytes).map_or(default, Bom::mib)
}

/// ASCII case-insensitive search for `needle` in `haystack[from..]`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

/// ASCII case-insensitive search for the last `needle` before `before`.
fn rfind(haystack: &[u8], needle: &[u8], before: usize) -> Option<usize> {
    haystack[..before.min(haystack.len())]
        .windows(needle.len())
        .rposition(|w| w.eq_ignore_ascii_case(needle))
}

/// Finds the charset named by a `<meta>` tag in the first
/// [`META_SCAN_LIMIT`] bytes.
///
/// The tag preceding the first `http-equiv=` attribute is searched first;
/// without one, the first `<meta>` tag. This is a heuristic scan, not an
/// HTML parser. The returned name is lower-case.
pub fn meta_charset(bytes: &[u8]) -> Option<String> {
    let header = &bytes[..bytes.len().min(META_SCAN_LIMIT)];

    let tag = match find(header, b"http-equiv=", 0) {
        Some(pos) => rfind(header, b"meta ", pos)?,
        None => find(header, b"meta ", 0)?,
    };
    let end = find(header, b">", tag).unwrap_or(header.len());
    let value = find(&header[..end], b"charset=", tag)? + b"charset=".len();

    let value = header[value..end]
        .strip_prefix(b"\"")
        .or_else(|| header[value..end].strip_prefix(b"'"))
        .unwrap_or(&header[value..end]);
    let len = value
        .iter()
        .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'/') || b.is_ascii_whitespace())
        .unwrap_or(value.len());

    let name = std::str::from_utf8(&value[..len]).ok()?.to_ascii_lowercase();
    if name.is_empty() {
        None
    } else if name == "unicode" {
        Some("utf-8".to_owned())
    } else {
        Some(name)
    }
}

/// What [`sniff_html`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlCharset {
    /// A byte order mark.
    Bom(Bom),
    /// A `<meta>` charset declaration.
    Meta(String),
    /// Neither.
    Undetermined,
}

/// Determines the charset of an HTML document.
///
/// A byte order mark always wins over a `<meta>` declaration.
pub fn sniff_html(bytes: &[u8]) -> HtmlCharset {
    if let Some(bom) = Bom::detect(bytes) {
        return HtmlCharset::Bom(bom);
    }
    meta_charset(bytes).map_or(HtmlCharset::Undetermined, HtmlCharset::Meta)
}
