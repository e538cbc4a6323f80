//! IANA MIB enum numbers.
//!
//! A compact sorted table maps MIB numbers to byte offsets into one packed,
//! NUL-separated string of canonical names. It answers MIB lookups without
//! consulting a bridge and gives bridge-backed codecs their MIB by reverse
//! lookup through [`names_match`].

use crate::name::names_match;

/// MIB of US-ASCII.
pub const MIB_US_ASCII: i32 = 3;
/// MIB of ISO-8859-1.
pub const MIB_LATIN1: i32 = 4;
/// MIB of UTF-8.
pub const MIB_UTF8: i32 = 106;
/// MIB of UTF-16BE.
pub const MIB_UTF16BE: i32 = 1013;
/// MIB of UTF-16LE.
pub const MIB_UTF16LE: i32 = 1014;
/// MIB of UTF-16 with byte order detection.
pub const MIB_UTF16: i32 = 1015;
/// MIB of UTF-32 with byte order detection.
pub const MIB_UTF32: i32 = 1017;
/// MIB of UTF-32BE.
pub const MIB_UTF32BE: i32 = 1018;
/// MIB of UTF-32LE.
pub const MIB_UTF32LE: i32 = 1019;

/// MIB reported for encodings without an IANA number.
pub const MIB_UNKNOWN: i32 = 0;

#[derive(Clone, Copy)]
struct MibEntry {
    mib: i32,
    offset: u16,
}

const NAMES: &str = concat!(
    "US-ASCII\0ISO-8859-1\0ISO-8859-2\0ISO-8859-3\0ISO-8859-4\0ISO-8859-5\0",
    "ISO-8859-6\0ISO-8859-7\0ISO-8859-8\0ISO-8859-9\0ISO-8859-10\0Shift_JIS\0",
    "EUC-JP\0ISO-2022-KR\0EUC-KR\0ISO-2022-JP\0ISO-2022-JP-2\0GB_2312-80\0",
    "ISO-8859-6-E\0ISO-8859-6-I\0ISO-8859-8-E\0ISO-8859-8-I\0ISO-2022-CN\0",
    "ISO-2022-CN-EXT\0UTF-8\0ISO-8859-13\0ISO-8859-14\0ISO-8859-15\0",
    "ISO-8859-16\0GBK\0GB18030\0ISO-10646-UCS-2\0ISO-10646-UCS-4\0SCSU\0",
    "UTF-7\0UTF-16BE\0UTF-16LE\0UTF-16\0CESU-8\0UTF-32\0UTF-32BE\0UTF-32LE\0",
    "BOCU-1\0hp-roman8\0IBM850\0IBM862\0GB2312\0Big5\0macintosh\0KOI8-R\0",
    "HZ-GB-2312\0IBM866\0KOI8-U\0Big5-HKSCS\0windows-874\0windows-1250\0",
    "windows-1251\0windows-1252\0windows-1253\0windows-1254\0windows-1255\0",
    "windows-1256\0windows-1257\0windows-1258\0TIS-620\0",
);

const TABLE: [MibEntry; 65] = [
    MibEntry { mib: 3, offset: 0 },
    MibEntry { mib: 4, offset: 9 },
    MibEntry { mib: 5, offset: 20 },
    MibEntry { mib: 6, offset: 31 },
    MibEntry { mib: 7, offset: 42 },
    MibEntry { mib: 8, offset: 53 },
    MibEntry { mib: 9, offset: 64 },
    MibEntry { mib: 10, offset: 75 },
    MibEntry { mib: 11, offset: 86 },
    MibEntry { mib: 12, offset: 97 },
    MibEntry { mib: 13, offset: 108 },
    MibEntry { mib: 17, offset: 120 },
    MibEntry { mib: 18, offset: 130 },
    MibEntry { mib: 37, offset: 137 },
    MibEntry { mib: 38, offset: 149 },
    MibEntry { mib: 39, offset: 156 },
    MibEntry { mib: 40, offset: 168 },
    MibEntry { mib: 57, offset: 182 },
    MibEntry { mib: 81, offset: 193 },
    MibEntry { mib: 82, offset: 206 },
    MibEntry { mib: 84, offset: 219 },
    MibEntry { mib: 85, offset: 232 },
    MibEntry { mib: 104, offset: 245 },
    MibEntry { mib: 105, offset: 257 },
    MibEntry { mib: 106, offset: 273 },
    MibEntry { mib: 109, offset: 279 },
    MibEntry { mib: 110, offset: 291 },
    MibEntry { mib: 111, offset: 303 },
    MibEntry { mib: 112, offset: 315 },
    MibEntry { mib: 113, offset: 327 },
    MibEntry { mib: 114, offset: 331 },
    MibEntry { mib: 1000, offset: 339 },
    MibEntry { mib: 1001, offset: 355 },
    MibEntry { mib: 1011, offset: 371 },
    MibEntry { mib: 1012, offset: 376 },
    MibEntry { mib: 1013, offset: 382 },
    MibEntry { mib: 1014, offset: 391 },
    MibEntry { mib: 1015, offset: 400 },
    MibEntry { mib: 1016, offset: 407 },
    MibEntry { mib: 1017, offset: 414 },
    MibEntry { mib: 1018, offset: 421 },
    MibEntry { mib: 1019, offset: 430 },
    MibEntry { mib: 1020, offset: 439 },
    MibEntry { mib: 2004, offset: 446 },
    MibEntry { mib: 2009, offset: 456 },
    MibEntry { mib: 2013, offset: 463 },
    MibEntry { mib: 2025, offset: 470 },
    MibEntry { mib: 2026, offset: 477 },
    MibEntry { mib: 2027, offset: 482 },
    MibEntry { mib: 2084, offset: 492 },
    MibEntry { mib: 2085, offset: 499 },
    MibEntry { mib: 2086, offset: 510 },
    MibEntry { mib: 2088, offset: 517 },
    MibEntry { mib: 2101, offset: 524 },
    MibEntry { mib: 2109, offset: 535 },
    MibEntry { mib: 2250, offset: 547 },
    MibEntry { mib: 2251, offset: 560 },
    MibEntry { mib: 2252, offset: 573 },
    MibEntry { mib: 2253, offset: 586 },
    MibEntry { mib: 2254, offset: 599 },
    MibEntry { mib: 2255, offset: 612 },
    MibEntry { mib: 2256, offset: 625 },
    MibEntry { mib: 2257, offset: 638 },
    MibEntry { mib: 2258, offset: 651 },
    MibEntry { mib: 2259, offset: 664 },
];

fn name_at(offset: u16) -> &'static str {
    let rest = &NAMES[offset as usize..];
    match rest.find('\0') {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Returns the IANA name registered for `mib`.
pub fn name_for_mib(mib: i32) -> Option<&'static str> {
    let idx = TABLE.binary_search_by_key(&mib, |e| e.mib).ok()?;
    Some(name_at(TABLE[idx].offset))
}

/// Returns the MIB whose IANA name matches `name`, or [`MIB_UNKNOWN`].
pub fn mib_for_name(name: &str) -> i32 {
    TABLE
        .iter()
        .find(|e| names_match(name_at(e.offset), name))
        .map_or(MIB_UNKNOWN, |e| e.mib)
}

/// Iterates over every `(mib, name)` pair in ascending MIB order.
pub fn entries() -> impl Iterator<Item = (i32, &'static str)> {
    TABLE.iter().map(|e| (e.mib, name_at(e.offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sorted() {
        assert!(TABLE.windows(2).all(|w| w[0].mib < w[1].mib));
    }

    #[test]
    fn test_offsets_start_names() {
        for entry in TABLE {
            let offset = entry.offset as usize;
            assert!(offset == 0 || NAMES.as_bytes()[offset - 1] == 0);
            assert!(!name_at(entry.offset).is_empty());
        }
        assert_eq!(entries().count(), TABLE.len());
    }

    #[test]
    fn test_known_numbers() {
        assert_eq!(name_for_mib(3), Some("US-ASCII"));
        assert_eq!(name_for_mib(4), Some("ISO-8859-1"));
        assert_eq!(name_for_mib(106), Some("UTF-8"));
        assert_eq!(name_for_mib(1013), Some("UTF-16BE"));
        assert_eq!(name_for_mib(1014), Some("UTF-16LE"));
        assert_eq!(name_for_mib(1015), Some("UTF-16"));
        assert_eq!(name_for_mib(1018), Some("UTF-32BE"));
        assert_eq!(name_for_mib(2259), Some("TIS-620"));
        assert_eq!(name_for_mib(0), None);
        assert_eq!(name_for_mib(14), None);
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(mib_for_name("utf8"), MIB_UTF8);
        assert_eq!(mib_for_name("iso-8859-15"), 111);
        assert_eq!(mib_for_name("Windows-1252"), 2252);
        assert_eq!(mib_for_name("shift_jis"), 17);
        assert_eq!(mib_for_name("no-such-charset"), MIB_UNKNOWN);
    }
}
