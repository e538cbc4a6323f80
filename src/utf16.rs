//! Native UTF-16 codecs: big-endian, little-endian and BOM-detecting.
//!
//! Code units pass through unvalidated in both directions; surrogate
//! pairing is left to whoever consumes the UTF-16 text.

use crate::codec::{Endianness, NativeEngine};
use crate::state::{ConversionFlags, ConverterState};
use crate::unicode::BOM;

#[inline]
fn read_unit(pair: &[u8], endian: Endianness) -> u16 {
    match endian {
        Endianness::Little => u16::from_le_bytes([pair[0], pair[1]]),
        _ => u16::from_be_bytes([pair[0], pair[1]]),
    }
}

/// Resolves byte order from the first two bytes of a stream.
///
/// Returns the number of BOM bytes to skip. An explicit byte order only
/// consumes a BOM written in that order.
fn read_header(bytes: &[u8], flags: ConversionFlags, endian: &mut Endianness) -> usize {
    let (detected, bom_len) = match bytes {
        [0xFE, 0xFF, ..] => (Endianness::Big, 2),
        [0xFF, 0xFE, ..] => (Endianness::Little, 2),
        _ => (Endianness::Big, 0),
    };
    if *endian == Endianness::Detect {
        *endian = detected;
    } else if *endian != detected {
        return 0;
    }
    if flags.contains(ConversionFlags::IGNORE_HEADER) {
        0
    } else {
        bom_len
    }
}

/// Decodes whole code units from `bytes`, returning the bytes consumed.
fn decode_into(
    bytes: &[u8],
    flags: ConversionFlags,
    endian: &mut Endianness,
    header_done: &mut bool,
    out: &mut Vec<u16>,
) -> usize {
    let mut pos = 0;
    if !*header_done {
        if bytes.len() < 2 {
            return 0;
        }
        pos = read_header(bytes, flags, endian);
        *header_done = true;
    }

    let units = bytes[pos..].chunks_exact(2);
    let used = pos + units.len() * 2;
    out.extend(units.map(|pair| read_unit(pair, *endian)));
    used
}

pub(crate) fn to_unicode(
    input: &[u8],
    endian: Endianness,
    state: Option<&mut ConverterState>,
) -> Vec<u16> {
    let Some(state) = state else {
        let flags = ConversionFlags::DEFAULT;
        let mut out = Vec::with_capacity(input.len() / 2 + 1);
        let (mut endian, mut header_done) = (endian, false);
        let used = decode_into(input, flags, &mut endian, &mut header_done, &mut out);
        out.extend(input[used..].iter().map(|_| flags.replacement_unit()));
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf16(endian));

    let joined;
    let bytes = if utf.pending.is_empty() {
        input
    } else {
        joined = [&utf.pending[..], input].concat();
        &joined[..]
    };

    let mut out = Vec::with_capacity(bytes.len() / 2);
    let used = decode_into(bytes, flags, &mut utf.endian, &mut utf.header_done, &mut out);
    utf.pending = bytes[used..].into();

    state.store_utf(utf);
    out
}

fn encode_into(
    units: &[u16],
    flags: ConversionFlags,
    endian: &mut Endianness,
    header_done: &mut bool,
    out: &mut Vec<u8>,
) {
    if *endian == Endianness::Detect {
        *endian = Endianness::Big;
        if !*header_done && !flags.contains(ConversionFlags::IGNORE_HEADER) {
            out.extend_from_slice(&BOM.to_be_bytes());
        }
    }
    *header_done = true;

    for &unit in units {
        let bytes = match endian {
            Endianness::Little => unit.to_le_bytes(),
            _ => unit.to_be_bytes(),
        };
        out.extend_from_slice(&bytes);
    }
}

pub(crate) fn from_unicode(
    input: &[u16],
    endian: Endianness,
    state: Option<&mut ConverterState>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2 + 2);

    let Some(state) = state else {
        let (mut endian, mut header_done) = (endian, false);
        encode_into(input, ConversionFlags::DEFAULT, &mut endian, &mut header_done, &mut out);
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf16(endian));
    encode_into(input, flags, &mut utf.endian, &mut utf.header_done, &mut out);
    state.store_utf(utf);
    out
}

// === Registry registration ===

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-16",
        mib: crate::mib::MIB_UTF16,
        aliases: &["ISO-10646-UCS-2", "UTF16", "UCS-2", "csUnicode"],
        engine: NativeEngine::Utf16(Endianness::Detect),
    }
}

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-16BE",
        mib: crate::mib::MIB_UTF16BE,
        aliases: &["UTF16BE", "UCS-2BE", "unicodeFFFE"],
        engine: NativeEngine::Utf16(Endianness::Big),
    }
}

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-16LE",
        mib: crate::mib::MIB_UTF16LE,
        aliases: &["UTF16LE", "UCS-2LE"],
        engine: NativeEngine::Utf16(Endianness::Little),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_explicit() {
        let be = [0x00, 0x68, 0xD8, 0x3D, 0xDE, 0x00];
        assert_eq!(to_unicode(&be, Endianness::Big, None), vec![0x68, 0xD83D, 0xDE00]);
        let le = [0x68, 0x00, 0x3D, 0xD8, 0x00, 0xDE];
        assert_eq!(to_unicode(&le, Endianness::Little, None), vec![0x68, 0xD83D, 0xDE00]);
    }

    #[test]
    fn test_explicit_consumes_own_bom() {
        let le = [0xFF, 0xFE, 0x41, 0x00];
        assert_eq!(to_unicode(&le, Endianness::Little, None), vec![0x41]);
        let be = [0xFE, 0xFF, 0x00, 0x41];
        assert_eq!(to_unicode(&be, Endianness::Big, None), vec![0x41]);
    }

    #[test]
    fn test_explicit_swapped_bom_is_data() {
        let be = [0xFF, 0xFE, 0x00, 0x41];
        assert_eq!(to_unicode(&be, Endianness::Big, None), vec![0xFFFE, 0x41]);
    }

    #[test]
    fn test_explicit_ignore_header_keeps_bom() {
        let mut state = ConverterState::with_flags(ConversionFlags::IGNORE_HEADER);
        let out = to_unicode(&[0xFF, 0xFE, 0x41, 0x00], Endianness::Little, Some(&mut state));
        assert_eq!(out, vec![BOM, 0x41]);
    }

    #[test]
    fn test_explicit_bom_only_at_start() {
        let mut state = ConverterState::new();
        let first = to_unicode(&[0x41, 0x00], Endianness::Little, Some(&mut state));
        let second = to_unicode(&[0xFF, 0xFE], Endianness::Little, Some(&mut state));
        assert_eq!((first, second), (vec![0x41], vec![BOM]));
    }

    #[test]
    fn test_detect_consumes_bom() {
        assert_eq!(to_unicode(&[0xFF, 0xFE, 0x41, 0x00], Endianness::Detect, None), vec![0x41]);
        assert_eq!(to_unicode(&[0xFE, 0xFF, 0x00, 0x41], Endianness::Detect, None), vec![0x41]);
    }

    #[test]
    fn test_detect_defaults_to_big_endian() {
        assert_eq!(to_unicode(&[0x00, 0x41], Endianness::Detect, None), vec![0x41]);
    }

    #[test]
    fn test_detect_ignore_header_keeps_bom() {
        let mut state = ConverterState::with_flags(ConversionFlags::IGNORE_HEADER);
        let out = to_unicode(&[0xFF, 0xFE, 0x41, 0x00], Endianness::Detect, Some(&mut state));
        assert_eq!(out, vec![BOM, 0x41]);
    }

    #[test]
    fn test_endianness_persists() {
        let mut state = ConverterState::new();
        let first = to_unicode(&[0xFF, 0xFE, 0x41, 0x00], Endianness::Detect, Some(&mut state));
        assert_eq!(first, vec![0x41]);
        // A later FE FF is data, not a header.
        let second = to_unicode(&[0x42, 0x00, 0xFE, 0xFF], Endianness::Detect, Some(&mut state));
        assert_eq!(second, vec![0x42, 0xFFFE]);
    }

    #[test]
    fn test_odd_byte_carried() {
        let mut state = ConverterState::new();
        let first = to_unicode(&[0x00, 0x41, 0x00], Endianness::Big, Some(&mut state));
        assert_eq!(first, vec![0x41]);
        assert_eq!(state.remaining_chars, 1);
        let second = to_unicode(&[0x42], Endianness::Big, Some(&mut state));
        assert_eq!(second, vec![0x42]);
        assert_eq!(state.remaining_chars, 0);
    }

    #[test]
    fn test_split_bom() {
        let mut state = ConverterState::new();
        assert!(to_unicode(&[0xFF], Endianness::Detect, Some(&mut state)).is_empty());
        let out = to_unicode(&[0xFE, 0x41, 0x00], Endianness::Detect, Some(&mut state));
        assert_eq!(out, vec![0x41]);
    }

    #[test]
    fn test_stateless_odd_byte_replaced() {
        assert_eq!(to_unicode(&[0x00, 0x41, 0x00], Endianness::Big, None), vec![0x41, 0xFFFD]);
    }

    #[test]
    fn test_encode_explicit_has_no_bom() {
        assert_eq!(from_unicode(&[0x41], Endianness::Big, None), [0x00, 0x41]);
        assert_eq!(from_unicode(&[0x41], Endianness::Little, None), [0x41, 0x00]);
    }

    #[test]
    fn test_encode_detect_bom_once() {
        let mut state = ConverterState::new();
        let first = from_unicode(&[0x41], Endianness::Detect, Some(&mut state));
        assert_eq!(first, [0xFE, 0xFF, 0x00, 0x41]);
        let second = from_unicode(&[0x42], Endianness::Detect, Some(&mut state));
        assert_eq!(second, [0x00, 0x42]);
    }

    #[test]
    fn test_encode_detect_ignore_header() {
        let mut state = ConverterState::with_flags(ConversionFlags::IGNORE_HEADER);
        let out = from_unicode(&[0x41], Endianness::Detect, Some(&mut state));
        assert_eq!(out, [0x00, 0x41]);
    }

    #[test]
    fn test_lone_surrogates_pass_through() {
        let out = from_unicode(&[0xDC00], Endianness::Big, None);
        assert_eq!(out, [0xDC, 0x00]);
        assert_eq!(to_unicode(&out, Endianness::Big, None), vec![0xDC00]);
    }
}
