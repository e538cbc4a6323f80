//! Native single-byte codecs: ISO-8859-1 and US-ASCII.
//!
//! Both map bytes straight onto the first code points of Unicode; they differ
//! only in where the mapping stops.

use crate::codec::NativeEngine;
use crate::state::{ConversionFlags, ConverterState};

/// Highest code point representable in ISO-8859-1.
pub(crate) const LATIN1_MAX: u16 = 0xFF;
/// Highest code point representable in US-ASCII.
pub(crate) const ASCII_MAX: u16 = 0x7F;

pub(crate) fn to_unicode(input: &[u8], max: u16, state: Option<&mut ConverterState>) -> Vec<u16> {
    let flags = state.as_ref().map_or(ConversionFlags::DEFAULT, |s| s.flags);
    let replacement = flags.replacement_unit();

    let mut invalid = 0;
    let out = input
        .iter()
        .map(|&b| {
            if u16::from(b) <= max {
                u16::from(b)
            } else {
                invalid += 1;
                replacement
            }
        })
        .collect();

    if let Some(state) = state {
        state.invalid_chars += invalid;
    }
    out
}

pub(crate) fn from_unicode(input: &[u16], max: u16, state: Option<&mut ConverterState>) -> Vec<u8> {
    let flags = state.as_ref().map_or(ConversionFlags::DEFAULT, |s| s.flags);
    let replacement = flags.replacement_byte();

    let mut invalid = 0;
    let out = input
        .iter()
        .map(|&unit| {
            if unit <= max {
                unit as u8
            } else {
                invalid += 1;
                replacement
            }
        })
        .collect();

    if let Some(state) = state {
        state.invalid_chars += invalid;
    }
    out
}

// === Registry registration ===

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "ISO-8859-1",
        mib: crate::mib::MIB_LATIN1,
        aliases: &[
            "latin1",
            "ISO_8859-1:1987",
            "ISO_8859-1",
            "iso-ir-100",
            "l1",
            "IBM819",
            "CP819",
            "csISOLatin1",
        ],
        engine: NativeEngine::Latin1,
    }
}

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "US-ASCII",
        mib: crate::mib::MIB_US_ASCII,
        aliases: &[
            "ANSI_X3.4-1968",
            "ANSI_X3.4-1986",
            "ASCII",
            "iso-ir-6",
            "ISO646-US",
            "ISO_646.irv:1991",
            "us",
            "IBM367",
            "cp367",
            "csASCII",
        ],
        engine: NativeEngine::Ascii,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_decode_all_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        let units = to_unicode(&bytes, LATIN1_MAX, None);
        assert!(units.iter().enumerate().all(|(i, &u)| u as usize == i));
    }

    #[test]
    fn test_latin1_encode_unmappable() {
        let mut state = ConverterState::new();
        let out = from_unicode(&[0x41, 0xE9, 0x20AC], LATIN1_MAX, Some(&mut state));
        assert_eq!(out, [0x41, 0xE9, b'?']);
        assert_eq!(state.invalid_chars, 1);
    }

    #[test]
    fn test_ascii_high_bytes_invalid() {
        let mut state = ConverterState::with_flags(ConversionFlags::CONVERT_INVALID_TO_NULL);
        let out = to_unicode(&[0x41, 0xC0], ASCII_MAX, Some(&mut state));
        assert_eq!(out, vec![0x41, 0x00]);
        assert_eq!(state.invalid_chars, 1);
    }

    #[test]
    fn test_ascii_encode() {
        assert_eq!(from_unicode(&[0x41, 0xE9], ASCII_MAX, None), b"A?");
    }
}
