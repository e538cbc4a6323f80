//! UTF-16 helpers shared by the native codecs.

use crate::codec::NativeEngine;
use crate::state::ConverterState;

/// Byte order mark.
pub(crate) const BOM: u16 = 0xFEFF;

// Surrogate range constants
const SURROGATE_HIGH_START: u16 = 0xD800;
const SURROGATE_HIGH_END: u16 = 0xDBFF;
const SURROGATE_LOW_START: u16 = 0xDC00;
const SURROGATE_LOW_END: u16 = 0xDFFF;

#[inline]
pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (SURROGATE_HIGH_START..=SURROGATE_HIGH_END).contains(&unit)
}

#[inline]
pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (SURROGATE_LOW_START..=SURROGATE_LOW_END).contains(&unit)
}

#[inline]
pub(crate) fn compose(high: u16, low: u16) -> u32 {
    0x1_0000 + (((high - SURROGATE_HIGH_START) as u32) << 10) + (low - SURROGATE_LOW_START) as u32
}

/// Appends a code point, splitting it into a surrogate pair above the BMP.
#[inline]
pub(crate) fn push_code_point(out: &mut Vec<u16>, cp: u32) {
    if cp < 0x1_0000 {
        out.push(cp as u16);
    } else {
        out.push((0xD7C0 + (cp >> 10)) as u16);
        out.push((SURROGATE_LOW_START as u32 + (cp & 0x3FF)) as u16);
    }
}

/// Index of the first surrogate that is missing its other half.
#[cfg_attr(not(feature = "whatwg"), allow(dead_code))]
pub(crate) fn lone_surrogate(units: &[u16]) -> Option<usize> {
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        if is_high_surrogate(unit) && units.get(i + 1).is_some_and(|&next| is_low_surrogate(next)) {
            i += 2;
        } else if is_high_surrogate(unit) || is_low_surrogate(unit) {
            return Some(i);
        } else {
            i += 1;
        }
    }
    None
}

/// Terminates a decoding stream for a native codec: every carried byte
/// becomes one replacement character.
pub(crate) fn flush_pending_bytes(state: &mut ConverterState, engine: NativeEngine) -> Vec<u16> {
    let mut utf = state.take_utf(engine);
    let out = vec![state.flags.replacement_unit(); utf.pending.len()];
    state.invalid_chars += utf.pending.len();
    utf.pending.clear();
    state.store_utf(utf);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_formula() {
        let mut out = Vec::new();
        push_code_point(&mut out, 0x1F600);
        assert_eq!(out, vec![0xD83D, 0xDE00]);
        assert_eq!(compose(0xD83D, 0xDE00), 0x1F600);
    }

    #[test]
    fn test_extremes() {
        let mut out = Vec::new();
        push_code_point(&mut out, 0x1_0000);
        push_code_point(&mut out, 0x10_FFFF);
        assert_eq!(out, vec![0xD800, 0xDC00, 0xDBFF, 0xDFFF]);
    }

    #[test]
    fn test_surrogate_classes() {
        assert!(is_high_surrogate(0xD800));
        assert!(!is_high_surrogate(0xDC00));
        assert!(is_low_surrogate(0xDFFF));
        assert!(!is_low_surrogate(0xE000));
    }

    #[test]
    fn test_lone_surrogate() {
        assert_eq!(lone_surrogate(&[0x41, 0xD83D, 0xDE00, 0x42]), None);
        assert_eq!(lone_surrogate(&[0x41, 0xDE00]), Some(1));
        assert_eq!(lone_surrogate(&[0xD83D, 0x41]), Some(0));
        assert_eq!(lone_surrogate(&[0x41, 0xD83D]), Some(1));
        assert_eq!(lone_surrogate(&[]), None);
    }
}
