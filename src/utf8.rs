//! Native UTF-8 codec.

use crate::codec::NativeEngine;
use crate::state::{ConversionFlags, ConverterState};
use crate::unicode::{compose, is_high_surrogate, is_low_surrogate, push_code_point, BOM};

/// Outcome of decoding one sequence at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A code point and the number of bytes it used.
    Char(u32, usize),
    /// The lead byte cannot start a valid sequence here.
    Invalid,
    /// The buffer ends inside an otherwise plausible sequence.
    Incomplete,
}

/// Decodes the sequence at the start of `bytes`, which must not be empty.
pub(crate) fn decode_step(bytes: &[u8]) -> Step {
    let lead = bytes[0];
    if lead < 0x80 {
        return Step::Char(lead as u32, 1);
    }

    let (len, min, mut cp) = match lead {
        0xC2..=0xDF => (2, 0x80, (lead & 0x1F) as u32),
        0xE0..=0xEF => (3, 0x800, (lead & 0x0F) as u32),
        0xF0..=0xF4 => (4, 0x1_0000, (lead & 0x07) as u32),
        // C0, C1 and F5..FF never start a legal sequence
        _ => return Step::Invalid,
    };

    for i in 1..len {
        let Some(&b) = bytes.get(i) else {
            return Step::Incomplete;
        };
        if !is_utf8_continuation(b) {
            return Step::Invalid;
        }
        cp = (cp << 6) | (b & 0x3F) as u32;
    }

    if cp < min || (0xD800..=0xDFFF).contains(&cp) || cp > 0x10_FFFF {
        Step::Invalid
    } else {
        Step::Char(cp, len)
    }
}

/// Returns true if the byte is a UTF-8 continuation byte (10xxxxxx).
#[inline]
fn is_utf8_continuation(b: u8) -> bool {
    (b & 0xC0) == 0x80
}

/// Decodes as much of `bytes` as possible into `out`.
///
/// Returns the number of bytes consumed and the number of invalid sequences;
/// anything past the consumed prefix is an incomplete trailing sequence.
fn decode_into(
    bytes: &[u8],
    flags: ConversionFlags,
    header_done: &mut bool,
    out: &mut Vec<u16>,
) -> (usize, usize) {
    let mut pos = 0;
    let mut invalid = 0;

    while pos < bytes.len() {
        match decode_step(&bytes[pos..]) {
            Step::Char(cp, len) => {
                pos += len;
                if !*header_done {
                    *header_done = true;
                    if cp == BOM as u32 && !flags.contains(ConversionFlags::IGNORE_HEADER) {
                        continue;
                    }
                }
                push_code_point(out, cp);
            }
            Step::Invalid => {
                // Only the lead byte is consumed; what follows is re-examined.
                *header_done = true;
                out.push(flags.replacement_unit());
                invalid += 1;
                pos += 1;
            }
            Step::Incomplete => break,
        }
    }

    (pos, invalid)
}

pub(crate) fn to_unicode(input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16> {
    let Some(state) = state else {
        let flags = ConversionFlags::DEFAULT;
        let mut out = Vec::with_capacity(input.len());
        let mut header_done = false;
        let (used, _) = decode_into(input, flags, &mut header_done, &mut out);
        // No later call can complete the tail.
        out.extend(input[used..].iter().map(|_| flags.replacement_unit()));
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf8);

    let joined;
    let bytes = if utf.pending.is_empty() {
        input
    } else {
        joined = [&utf.pending[..], input].concat();
        &joined[..]
    };

    let mut out = Vec::with_capacity(bytes.len());
    let (used, invalid) = decode_into(bytes, flags, &mut utf.header_done, &mut out);
    utf.pending = bytes[used..].into();
    if !utf.pending.is_empty() {
        tracing::trace!(carried = utf.pending.len(), "utf-8 sequence split across calls");
    }

    state.invalid_chars += invalid;
    state.store_utf(utf);
    out
}

fn encode_unit(cp: u32, out: &mut Vec<u8>) {
    match cp {
        0..=0x7F => out.push(cp as u8),
        0x80..=0x7FF => out.extend_from_slice(&[0xC0 | (cp >> 6) as u8, 0x80 | (cp & 0x3F) as u8]),
        0x800..=0xFFFF => out.extend_from_slice(&[
            0xE0 | (cp >> 12) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]),
        _ => out.extend_from_slice(&[
            0xF0 | (cp >> 18) as u8,
            0x80 | ((cp >> 12) & 0x3F) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]),
    }
}

/// Encodes `units`, resuming with `high` if the previous call ended on a
/// high surrogate. Returns the number of invalid units.
fn encode_into(
    units: &[u16],
    flags: ConversionFlags,
    high: &mut Option<u16>,
    out: &mut Vec<u8>,
) -> usize {
    let mut invalid = 0;

    for &unit in units {
        if let Some(h) = high.take() {
            if is_low_surrogate(unit) {
                encode_unit(compose(h, unit), out);
                continue;
            }
            out.push(flags.replacement_byte());
            invalid += 1;
        }

        if is_high_surrogate(unit) {
            *high = Some(unit);
        } else if is_low_surrogate(unit) {
            out.push(flags.replacement_byte());
            invalid += 1;
        } else {
            encode_unit(unit as u32, out);
        }
    }

    invalid
}

pub(crate) fn from_unicode(input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 3);

    let Some(state) = state else {
        let flags = ConversionFlags::DEFAULT;
        let mut high = None;
        encode_into(input, flags, &mut high, &mut out);
        if high.is_some() {
            out.push(flags.replacement_byte());
        }
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf8);
    let invalid = encode_into(input, flags, &mut utf.pending_high, &mut out);
    state.invalid_chars += invalid;
    state.store_utf(utf);
    out
}

/// Terminates an encoding stream, replacing a dangling high surrogate.
pub(crate) fn flush_from_unicode(state: &mut ConverterState) -> Vec<u8> {
    let mut utf = state.take_utf(NativeEngine::Utf8);
    let mut out = Vec::new();
    if utf.pending_high.take().is_some() {
        out.push(state.flags.replacement_byte());
        state.invalid_chars += 1;
    }
    state.store_utf(utf);
    out
}

// === Registry registration ===

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-8",
        mib: crate::mib::MIB_UTF8,
        aliases: &["UTF8", "utf-8", "unicode-1-1-utf-8", "unicode-2-0-utf-8"],
        engine: NativeEngine::Utf8,
    }
}
