//! Native UTF-32 codecs: big-endian, little-endian and BOM-detecting.

use crate::codec::{Endianness, NativeEngine};
use crate::state::{ConversionFlags, ConverterState};
use crate::unicode::{compose, is_high_surrogate, is_low_surrogate, push_code_point};

const BOM_BE: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];
const BOM_LE: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];

#[inline]
fn read_unit(quad: &[u8], endian: Endianness) -> u32 {
    let bytes = [quad[0], quad[1], quad[2], quad[3]];
    match endian {
        Endianness::Little => u32::from_le_bytes(bytes),
        _ => u32::from_be_bytes(bytes),
    }
}

#[inline]
fn write_unit(cp: u32, endian: Endianness, out: &mut Vec<u8>) {
    match endian {
        Endianness::Little => out.extend_from_slice(&cp.to_le_bytes()),
        _ => out.extend_from_slice(&cp.to_be_bytes()),
    }
}

/// An explicit byte order only consumes a BOM written in that order.
fn read_header(bytes: &[u8], flags: ConversionFlags, endian: &mut Endianness) -> usize {
    let (detected, bom_len) = if bytes.starts_with(&BOM_BE) {
        (Endianness::Big, 4)
    } else if bytes.starts_with(&BOM_LE) {
        (Endianness::Little, 4)
    } else {
        (Endianness::Big, 0)
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

/// Returns the bytes consumed and the number of invalid units.
fn decode_into(
    bytes: &[u8],
    flags: ConversionFlags,
    endian: &mut Endianness,
    header_done: &mut bool,
    out: &mut Vec<u16>,
) -> (usize, usize) {
    let mut pos = 0;
    if !*header_done {
        if bytes.len() < 4 {
            return (0, 0);
        }
        pos = read_header(bytes, flags, endian);
        *header_done = true;
    }

    let mut invalid = 0;
    let units = bytes[pos..].chunks_exact(4);
    let used = pos + units.len() * 4;
    for quad in units {
        let cp = read_unit(quad, *endian);
        if cp > 0x10_FFFF || (0xD800..=0xDFFF).contains(&cp) {
            out.push(flags.replacement_unit());
            invalid += 1;
        } else {
            push_code_point(out, cp);
        }
    }
    (used, invalid)
}

pub(crate) fn to_unicode(
    input: &[u8],
    endian: Endianness,
    state: Option<&mut ConverterState>,
) -> Vec<u16> {
    let Some(state) = state else {
        let flags = ConversionFlags::DEFAULT;
        let mut out = Vec::with_capacity(input.len() / 4 + 1);
        let (mut endian, mut header_done) = (endian, false);
        let (used, _) = decode_into(input, flags, &mut endian, &mut header_done, &mut out);
        out.extend(input[used..].iter().map(|_| flags.replacement_unit()));
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf32(endian));

    let joined;
    let bytes = if utf.pending.is_empty() {
        input
    } else {
        joined = [&utf.pending[..], input].concat();
        &joined[..]
    };

    let mut out = Vec::with_capacity(bytes.len() / 4 + 1);
    let (used, invalid) =
        decode_into(bytes, flags, &mut utf.endian, &mut utf.header_done, &mut out);
    utf.pending = bytes[used..].into();

    state.invalid_chars += invalid;
    state.store_utf(utf);
    out
}

/// The code point written in place of an unpaired surrogate.
#[inline]
fn replacement_code_point(flags: ConversionFlags) -> u32 {
    flags.replacement_unit() as u32
}

fn encode_into(
    units: &[u16],
    flags: ConversionFlags,
    endian: &mut Endianness,
    header_done: &mut bool,
    high: &mut Option<u16>,
    out: &mut Vec<u8>,
) -> usize {
    if *endian == Endianness::Detect {
        *endian = Endianness::Big;
        if !*header_done && !flags.contains(ConversionFlags::IGNORE_HEADER) {
            out.extend_from_slice(&BOM_BE);
        }
    }
    *header_done = true;

    let mut invalid = 0;
    for &unit in units {
        if let Some(h) = high.take() {
            if is_low_surrogate(unit) {
                write_unit(compose(h, unit), *endian, out);
                continue;
            }
            write_unit(replacement_code_point(flags), *endian, out);
            invalid += 1;
        }

        if is_high_surrogate(unit) {
            *high = Some(unit);
        } else if is_low_surrogate(unit) {
            write_unit(replacement_code_point(flags), *endian, out);
            invalid += 1;
        } else {
            write_unit(unit as u32, *endian, out);
        }
    }
    invalid
}

pub(crate) fn from_unicode(
    input: &[u16],
    endian: Endianness,
    state: Option<&mut ConverterState>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 4 + 4);

    let Some(state) = state else {
        let flags = ConversionFlags::DEFAULT;
        let (mut endian, mut header_done, mut high) = (endian, false, None);
        encode_into(input, flags, &mut endian, &mut header_done, &mut high, &mut out);
        if high.is_some() {
            write_unit(replacement_code_point(flags), endian, &mut out);
        }
        return out;
    };

    let flags = state.flags;
    let mut utf = state.take_utf(NativeEngine::Utf32(endian));
    let invalid = encode_into(
        input,
        flags,
        &mut utf.endian,
        &mut utf.header_done,
        &mut utf.pending_high,
        &mut out,
    );
    state.invalid_chars += invalid;
    state.store_utf(utf);
    out
}

/// Terminates an encoding stream, replacing a dangling high surrogate.
pub(crate) fn flush_from_unicode(state: &mut ConverterState, endian: Endianness) -> Vec<u8> {
    let mut utf = state.take_utf(NativeEngine::Utf32(endian));
    let mut out = Vec::new();
    if utf.pending_high.take().is_some() {
        write_unit(replacement_code_point(state.flags), utf.endian, &mut out);
        state.invalid_chars += 1;
    }
    state.store_utf(utf);
    out
}

// === Registry registration ===

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-32",
        mib: crate::mib::MIB_UTF32,
        aliases: &["UTF32", "ISO-10646-UCS-4", "UCS-4", "csUCS4"],
        engine: NativeEngine::Utf32(Endianness::Detect),
    }
}

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-32BE",
        mib: crate::mib::MIB_UTF32BE,
        aliases: &["UTF32BE", "UCS-4BE"],
        engine: NativeEngine::Utf32(Endianness::Big),
    }
}

inventory::submit! {
    crate::registry::BuiltinCodec {
        name: "UTF-32LE",
        mib: crate::mib::MIB_UTF32LE,
        aliases: &["UTF32LE", "UCS-4LE"],
        engine: NativeEngine::Utf32(Endianness::Little),
    }
}
