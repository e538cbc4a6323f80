//! Bridge to a general-purpose multi-encoding transcoder.
//!
//! A [`Transcoder`] is anything shaped like `iconv`: it opens a
//! [`TranscodeHandle`] for a `(to, from)` pair, and the handle converts
//! buffers while reporting errno-style outcomes. The Unicode side of every
//! handle is [`UNICODE_ENCODING`]; its output is decoded by the native
//! UTF-16LE codec rather than trusted directly.
//!
//! Handles are not shared between threads. Stateless conversions borrow one
//! from a [`HandlePool`] keyed by thread, direction and encoding; stateful
//! conversions keep their own handle inside the [`ConverterState`].

mod pool;
#[cfg(feature = "whatwg")]
mod whatwg;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::codec::Codec;
use crate::error::BridgeError;
use crate::latin1::{self, LATIN1_MAX};
use crate::state::{ConversionFlags, ConverterState};

pub use pool::{HandlePool, PooledHandle};
#[cfg(feature = "whatwg")]
pub use whatwg::WhatwgTranscoder;

/// Encoding name used for the Unicode side of every handle.
pub const UNICODE_ENCODING: &str = "UTF-16LE";

/// Conversion direction, relative to Unicode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes in some encoding to UTF-16.
    ToUnicode,
    /// UTF-16 to bytes in some encoding.
    FromUnicode,
}

/// How a call to [`TranscodeHandle::convert`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertStatus {
    /// All input was consumed.
    Complete,
    /// The input ends inside a sequence (`EINVAL`); `input[read..]` must be
    /// presented again together with more input.
    Incomplete,
    /// `input[read..]` starts with an invalid unit (`EILSEQ`).
    Invalid,
    /// An invalid sequence ending at `input[read]` was consumed and dropped.
    Discarded,
    /// The output buffer is full (`E2BIG`).
    OutputFull,
}

/// Progress reported by a [`TranscodeHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    /// Number of input bytes consumed.
    pub read: usize,
    /// Number of output bytes produced.
    pub written: usize,
    /// Why the call returned.
    pub status: ConvertStatus,
}

impl Conversion {
    /// Creates a conversion result.
    pub const fn new(read: usize, written: usize, status: ConvertStatus) -> Self {
        Self {
            read,
            written,
            status,
        }
    }
}

/// An open conversion descriptor.
pub trait TranscodeHandle: Send {
    /// Converts as much of `input` into `output` as possible.
    fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Conversion;

    /// Writes whatever the handle still holds at the end of a stream.
    ///
    /// A handle that buffers partial input internally reports it here as
    /// [`ConvertStatus::Discarded`]. The default holds nothing.
    fn finish(&mut self, output: &mut [u8]) -> Conversion {
        let _ = output;
        Conversion::new(0, 0, ConvertStatus::Complete)
    }

    /// Returns the handle to its initial shift state.
    fn reset(&mut self);
}

/// A general multi-encoding transcoder.
pub trait Transcoder: Send + Sync {
    /// Returns the transcoder's canonical name for `name`, or `None` if it
    /// does not support the encoding.
    fn canonical_name(&self, name: &str) -> Option<String>;

    /// Opens a handle converting from `from` to `to`.
    fn open(&self, to: &str, from: &str) -> Result<Box<dyn TranscodeHandle>, BridgeError>;

    /// Lists the canonical names of the supported encodings.
    fn available_names(&self) -> Vec<String>;
}

/// Runs `input` through `handle`, appending to `out`.
///
/// Invalid units of `unit` bytes are skipped and replaced. Returns the bytes
/// consumed, which fall short of `input.len()` only for an incomplete tail,
/// and the number of invalid sequences.
fn pump(
    handle: &mut dyn TranscodeHandle,
    input: &[u8],
    unit: usize,
    replacement: &[u8],
    out: &mut Vec<u8>,
) -> (usize, usize) {
    let mut buf = vec![0u8; input.len() * 2 + 16];
    let mut pos = 0;
    let mut invalid = 0;

    loop {
        let r = handle.convert(&input[pos..], &mut buf);
        pos = (pos + r.read).min(input.len());
        out.extend_from_slice(&buf[..r.written]);

        match r.status {
            ConvertStatus::Complete | ConvertStatus::Incomplete => break,
            ConvertStatus::OutputFull => {
                if r.written == 0 {
                    let grown = buf.len() * 2;
                    buf.resize(grown, 0);
                }
            }
            ConvertStatus::Invalid => {
                pos = (pos + unit).min(input.len());
                invalid += 1;
                out.extend_from_slice(replacement);
            }
            ConvertStatus::Discarded => {
                invalid += 1;
                out.extend_from_slice(replacement);
            }
        }
    }

    (pos, invalid)
}

/// Drains `handle` at the end of a stream. Returns the number of invalid
/// sequences it still held.
fn drain(handle: &mut dyn TranscodeHandle, replacement: &[u8], out: &mut Vec<u8>) -> usize {
    let mut buf = vec![0u8; 32];
    let mut invalid = 0;

    loop {
        let r = handle.finish(&mut buf);
        out.extend_from_slice(&buf[..r.written]);
        match r.status {
            ConvertStatus::OutputFull if r.written == 0 => {
                let grown = buf.len() * 2;
                buf.resize(grown, 0);
            }
            ConvertStatus::OutputFull => {}
            ConvertStatus::Invalid | ConvertStatus::Discarded => {
                invalid += 1;
                out.extend_from_slice(replacement);
            }
            ConvertStatus::Complete | ConvertStatus::Incomplete => break,
        }
    }

    invalid
}

fn to_le_bytes(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|u| u.to_le_bytes()).collect()
}

/// A codec whose conversions run through an external transcoder.
pub(crate) struct ExternalCodec {
    encoding: String,
    transcoder: Arc<dyn Transcoder>,
    pool: Arc<HandlePool>,
    unicode: Arc<Codec>,
    warned: AtomicBool,
}

impl ExternalCodec {
    /// `unicode` must be the native UTF-16LE codec.
    pub(crate) fn new(
        encoding: String,
        transcoder: Arc<dyn Transcoder>,
        pool: Arc<HandlePool>,
        unicode: Arc<Codec>,
    ) -> Self {
        Self {
            encoding,
            transcoder,
            pool,
            unicode,
            warned: AtomicBool::new(false),
        }
    }

    fn open(&self, direction: Direction) -> Result<Box<dyn TranscodeHandle>, BridgeError> {
        match direction {
            Direction::ToUnicode => self.transcoder.open(UNICODE_ENCODING, &self.encoding),
            Direction::FromUnicode => self.transcoder.open(&self.encoding, UNICODE_ENCODING),
        }
    }

    fn warn_once(&self, err: &BridgeError) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(
                encoding = %self.encoding,
                error = %err,
                "transcoder unavailable, falling back to ISO-8859-1"
            );
        }
    }

    pub(crate) fn to_unicode(&self, input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16> {
        let Some(state) = state else {
            let mut handle = match self.pool.checkout(
                self.transcoder.as_ref(),
                Direction::ToUnicode,
                &self.encoding,
            ) {
                Ok(handle) => handle,
                Err(err) => {
                    self.warn_once(&err);
                    return latin1::to_unicode(input, LATIN1_MAX, None);
                }
            };
            let replacement = ConversionFlags::DEFAULT.replacement_unit().to_le_bytes();
            let mut raw = Vec::with_capacity(input.len() * 2);
            let (used, _) = pump(&mut *handle, input, 1, &replacement, &mut raw);
            drain(&mut *handle, &replacement, &mut raw);
            for _ in used..input.len() {
                raw.extend_from_slice(&replacement);
            }
            return self.unicode.to_unicode(&raw, None);
        };

        let replacement = state.flags.replacement_unit().to_le_bytes();
        let mut ext = state.take_external(Direction::ToUnicode, &self.encoding);
        let mut handle = match ext.handle.take() {
            Some(handle) => handle,
            None => match self.open(Direction::ToUnicode) {
                Ok(handle) => handle,
                Err(err) => {
                    self.warn_once(&err);
                    state.store_external(ext);
                    return latin1::to_unicode(input, LATIN1_MAX, Some(state));
                }
            },
        };

        let joined;
        let bytes = if ext.pending.is_empty() {
            input
        } else {
            joined = [&ext.pending[..], input].concat();
            &joined[..]
        };

        let mut raw = Vec::with_capacity(bytes.len() * 2);
        let (used, invalid) = pump(handle.as_mut(), bytes, 1, &replacement, &mut raw);
        ext.pending = bytes[used..].into();
        if !ext.pending.is_empty() {
            trace!(encoding = %self.encoding, carried = ext.pending.len(), "incomplete input carried");
        }

        ext.handle = Some(handle);
        state.invalid_chars += invalid;
        state.store_external(ext);
        self.unicode.to_unicode(&raw, None)
    }

    pub(crate) fn from_unicode(&self, input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8> {
        let bytes = to_le_bytes(input);

        let Some(state) = state else {
            let mut handle = match self.pool.checkout(
                self.transcoder.as_ref(),
                Direction::FromUnicode,
                &self.encoding,
            ) {
                Ok(handle) => handle,
                Err(err) => {
                    self.warn_once(&err);
                    return latin1::from_unicode(input, LATIN1_MAX, None);
                }
            };
            let replacement = [ConversionFlags::DEFAULT.replacement_byte()];
            let mut out = Vec::with_capacity(input.len());
            let (used, _) = pump(&mut *handle, &bytes, 2, &replacement, &mut out);
            drain(&mut *handle, &replacement, &mut out);
            for _ in 0..(bytes.len() - used).div_ceil(2) {
                out.extend_from_slice(&replacement);
            }
            return out;
        };

        let replacement = [state.flags.replacement_byte()];
        let mut ext = state.take_external(Direction::FromUnicode, &self.encoding);
        let mut handle = match ext.handle.take() {
            Some(handle) => handle,
            None => match self.open(Direction::FromUnicode) {
                Ok(handle) => handle,
                Err(err) => {
                    self.warn_once(&err);
                    state.store_external(ext);
                    return latin1::from_unicode(input, LATIN1_MAX, Some(state));
                }
            },
        };

        let joined;
        let bytes = if ext.pending.is_empty() {
            &bytes[..]
        } else {
            joined = [&ext.pending[..], &bytes[..]].concat();
            &joined[..]
        };

        let mut out = Vec::with_capacity(bytes.len() / 2);
        let (used, invalid) = pump(handle.as_mut(), bytes, 2, &replacement, &mut out);
        ext.pending = bytes[used..].into();

        ext.handle = Some(handle);
        state.invalid_chars += invalid;
        state.store_external(ext);
        out
    }

    pub(crate) fn flush_to_unicode(&self, state: &mut ConverterState) -> Vec<u16> {
        let replacement = state.flags.replacement_unit().to_le_bytes();
        let mut ext = state.take_external(Direction::ToUnicode, &self.encoding);
        let mut raw = Vec::new();
        let mut invalid = 0;
        if let Some(handle) = ext.handle.as_mut() {
            invalid += drain(handle.as_mut(), &replacement, &mut raw);
        }
        for _ in 0..ext.pending.len() {
            raw.extend_from_slice(&replacement);
        }
        invalid += ext.pending.len();
        ext.pending.clear();

        state.invalid_chars += invalid;
        state.store_external(ext);
        self.unicode.to_unicode(&raw, None)
    }

    pub(crate) fn flush_from_unicode(&self, state: &mut ConverterState) -> Vec<u8> {
        let replacement = [state.flags.replacement_byte()];
        let mut ext = state.take_external(Direction::FromUnicode, &self.encoding);
        let mut out = Vec::new();
        let mut invalid = 0;
        if let Some(handle) = ext.handle.as_mut() {
            invalid += drain(handle.as_mut(), &replacement, &mut out);
        }
        let dangling = ext.pending.len().div_ceil(2);
        for _ in 0..dangling {
            out.extend_from_slice(&replacement);
        }
        invalid += dangling;
        ext.pending.clear();

        state.invalid_chars += invalid;
        state.store_external(ext);
        out
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenTranscoder, ErrnoTranscoder};
    use super::*;
    use crate::codec::{Endianness, Engine, NativeEngine};
    use crate::mib::MIB_UTF16LE;

    fn pair_codec(transcoder: Arc<dyn Transcoder>) -> (Codec, Arc<HandlePool>) {
        let pool = Arc::new(HandlePool::new());
        let unicode = Arc::new(Codec::native(
            "UTF-16LE",
            MIB_UTF16LE,
            &[],
            NativeEngine::Utf16(Endianness::Little),
        ));
        let ext = ExternalCodec::new("x-pair".to_owned(), transcoder, pool.clone(), unicode);
        let codec = Codec::new("x-pair".to_owned(), 0, Vec::new(), Engine::External(ext));
        (codec, pool)
    }

    #[test]
    fn test_stateless_decode() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        assert_eq!(codec.to_unicode(b"a\x80\x41b", None), vec![0x61, 0x4E01, 0x62]);
    }

    #[test]
    fn test_invalid_skips_one_byte() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        let mut state = ConverterState::new();
        let out = codec.to_unicode(b"\x80 A", Some(&mut state));
        assert_eq!(out, vec![0xFFFD, 0x20, 0x41]);
        assert_eq!(state.invalid_chars, 1);
    }

    #[test]
    fn test_incomplete_carried_in_state() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        let mut state = ConverterState::new();
        assert_eq!(codec.to_unicode(b"a\x81", Some(&mut state)), vec![0x61]);
        assert_eq!(state.remaining_chars, 1);
        assert_eq!(codec.to_unicode(b"\x40", Some(&mut state)), vec![0x4E40]);
        assert!(state.is_idle());
    }

    #[test]
    fn test_incomplete_without_state_is_replaced() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        assert_eq!(codec.to_unicode(b"a\x81", None), vec![0x61, 0xFFFD]);
    }

    #[test]
    fn test_flush_counts_tail() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        let mut state = ConverterState::new();
        codec.to_unicode(b"\x81", Some(&mut state));
        assert_eq!(codec.flush_to_unicode(&mut state), vec![0xFFFD]);
        assert_eq!(state.invalid_chars, 1);
        assert!(state.is_idle());
    }

    #[test]
    fn test_long_input() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        let input = vec![b'x'; 10_000];
        assert_eq!(codec.to_unicode(&input, None).len(), 10_000);
    }

    #[test]
    fn test_encode_with_unmappable() {
        let (codec, _) = pair_codec(Arc::new(ErrnoTranscoder));
        let mut state = ConverterState::new();
        let out = codec.from_unicode(&[0x61, 0x4E01, 0x00E9, 0x62], Some(&mut state));
        assert_eq!(out, b"a\x80\x41?b");
        assert_eq!(state.invalid_chars, 1);
    }

    #[test]
    fn test_stateless_handles_are_pooled() {
        let (codec, pool) = pair_codec(Arc::new(ErrnoTranscoder));
        codec.to_unicode(b"abc", None);
        codec.to_unicode(b"def", None);
        codec.from_unicode(&[0x61], None);
        assert_eq!(pool.opened(), 2);
        assert_eq!(pool.idle_handles(), 2);
        assert_eq!(pool.release_current_thread(), 2);
        assert_eq!(pool.idle_handles(), 0);
    }

    #[test]
    fn test_open_failure_falls_back_to_latin1() {
        let (codec, _) = pair_codec(Arc::new(BrokenTranscoder));
        assert_eq!(codec.to_unicode(b"caf\xE9", None), vec![0x63, 0x61, 0x66, 0xE9]);
        let mut state = ConverterState::new();
        assert_eq!(codec.from_unicode(&[0x41, 0x20AC], Some(&mut state)), b"A?");
        assert_eq!(state.invalid_chars, 1);
    }
}
