//! Cross-call conversion state.
//!
//! A [`ConverterState`] carries everything a codec needs to continue a
//! conversion where the previous call stopped: the bytes of a multi-byte
//! sequence split across reads, a high surrogate still waiting for its low
//! half, the byte order established by a BOM, or a live handle into an
//! external transcoder.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use enumflags2::{bitflags, make_bitflags, BitFlags};
use smallvec::SmallVec;

use crate::codec::{Endianness, NativeEngine};
use crate::external::{Direction, TranscodeHandle};
use crate::library::LibraryConverter;

/// A single conversion option.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionFlag {
    /// Replace invalid input with U+0000 / 0x00 instead of U+FFFD / `?`.
    ConvertInvalidToNull = 0x01,
    /// Neither consume nor emit a byte order mark.
    IgnoreHeader = 0x02,
}

/// Flags controlling how a codec treats invalid input and byte order marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConversionFlags(BitFlags<ConversionFlag>);

impl ConversionFlags {
    /// Replace invalid input with U+FFFD when decoding and `?` when encoding.
    pub const DEFAULT: Self = Self(BitFlags::EMPTY);
    /// Replace invalid input with U+0000 / 0x00 instead.
    pub const CONVERT_INVALID_TO_NULL: Self =
        Self(make_bitflags!(ConversionFlag::{ConvertInvalidToNull}));
    /// Neither consume nor emit a byte order mark.
    pub const IGNORE_HEADER: Self = Self(make_bitflags!(ConversionFlag::{IgnoreHeader}));

    /// Returns the raw flag bits.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0.bits()
    }

    /// Returns `true` if every flag in `other` is set.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0.contains(other.0)
    }

    #[inline]
    pub(crate) fn replacement_unit(self) -> u16 {
        if self.contains(Self::CONVERT_INVALID_TO_NULL) {
            0x0000
        } else {
            0xFFFD
        }
    }

    #[inline]
    pub(crate) fn replacement_byte(self) -> u8 {
        if self.contains(Self::CONVERT_INVALID_TO_NULL) {
            0x00
        } else {
            b'?'
        }
    }
}

impl From<ConversionFlag> for ConversionFlags {
    fn from(flag: ConversionFlag) -> Self {
        Self(flag.into())
    }
}

impl BitOr for ConversionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ConversionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Progress of one logical stream through a codec.
///
/// A state belongs to the stream, not to the codec: create one per stream
/// and direction, pass it to every call, and call
/// [`Codec::flush_to_unicode`](crate::Codec::flush_to_unicode) or
/// [`Codec::flush_from_unicode`](crate::Codec::flush_from_unicode) at the
/// end. `invalid_chars` accumulates across calls and is only reset by the
/// caller or by [`clear`](Self::clear).
///
/// Handing a state to a codec other than the one that filled it discards
/// the carried data and starts that codec afresh.
#[derive(Debug, Default)]
pub struct ConverterState {
    /// Conversion flags.
    pub flags: ConversionFlags,
    /// Number of input units carried over from the previous call.
    pub remaining_chars: usize,
    /// Number of invalid sequences seen since the state was created or cleared.
    pub invalid_chars: usize,
    pub(crate) blob: StateBlob,
}

impl ConverterState {
    /// Creates an empty state with default flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty state with the given flags.
    pub fn with_flags(flags: ConversionFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Drops all carried data and counters, keeping the flags.
    ///
    /// Any transcoder handle held by the state is closed.
    pub fn clear(&mut self) {
        self.remaining_chars = 0;
        self.invalid_chars = 0;
        self.blob = StateBlob::Empty;
    }

    /// Returns `true` when the state carries nothing over into the next call.
    pub fn is_idle(&self) -> bool {
        self.remaining_chars == 0
    }

    pub(crate) fn take_utf(&mut self, engine: NativeEngine) -> UtfState {
        match core::mem::take(&mut self.blob) {
            StateBlob::Utf(utf) if utf.engine == engine => utf,
            _ => UtfState::new(engine),
        }
    }

    pub(crate) fn store_utf(&mut self, utf: UtfState) {
        self.remaining_chars = utf.remaining();
        self.blob = StateBlob::Utf(utf);
    }

    pub(crate) fn take_external(&mut self, direction: Direction, encoding: &str) -> ExternalState {
        match core::mem::take(&mut self.blob) {
            StateBlob::External(ext) if ext.direction == direction && ext.encoding == encoding => {
                ext
            }
            _ => ExternalState::new(direction, encoding),
        }
    }

    pub(crate) fn store_external(&mut self, ext: ExternalState) {
        self.remaining_chars = ext.pending.len();
        self.blob = StateBlob::External(ext);
    }

    pub(crate) fn take_library(&mut self, name: &str) -> LibraryState {
        match core::mem::take(&mut self.blob) {
            StateBlob::Library(lib) if lib.name == name => lib,
            _ => LibraryState::new(name),
        }
    }

    pub(crate) fn store_library(&mut self, lib: LibraryState) {
        self.remaining_chars = 0;
        self.blob = StateBlob::Library(lib);
    }
}

/// Codec-specific data carried between calls.
#[derive(Debug, Default)]
pub(crate) enum StateBlob {
    #[default]
    Empty,
    Utf(UtfState),
    External(ExternalState),
    Library(LibraryState),
}

/// Carry-over for the native codecs.
#[derive(Debug, Clone)]
pub(crate) struct UtfState {
    pub(crate) engine: NativeEngine,
    /// Bytes of an incomplete trailing sequence (decode side).
    pub(crate) pending: SmallVec<[u8; 4]>,
    /// High surrogate awaiting its low half (encode side).
    pub(crate) pending_high: Option<u16>,
    /// BOM consumed or written, first character seen.
    pub(crate) header_done: bool,
    pub(crate) endian: Endianness,
}

impl UtfState {
    fn new(engine: NativeEngine) -> Self {
        let endian = match engine {
            NativeEngine::Utf16(endian) | NativeEngine::Utf32(endian) => endian,
            _ => Endianness::Detect,
        };
        Self {
            engine,
            pending: SmallVec::new(),
            pending_high: None,
            header_done: false,
            endian,
        }
    }

    fn remaining(&self) -> usize {
        self.pending.len() + usize::from(self.pending_high.is_some())
    }
}

/// Carry-over for a codec backed by an external transcoder.
pub(crate) struct ExternalState {
    pub(crate) direction: Direction,
    pub(crate) encoding: String,
    pub(crate) handle: Option<Box<dyn TranscodeHandle>>,
    pub(crate) pending: SmallVec<[u8; 8]>,
}

impl ExternalState {
    fn new(direction: Direction, encoding: &str) -> Self {
        Self {
            direction,
            encoding: encoding.to_owned(),
            handle: None,
            pending: SmallVec::new(),
        }
    }
}

impl fmt::Debug for ExternalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalState")
            .field("direction", &self.direction)
            .field("encoding", &self.encoding)
            .field("open", &self.handle.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}

/// Carry-over for a codec backed by a conversion library.
pub(crate) struct LibraryState {
    pub(crate) name: String,
    pub(crate) converter: Option<Box<dyn LibraryConverter>>,
}

impl LibraryState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            converter: None,
        }
    }
}

impl fmt::Debug for LibraryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryState")
            .field("name", &self.name)
            .field("open", &self.converter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let flags = ConversionFlags::IGNORE_HEADER | ConversionFlags::CONVERT_INVALID_TO_NULL;
        assert!(flags.contains(ConversionFlags::IGNORE_HEADER));
        assert!(flags.contains(ConversionFlags::CONVERT_INVALID_TO_NULL));
        assert!(!ConversionFlags::DEFAULT.contains(ConversionFlags::IGNORE_HEADER));
        assert_eq!(flags.bits(), 0x03);
        assert_eq!(ConversionFlags::from(ConversionFlag::IgnoreHeader), ConversionFlags::IGNORE_HEADER);
    }

    #[test]
    fn test_replacements() {
        assert_eq!(ConversionFlags::DEFAULT.replacement_unit(), 0xFFFD);
        assert_eq!(ConversionFlags::DEFAULT.replacement_byte(), b'?');
        let null = ConversionFlags::CONVERT_INVALID_TO_NULL;
        assert_eq!(null.replacement_unit(), 0);
        assert_eq!(null.replacement_byte(), 0);
    }

    #[test]
    fn test_foreign_blob_is_replaced() {
        let mut state = ConverterState::new();
        let mut utf = state.take_utf(NativeEngine::Utf8);
        utf.pending.push(0xE2);
        state.store_utf(utf);
        assert_eq!(state.remaining_chars, 1);

        let utf16 = state.take_utf(NativeEngine::Utf16(Endianness::Little));
        assert!(utf16.pending.is_empty());
        assert_eq!(utf16.endian, Endianness::Little);
    }

    #[test]
    fn test_clear_keeps_flags() {
        let mut state = ConverterState::with_flags(ConversionFlags::IGNORE_HEADER);
        state.invalid_chars = 3;
        state.remaining_chars = 1;
        state.clear();
        assert_eq!(state.invalid_chars, 0);
        assert!(state.is_idle());
        assert_eq!(state.flags, ConversionFlags::IGNORE_HEADER);
    }
}
