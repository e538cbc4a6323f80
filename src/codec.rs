//! Codecs: named, immutable converters between bytes and UTF-16.
//!
//! A [`Codec`] is identified by a canonical name and an IANA MIB number and
//! is shared as `Arc<Codec>` once a [`Registry`](crate::Registry) hands it
//! out. The conversion itself is dispatched to one of a closed set of
//! engines: the native UTF and single-byte algorithms, an external
//! transcoder, a conversion library, or a caller-supplied plugin.

use core::fmt;
use std::sync::Arc;

use crate::external::ExternalCodec;
use crate::latin1::{self, ASCII_MAX, LATIN1_MAX};
use crate::library::LibraryCodec;
use crate::name::names_match;
use crate::state::{ConversionFlags, ConverterState};
use crate::{unicode, utf16, utf32, utf8};

/// Byte order of a UTF-16 or UTF-32 codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Read the byte order from a BOM, defaulting to big-endian.
    Detect,
    /// Big-endian.
    Big,
    /// Little-endian.
    Little,
}

/// The conversion algorithms implemented by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEngine {
    /// UTF-8.
    Utf8,
    /// UTF-16 in the given byte order.
    Utf16(Endianness),
    /// UTF-32 in the given byte order.
    Utf32(Endianness),
    /// ISO-8859-1.
    Latin1,
    /// US-ASCII.
    Ascii,
}

impl NativeEngine {
    fn to_unicode(self, input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16> {
        match self {
            Self::Utf8 => utf8::to_unicode(input, state),
            Self::Utf16(endian) => utf16::to_unicode(input, endian, state),
            Self::Utf32(endian) => utf32::to_unicode(input, endian, state),
            Self::Latin1 => latin1::to_unicode(input, LATIN1_MAX, state),
            Self::Ascii => latin1::to_unicode(input, ASCII_MAX, state),
        }
    }

    fn from_unicode(self, input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8> {
        match self {
            Self::Utf8 => utf8::from_unicode(input, state),
            Self::Utf16(endian) => utf16::from_unicode(input, endian, state),
            Self::Utf32(endian) => utf32::from_unicode(input, endian, state),
            Self::Latin1 => latin1::from_unicode(input, LATIN1_MAX, state),
            Self::Ascii => latin1::from_unicode(input, ASCII_MAX, state),
        }
    }

    fn flush_to_unicode(self, state: &mut ConverterState) -> Vec<u16> {
        match self {
            Self::Latin1 | Self::Ascii => Vec::new(),
            _ => unicode::flush_pending_bytes(state, self),
        }
    }

    fn flush_from_unicode(self, state: &mut ConverterState) -> Vec<u8> {
        match self {
            Self::Utf8 => utf8::flush_from_unicode(state),
            Self::Utf32(endian) => utf32::flush_from_unicode(state, endian),
            // UTF-16 and the single-byte codecs never hold input back.
            _ => Vec::new(),
        }
    }
}

/// A codec implemented outside this crate and installed with
/// [`Registry::register`](crate::Registry::register).
///
/// Implementations follow the same streaming contract as the built-in
/// codecs: without a state every call is a complete unit, with a state
/// partial input is carried over and `invalid_chars` is accumulated.
pub trait PluginCodec: Send + Sync {
    /// Decodes `input` to UTF-16.
    fn to_unicode(&self, input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16>;

    /// Encodes UTF-16 `input`.
    fn from_unicode(&self, input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8>;

    /// Terminates a decoding stream. The default carries nothing over.
    fn flush_to_unicode(&self, state: &mut ConverterState) -> Vec<u16> {
        let _ = state;
        Vec::new()
    }

    /// Terminates an encoding stream. The default carries nothing over.
    fn flush_from_unicode(&self, state: &mut ConverterState) -> Vec<u8> {
        let _ = state;
        Vec::new()
    }
}

/// Which engine performs a codec's conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Implemented by this crate.
    Native,
    /// Backed by an external transcoder.
    External,
    /// Backed by a conversion library.
    Library,
    /// Supplied by the caller.
    Plugin,
}

pub(crate) enum Engine {
    Native(NativeEngine),
    External(ExternalCodec),
    Library(LibraryCodec),
    Plugin(Arc<dyn PluginCodec>),
}

/// A named bidirectional converter between bytes and UTF-16.
pub struct Codec {
    name: String,
    aliases: Vec<String>,
    mib: i32,
    engine: Engine,
}

impl Codec {
    pub(crate) fn new(name: String, mib: i32, aliases: Vec<String>, engine: Engine) -> Self {
        Self {
            name,
            aliases,
            mib,
            engine,
        }
    }

    pub(crate) fn native(name: &str, mib: i32, aliases: &[&str], engine: NativeEngine) -> Self {
        let aliases = aliases.iter().map(|a| (*a).to_owned()).collect();
        Self::new(name.to_owned(), mib, aliases, Engine::Native(engine))
    }

    /// Wraps a caller-supplied codec implementation.
    ///
    /// Use a `mib` of [`MIB_UNKNOWN`](crate::mib::MIB_UNKNOWN) for encodings
    /// without an IANA number.
    pub fn plugin<I>(name: impl Into<String>, mib: i32, aliases: I, codec: impl PluginCodec + 'static) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let aliases = aliases.into_iter().map(Into::into).collect();
        Self::new(name.into(), mib, aliases, Engine::Plugin(Arc::new(codec)))
    }

    /// Returns the canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the alias names.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns all names (canonical + aliases) for this codec.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        core::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Returns the IANA MIB number, or 0 when there is none.
    pub fn mib(&self) -> i32 {
        self.mib
    }

    /// Returns which engine performs the conversions.
    pub fn kind(&self) -> CodecKind {
        match self.engine {
            Engine::Native(_) => CodecKind::Native,
            Engine::External(_) => CodecKind::External,
            Engine::Library(_) => CodecKind::Library,
            Engine::Plugin(_) => CodecKind::Plugin,
        }
    }

    /// Checks if the canonical name or any alias matches `query`.
    pub fn matches_name(&self, query: impl AsRef<[u8]>) -> bool {
        let query = query.as_ref();
        self.all_names().any(|n| names_match(n, query))
    }

    /// Decodes `input` to UTF-16.
    ///
    /// Without a state the input is treated as complete: an unfinished
    /// trailing sequence is replaced. With a state it is carried into the
    /// next call.
    pub fn to_unicode(&self, input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16> {
        match &self.engine {
            Engine::Native(engine) => engine.to_unicode(input, state),
            Engine::External(codec) => codec.to_unicode(input, state),
            Engine::Library(codec) => codec.to_unicode(input, state),
            Engine::Plugin(codec) => codec.to_unicode(input, state),
        }
    }

    /// Encodes UTF-16 `input`.
    ///
    /// Unpaired surrogates and characters the encoding cannot represent are
    /// replaced and counted.
    pub fn from_unicode(&self, input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8> {
        match &self.engine {
            Engine::Native(engine) => engine.from_unicode(input, state),
            Engine::External(codec) => codec.from_unicode(input, state),
            Engine::Library(codec) => codec.from_unicode(input, state),
            Engine::Plugin(codec) => codec.from_unicode(input, state),
        }
    }

    /// Ends a decoding stream, replacing any input still carried in `state`.
    pub fn flush_to_unicode(&self, state: &mut ConverterState) -> Vec<u16> {
        match &self.engine {
            Engine::Native(engine) => engine.flush_to_unicode(state),
            Engine::External(codec) => codec.flush_to_unicode(state),
            Engine::Library(codec) => codec.flush_to_unicode(state),
            Engine::Plugin(codec) => codec.flush_to_unicode(state),
        }
    }

    /// Ends an encoding stream, writing any trailer and replacing input
    /// still carried in `state`.
    pub fn flush_from_unicode(&self, state: &mut ConverterState) -> Vec<u8> {
        match &self.engine {
            Engine::Native(engine) => engine.flush_from_unicode(state),
            Engine::External(codec) => codec.flush_from_unicode(state),
            Engine::Library(codec) => codec.flush_from_unicode(state),
            Engine::Plugin(codec) => codec.flush_from_unicode(state),
        }
    }

    /// Decodes a complete byte buffer into a `String`.
    pub fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf16_lossy(&self.to_unicode(bytes, None))
    }

    /// Encodes a complete string.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.from_unicode(&units, None)
    }

    /// Returns `true` if every character of `text` is representable.
    pub fn can_encode(&self, text: &str) -> bool {
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut state = ConverterState::with_flags(ConversionFlags::CONVERT_INVALID_TO_NULL);
        self.from_unicode(&units, Some(&mut state));
        self.flush_from_unicode(&mut state);
        state.invalid_chars == 0
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("name", &self.name)
            .field("mib", &self.mib)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8() -> Codec {
        Codec::native("UTF-8", 106, &["UTF8"], NativeEngine::Utf8)
    }

    #[test]
    fn test_names() {
        let codec = utf8();
        assert_eq!(codec.name(), "UTF-8");
        assert_eq!(codec.mib(), 106);
        assert_eq!(codec.kind(), CodecKind::Native);
        assert!(codec.matches_name("utf8"));
        assert!(codec.matches_name(b"Utf-8"));
        assert!(!codec.matches_name("utf-16"));
        assert_eq!(codec.all_names().collect::<Vec<_>>(), ["UTF-8", "UTF8"]);
    }

    #[test]
    fn test_decode_encode() {
        let codec = utf8();
        assert_eq!(codec.decode("héllo 😀".as_bytes()), "héllo 😀");
        assert_eq!(codec.encode("héllo 😀"), "héllo 😀".as_bytes());
    }

    #[test]
    fn test_can_encode() {
        let latin1 = Codec::native("ISO-8859-1", 4, &[], NativeEngine::Latin1);
        assert!(latin1.can_encode("café"));
        assert!(!latin1.can_encode("€"));
        assert!(utf8().can_encode("€😀"));
    }

    #[test]
    fn test_flush_replaces_carried_bytes() {
        let codec = utf8();
        let mut state = ConverterState::new();
        assert!(codec.to_unicode(&[0xE2, 0x82], Some(&mut state)).is_empty());
        assert_eq!(codec.flush_to_unicode(&mut state), vec![0xFFFD, 0xFFFD]);
        assert_eq!(state.invalid_chars, 2);
        assert!(state.is_idle());
    }

    struct Rot13;

    impl PluginCodec for Rot13 {
        fn to_unicode(&self, input: &[u8], _state: Option<&mut ConverterState>) -> Vec<u16> {
            input.iter().map(|&b| rot13(b) as u16).collect()
        }

        fn from_unicode(&self, input: &[u16], _state: Option<&mut ConverterState>) -> Vec<u8> {
            input.iter().map(|&u| rot13(u as u8)).collect()
        }
    }

    fn rot13(b: u8) -> u8 {
        match b {
            b'a'..=b'z' => (b - b'a' + 13) % 26 + b'a',
            b'A'..=b'Z' => (b - b'A' + 13) % 26 + b'A',
            _ => b,
        }
    }

    #[test]
    fn test_plugin_dispatch() {
        let codec = Codec::plugin("x-rot13", 0, ["rot13"], Rot13);
        assert_eq!(codec.kind(), CodecKind::Plugin);
        assert_eq!(codec.decode(b"uryyb"), "hello");
        assert_eq!(codec.encode("hello"), b"uryyb");
        assert!(codec.matches_name("ROT-13"));
    }
}
