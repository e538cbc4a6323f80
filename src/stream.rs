//! Streaming decoder and encoder.
//!
//! [`TextDecoder`] and [`TextEncoder`] pair a codec with a
//! [`ConverterState`], so data can be fed in chunks of any size and the
//! output is the same as converting the whole input at once.
//!
//! ```
//! use textcodec::{Registry, TextDecoder};
//!
//! let registry = Registry::builder().without_external().without_library().build();
//! let mut decoder = TextDecoder::new(registry.lookup_by_name("UTF-8").unwrap());
//!
//! let mut text = decoder.decode_str(b"caf\xC3");
//! text += &decoder.decode_str(b"\xA9");
//! text += &decoder.finish_str();
//! assert_eq!(text, "café");
//! assert!(!decoder.has_failure());
//! ```

use std::sync::Arc;

use crate::codec::Codec;
use crate::state::{ConversionFlags, ConverterState};
use crate::unicode::is_high_surrogate;

/// Decodes a byte stream chunk by chunk.
#[derive(Debug)]
pub struct TextDecoder {
    codec: Arc<Codec>,
    state: ConverterState,
    /// High surrogate withheld from `decode_str` output.
    held: Option<u16>,
}

impl TextDecoder {
    /// Creates a decoder with default flags.
    pub fn new(codec: Arc<Codec>) -> Self {
        Self::with_flags(codec, ConversionFlags::DEFAULT)
    }

    /// Creates a decoder with the given flags.
    pub fn with_flags(codec: Arc<Codec>, flags: ConversionFlags) -> Self {
        Self {
            codec,
            state: ConverterState::with_flags(flags),
            held: None,
        }
    }

    /// Returns the codec.
    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    /// Decodes the next chunk to UTF-16.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<u16> {
        let mut units: Vec<u16> = self.held.take().into_iter().collect();
        units.extend(self.codec.to_unicode(bytes, Some(&mut self.state)));
        units
    }

    /// Decodes the next chunk to a `String`.
    ///
    /// A surrogate pair split by the chunk boundary is completed by the next
    /// call instead of being replaced.
    pub fn decode_str(&mut self, bytes: &[u8]) -> String {
        let mut units = self.decode(bytes);
        if units.last().is_some_and(|&u| is_high_surrogate(u)) {
            self.held = units.pop();
        }
        String::from_utf16_lossy(&units)
    }

    /// Ends the stream, replacing any input still held back.
    pub fn finish(&mut self) -> Vec<u16> {
        let mut units: Vec<u16> = self.held.take().into_iter().collect();
        units.extend(self.codec.flush_to_unicode(&mut self.state));
        units
    }

    /// Ends the stream, returning the rest as a `String`.
    pub fn finish_str(&mut self) -> String {
        String::from_utf16_lossy(&self.finish())
    }

    /// Returns `true` if any invalid input has been seen.
    pub fn has_failure(&self) -> bool {
        self.state.invalid_chars > 0
    }

    /// Number of invalid sequences seen so far.
    pub fn invalid_chars(&self) -> usize {
        self.state.invalid_chars
    }
}

/// Encodes text chunk by chunk.
#[derive(Debug)]
pub struct TextEncoder {
    codec: Arc<Codec>,
    state: ConverterState,
}

impl TextEncoder {
    /// Creates an encoder with default flags.
    pub fn new(codec: Arc<Codec>) -> Self {
        Self::with_flags(codec, ConversionFlags::DEFAULT)
    }

    /// Creates an encoder with the given flags.
    pub fn with_flags(codec: Arc<Codec>, flags: ConversionFlags) -> Self {
        Self {
            codec,
            state: ConverterState::with_flags(flags),
        }
    }

    /// Returns the codec.
    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    /// Encodes the next piece of text.
    pub fn encode(&mut self, text: &str) -> Vec<u8> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.encode_utf16(&units)
    }

    /// Encodes the next run of UTF-16 units. A high surrogate at the end is
    /// paired with the start of the next call.
    pub fn encode_utf16(&mut self, units: &[u16]) -> Vec<u8> {
        self.codec.from_unicode(units, Some(&mut self.state))
    }

    /// Ends the stream.
    pub fn finish(&mut self) -> Vec<u8> {
        self.codec.flush_from_unicode(&mut self.state)
    }

    /// Returns `true` if any character could not be encoded.
    pub fn has_failure(&self) -> bool {
        self.state.invalid_chars > 0
    }

    /// Number of characters that could not be encoded.
    pub fn invalid_chars(&self) -> usize {
        self.state.invalid_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Endianness, NativeEngine};

    fn codec(engine: NativeEngine) -> Arc<Codec> {
        Arc::new(Codec::native("test", 0, &[], engine))
    }

    #[test]
    fn test_decode_str_holds_split_pair() {
        let mut decoder = TextDecoder::new(codec(NativeEngine::Utf16(Endianness::Big)));
        assert_eq!(decoder.decode_str(&[0xD8, 0x3D]), "");
        assert_eq!(decoder.decode_str(&[0xDE, 0x00]), "😀");
        assert!(decoder.finish_str().is_empty());
    }

    #[test]
    fn test_finish_replaces_tail() {
        let mut decoder = TextDecoder::new(codec(NativeEngine::Utf8));
        assert_eq!(decoder.decode_str(b"a\xF0\x9F"), "a");
        assert_eq!(decoder.finish_str(), "\u{FFFD}\u{FFFD}");
        assert_eq!(decoder.invalid_chars(), 2);
        assert!(decoder.has_failure());
    }

    #[test]
    fn test_encoder_counts_unencodable() {
        let mut encoder = TextEncoder::new(codec(NativeEngine::Ascii));
        assert_eq!(encoder.encode("naïve"), b"na?ve");
        assert!(encoder.finish().is_empty());
        assert_eq!(encoder.invalid_chars(), 1);
    }

    #[test]
    fn test_encoder_pairs_across_calls() {
        let mut encoder = TextEncoder::new(codec(NativeEngine::Utf8));
        let mut out = encoder.encode_utf16(&[0xD83D]);
        out.extend(encoder.encode_utf16(&[0xDE00]));
        out.extend(encoder.finish());
        assert_eq!(out, "😀".as_bytes());
        assert!(!encoder.has_failure());
    }

    #[test]
    fn test_utf16_detect_writes_bom_once() {
        let mut encoder = TextEncoder::new(codec(NativeEngine::Utf16(Endianness::Detect)));
        let mut out = encoder.encode("a");
        out.extend(encoder.encode("b"));
        assert_eq!(out, [0xFE, 0xFF, 0x00, 0x61, 0x00, 0x62]);
    }
}
