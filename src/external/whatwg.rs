use encoding_rs::{DecoderResult, Encoder, EncoderResult, Encoding};

use super::{Conversion, ConvertStatus, TranscodeHandle, Transcoder, UNICODE_ENCODING};
use crate::error::BridgeError;
use crate::unicode::{is_high_surrogate, lone_surrogate};

/// Encodings offered by [`WhatwgTranscoder`].
static ENCODINGS: &[&Encoding] = &[
    encoding_rs::UTF_8,
    encoding_rs::IBM866,
    encoding_rs::ISO_8859_2,
    encoding_rs::ISO_8859_3,
    encoding_rs::ISO_8859_4,
    encoding_rs::ISO_8859_5,
    encoding_rs::ISO_8859_6,
    encoding_rs::ISO_8859_7,
    encoding_rs::ISO_8859_8,
    encoding_rs::ISO_8859_8_I,
    encoding_rs::ISO_8859_10,
    encoding_rs::ISO_8859_13,
    encoding_rs::ISO_8859_14,
    encoding_rs::ISO_8859_15,
    encoding_rs::ISO_8859_16,
    encoding_rs::KOI8_R,
    encoding_rs::KOI8_U,
    encoding_rs::MACINTOSH,
    encoding_rs::WINDOWS_874,
    encoding_rs::WINDOWS_1250,
    encoding_rs::WINDOWS_1251,
    encoding_rs::WINDOWS_1252,
    encoding_rs::WINDOWS_1253,
    encoding_rs::WINDOWS_1254,
    encoding_rs::WINDOWS_1255,
    encoding_rs::WINDOWS_1256,
    encoding_rs::WINDOWS_1257,
    encoding_rs::WINDOWS_1258,
    encoding_rs::X_MAC_CYRILLIC,
    encoding_rs::GBK,
    encoding_rs::GB18030,
    encoding_rs::BIG5,
    encoding_rs::EUC_JP,
    encoding_rs::ISO_2022_JP,
    encoding_rs::SHIFT_JIS,
    encoding_rs::EUC_KR,
    encoding_rs::X_USER_DEFINED,
];

/// A [`Transcoder`] over the WHATWG encodings implemented by `encoding_rs`.
///
/// Only encodings that `encoding_rs` can write as well as read are offered,
/// which leaves out the UTF-16 variants and the replacement encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatwgTranscoder;

impl WhatwgTranscoder {
    /// Creates the transcoder.
    pub fn new() -> Self {
        Self
    }
}

fn encoding_for(name: &str) -> Option<&'static Encoding> {
    Encoding::for_label_no_replacement(name.trim().as_bytes())
        .filter(|enc| enc.output_encoding() == *enc)
}

impl Transcoder for WhatwgTranscoder {
    fn canonical_name(&self, name: &str) -> Option<String> {
        encoding_for(name).map(|enc| enc.name().to_owned())
    }

    fn open(&self, to: &str, from: &str) -> Result<Box<dyn TranscodeHandle>, BridgeError> {
        if from == UNICODE_ENCODING {
            let enc = encoding_for(to).ok_or_else(|| BridgeError::UnknownEncoding(to.to_owned()))?;
            return Ok(Box::new(EncodeHandle::new(enc)));
        }
        if to == UNICODE_ENCODING {
            let enc = encoding_for(from).ok_or_else(|| BridgeError::UnknownEncoding(from.to_owned()))?;
            return Ok(Box::new(DecodeHandle::new(enc)));
        }
        Err(BridgeError::UnsupportedConversion {
            from: from.to_owned(),
            to: to.to_owned(),
        })
    }

    fn available_names(&self) -> Vec<String> {
        ENCODINGS.iter().map(|enc| enc.name().to_owned()).collect()
    }
}

/// Bytes to UTF-16LE.
///
/// `encoding_rs` keeps partial sequences inside the decoder, so input is
/// always consumed in full and the tail only surfaces in [`finish`].
///
/// [`finish`]: TranscodeHandle::finish
struct DecodeHandle {
    encoding: &'static Encoding,
    decoder: encoding_rs::Decoder,
    scratch: Vec<u16>,
}

impl DecodeHandle {
    fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            decoder: encoding.new_decoder_without_bom_handling(),
            scratch: Vec::new(),
        }
    }

    fn run(&mut self, input: &[u8], output: &mut [u8], last: bool) -> (DecoderResult, usize, usize) {
        self.scratch.clear();
        self.scratch.resize(output.len() / 2, 0);
        let (result, read, units) =
            self.decoder
                .decode_to_utf16_without_replacement(input, &mut self.scratch, last);
        for (chunk, unit) in output.chunks_exact_mut(2).zip(&self.scratch[..units]) {
            chunk.copy_from_slice(&unit.to_le_bytes());
        }
        (result, read, units * 2)
    }
}

impl TranscodeHandle for DecodeHandle {
    fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Conversion {
        let (result, read, written) = self.run(input, output, false);
        let status = match result {
            DecoderResult::InputEmpty => ConvertStatus::Complete,
            DecoderResult::OutputFull => ConvertStatus::OutputFull,
            DecoderResult::Malformed(_, _) => ConvertStatus::Discarded,
        };
        Conversion::new(read, written, status)
    }

    fn finish(&mut self, output: &mut [u8]) -> Conversion {
        let (result, _, written) = self.run(&[], output, true);
        let status = match result {
            DecoderResult::InputEmpty => {
                self.reset();
                ConvertStatus::Complete
            }
            DecoderResult::OutputFull => ConvertStatus::OutputFull,
            DecoderResult::Malformed(_, _) => ConvertStatus::Discarded,
        };
        Conversion::new(0, written, status)
    }

    fn reset(&mut self) {
        self.decoder = self.encoding.new_decoder_without_bom_handling();
    }
}

/// UTF-16LE to bytes.
struct EncodeHandle {
    encoding: &'static Encoding,
    encoder: Encoder,
    units: Vec<u16>,
}

impl EncodeHandle {
    fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            encoder: encoding.new_encoder(),
            units: Vec::new(),
        }
    }
}

impl TranscodeHandle for EncodeHandle {
    fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Conversion {
        self.units.clear();
        self.units.extend(
            input
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        );
        // A high surrogate at the end may pair with the next call's input.
        if self.units.last().is_some_and(|&u| is_high_surrogate(u)) {
            self.units.pop();
        }
        let held = input.len() - self.units.len() * 2;

        // encoding_rs would write U+FFFD for an unpaired surrogate, which
        // UTF-8 and GB18030 can represent. Stop in front of it instead.
        let lone = lone_surrogate(&self.units);
        let valid = lone.unwrap_or(self.units.len());
        let (result, read, written) =
            self.encoder
                .encode_from_utf16_without_replacement(&self.units[..valid], output, false);
        let status = match result {
            EncoderResult::InputEmpty if lone.is_some() => ConvertStatus::Invalid,
            EncoderResult::InputEmpty if held > 0 => ConvertStatus::Incomplete,
            EncoderResult::InputEmpty => ConvertStatus::Complete,
            EncoderResult::OutputFull => ConvertStatus::OutputFull,
            EncoderResult::Unmappable(_) => ConvertStatus::Discarded,
        };
        Conversion::new(read * 2, written, status)
    }

    fn finish(&mut self, output: &mut [u8]) -> Conversion {
        let (result, _, written) =
            self.encoder
                .encode_from_utf16_without_replacement(&[], output, true);
        let status = match result {
            EncoderResult::OutputFull => ConvertStatus::OutputFull,
            EncoderResult::InputEmpty | EncoderResult::Unmappable(_) => {
                self.reset();
                ConvertStatus::Complete
            }
        };
        Conversion::new(0, written, status)
    }

    fn reset(&mut self) {
        self.encoder = self.encoding.new_encoder();
    }
}
