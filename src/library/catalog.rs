use encoding_rs::{Decoder, DecoderResult, Encoder, EncoderResult, Encoding};

use super::{ConversionLibrary, LibraryConverter, NameStandard};
use crate::name::names_match;
use crate::unicode::{is_high_surrogate, lone_surrogate};

const CHUNK: usize = 1024;

struct Entry {
    name: &'static str,
    mime: Option<&'static str>,
    iana: Option<&'static str>,
    aliases: &'static [&'static str],
    encoding: &'static Encoding,
}

impl Entry {
    fn matches(&self, query: &str) -> bool {
        names_match(self.name, query) || self.aliases.iter().any(|a| names_match(a, query))
    }
}

macro_rules! entry {
    ($name:literal, $mime:expr, $iana:expr, [$($alias:literal),* $(,)?], $encoding:ident) => {
        Entry {
            name: $name,
            mime: $mime,
            iana: $iana,
            aliases: &[$($alias),*],
            encoding: encoding_rs::$encoding,
        }
    };
}

#[rustfmt::skip]
static CATALOG: &[Entry] = &[
    entry!("GB2312", Some("GB2312"), Some("GB2312"), ["csGB2312", "EUC-CN"], GBK),
    entry!("GB_2312-80", None, Some("GB_2312-80"), ["chinese", "iso-ir-58", "csISO58GB231280"], GBK),
    entry!("GBK", None, Some("GBK"), ["CP936", "MS936", "windows-936"], GBK),
    entry!("GB18030", Some("GB18030"), Some("GB18030"), ["ibm-1392"], GB18030),
    entry!("KSC_5601", None, Some("KSC_5601"), ["KS_C_5601-1987", "KS_C_5601-1989", "korean", "iso-ir-149", "csKSC56011987"], EUC_KR),
    entry!("EUC-KR", Some("EUC-KR"), Some("EUC-KR"), ["csEUCKR"], EUC_KR),
    entry!("cp1363", None, Some("cp1363"), ["ibm-1363"], EUC_KR),
    entry!("windows-949", None, Some("windows-949"), ["ms949", "UHC"], EUC_KR),
    entry!("Big5", Some("Big5"), Some("Big5"), ["csBig5", "Big5-HKSCS"], BIG5),
    entry!("Shift_JIS", Some("Shift_JIS"), Some("Shift_JIS"), ["MS_Kanji", "csShiftJIS", "SJIS"], SHIFT_JIS),
    entry!("EUC-JP", Some("EUC-JP"), Some("EUC-JP"), ["csEUCPkdFmtJapanese"], EUC_JP),
    entry!("ISO-2022-JP", Some("ISO-2022-JP"), Some("ISO-2022-JP"), ["csISO2022JP"], ISO_2022_JP),
    entry!("macintosh", None, Some("macintosh"), ["mac", "csMacintosh"], MACINTOSH),
    entry!("TIS-620", Some("TIS-620"), Some("TIS-620"), ["ISO-8859-11"], WINDOWS_874),
    entry!("KOI8-R", Some("KOI8-R"), Some("KOI8-R"), ["csKOI8R"], KOI8_R),
    entry!("KOI8-U", Some("KOI8-U"), Some("KOI8-U"), [], KOI8_U),
    entry!("IBM866", None, Some("IBM866"), ["cp866", "csIBM866"], IBM866),
    entry!("ISO-8859-2", Some("ISO-8859-2"), Some("ISO-8859-2"), ["latin2", "l2", "csISOLatin2"], ISO_8859_2),
    entry!("ISO-8859-3", Some("ISO-8859-3"), Some("ISO-8859-3"), ["latin3", "l3", "csISOLatin3"], ISO_8859_3),
    entry!("ISO-8859-4", Some("ISO-8859-4"), Some("ISO-8859-4"), ["latin4", "l4", "csISOLatin4"], ISO_8859_4),
    entry!("ISO-8859-5", Some("ISO-8859-5"), Some("ISO-8859-5"), ["cyrillic", "csISOLatinCyrillic"], ISO_8859_5),
    entry!("ISO-8859-6", Some("ISO-8859-6"), Some("ISO-8859-6"), ["arabic", "csISOLatinArabic"], ISO_8859_6),
    entry!("ISO-8859-7", Some("ISO-8859-7"), Some("ISO-8859-7"), ["greek", "csISOLatinGreek"], ISO_8859_7),
    entry!("ISO-8859-8", Some("ISO-8859-8"), Some("ISO-8859-8"), ["hebrew", "csISOLatinHebrew"], ISO_8859_8),
    entry!("ISO-8859-9", Some("ISO-8859-9"), Some("ISO-8859-9"), ["latin5", "l5", "csISOLatin5"], WINDOWS_1254),
    entry!("ISO-8859-10", Some("ISO-8859-10"), Some("ISO-8859-10"), ["latin6", "l6", "csISOLatin6"], ISO_8859_10),
    entry!("ISO-8859-13", None, Some("ISO-8859-13"), [], ISO_8859_13),
    entry!("ISO-8859-14", None, Some("ISO-8859-14"), ["latin8", "l8", "iso-celtic"], ISO_8859_14),
    entry!("ISO-8859-15", None, Some("ISO-8859-15"), ["latin-9", "csISOLatin9"], ISO_8859_15),
    entry!("ISO-8859-16", None, Some("ISO-8859-16"), ["latin10", "l10"], ISO_8859_16),
    entry!("windows-1250", None, Some("windows-1250"), ["cp1250"], WINDOWS_1250),
    entry!("windows-1251", None, Some("windows-1251"), ["cp1251"], WINDOWS_1251),
    entry!("windows-1252", None, Some("windows-1252"), ["cp1252"], WINDOWS_1252),
    entry!("windows-1253", None, Some("windows-1253"), ["cp1253"], WINDOWS_1253),
    entry!("windows-1254", None, Some("windows-1254"), ["cp1254"], WINDOWS_1254),
    entry!("windows-1255", None, Some("windows-1255"), ["cp1255"], WINDOWS_1255),
    entry!("windows-1256", None, Some("windows-1256"), ["cp1256"], WINDOWS_1256),
    entry!("windows-1257", None, Some("windows-1257"), ["cp1257"], WINDOWS_1257),
    entry!("windows-1258", None, Some("windows-1258"), ["cp1258"], WINDOWS_1258),
    entry!("x-mac-cyrillic", None, None, ["mac-cyrillic"], X_MAC_CYRILLIC),
];

/// A [`ConversionLibrary`] serving a fixed catalogue of legacy encodings
/// through `encoding_rs`.
///
/// The catalogue keeps the distinctions a standards-based library makes:
/// subset encodings such as `GB2312` and `KSC_5601` are separate entries
/// with their own standard names, and some encodings have no standard name
/// at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatwgLibrary;

impl WhatwgLibrary {
    /// Creates the library.
    pub fn new() -> Self {
        Self
    }

    fn find(name: &str) -> Option<&'static Entry> {
        CATALOG.iter().find(|e| e.matches(name))
    }
}

impl ConversionLibrary for WhatwgLibrary {
    fn standard_name(&self, name: &str, standard: NameStandard) -> Option<String> {
        let entry = Self::find(name)?;
        let name = match standard {
            NameStandard::Mime => entry.mime,
            NameStandard::Iana => entry.iana,
        };
        name.map(str::to_owned)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        Self::find(name)
            .map(|e| e.aliases.iter().map(|a| (*a).to_owned()).collect())
            .unwrap_or_default()
    }

    fn available_names(&self) -> Vec<String> {
        CATALOG.iter().map(|e| e.name.to_owned()).collect()
    }

    fn open(&self, name: &str) -> Option<Box<dyn LibraryConverter>> {
        let entry = Self::find(name)?;
        Some(Box::new(Converter::new(entry.encoding)))
    }
}

struct Converter {
    encoding: &'static Encoding,
    decoder: Decoder,
    encoder: Encoder,
    high: Option<u16>,
}

impl Converter {
    fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            decoder: encoding.new_decoder_without_bom_handling(),
            encoder: encoding.new_encoder(),
            high: None,
        }
    }
}

impl LibraryConverter for Converter {
    fn to_unicode(&mut self, mut input: &[u8], replacement: u16, flush: bool, out: &mut Vec<u16>) -> usize {
        let mut buf = [0u16; CHUNK];
        let mut invalid = 0;
        loop {
            let (result, read, written) =
                self.decoder
                    .decode_to_utf16_without_replacement(input, &mut buf, flush);
            input = &input[read..];
            out.extend_from_slice(&buf[..written]);
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(_, _) => {
                    invalid += 1;
                    out.push(replacement);
                }
            }
        }
        if flush {
            self.reset();
        }
        invalid
    }

    fn from_unicode(&mut self, input: &[u16], replacement: u8, flush: bool, out: &mut Vec<u8>) -> usize {
        let mut units: Vec<u16> = self.high.take().into_iter().chain(input.iter().copied()).collect();
        if !flush && units.last().is_some_and(|&u| is_high_surrogate(u)) {
            self.high = units.pop();
        }

        let mut buf = [0u8; CHUNK];
        let mut rest = &units[..];
        let mut invalid = 0;
        loop {
            let lone = lone_surrogate(rest);
            let valid = lone.unwrap_or(rest.len());
            let (result, read, written) = self.encoder.encode_from_utf16_without_replacement(
                &rest[..valid],
                &mut buf,
                flush && lone.is_none(),
            );
            rest = &rest[read..];
            out.extend_from_slice(&buf[..written]);
            match result {
                EncoderResult::InputEmpty if lone.is_some() => {
                    rest = &rest[1..];
                    invalid += 1;
                    out.push(replacement);
                }
                EncoderResult::InputEmpty => break,
                EncoderResult::OutputFull => {}
                EncoderResult::Unmappable(_) => {
                    invalid += 1;
                    out.push(replacement);
                }
            }
        }
        if flush {
            self.reset();
        }
        invalid
    }

    fn reset(&mut self) {
        self.decoder = self.encoding.new_decoder_without_bom_handling();
        self.encoder = self.encoding.new_encoder();
        self.high = None;
    }
}
