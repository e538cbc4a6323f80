//! Bridge to a full Unicode conversion library.
//!
//! A [`ConversionLibrary`] knows many encodings by many names and can say
//! which of them is the standard (MIME or IANA preferred) spelling. The
//! registry uses [`canonicalize`] to turn a requested name into the name a
//! codec is built under, and wraps the library's converters in a codec.

#[cfg(feature = "whatwg")]
mod catalog;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::latin1::{self, LATIN1_MAX};
use crate::state::{ConversionFlags, ConverterState};

#[cfg(feature = "whatwg")]
pub use catalog::WhatwgLibrary;

/// Naming standard for [`ConversionLibrary::standard_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameStandard {
    /// The MIME preferred name.
    Mime,
    /// The IANA preferred name.
    Iana,
}

/// A conversion library with its own catalogue of encodings.
pub trait ConversionLibrary: Send + Sync {
    /// Returns the name `standard` prefers for the encoding `name`, if the
    /// library knows the encoding and the standard names it.
    fn standard_name(&self, name: &str, standard: NameStandard) -> Option<String>;

    /// Returns every name the library accepts for `name`'s encoding.
    fn aliases(&self, name: &str) -> Vec<String>;

    /// Returns the names of every encoding in the catalogue.
    fn available_names(&self) -> Vec<String>;

    /// Opens a converter, or `None` if the library has no data for `name`.
    fn open(&self, name: &str) -> Option<Box<dyn LibraryConverter>>;
}

/// A converter opened by a [`ConversionLibrary`].
///
/// Converters buffer partial input themselves. Passing `flush` ends the
/// stream: leftovers are replaced and the converter starts over.
pub trait LibraryConverter: Send {
    /// Decodes `input`, appending to `out`. Returns the number of invalid
    /// sequences, each replaced by `replacement`.
    fn to_unicode(&mut self, input: &[u8], replacement: u16, flush: bool, out: &mut Vec<u16>) -> usize;

    /// Encodes `input`, appending to `out`. Returns the number of
    /// unencodable characters, each replaced by `replacement`.
    fn from_unicode(&mut self, input: &[u16], replacement: u8, flush: bool, out: &mut Vec<u8>) -> usize;

    /// Drops buffered input and returns to the initial state.
    fn reset(&mut self);
}

/// Result of [`canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    /// Name to build the codec under.
    pub name: String,
    /// The library has no standard name for the encoding; only a codec
    /// already registered under this name can serve it.
    pub local_only: bool,
}

/// Historical names the library data gets wrong.
const LEGACY_NAMES: &[(&str, &str)] = &[
    ("CP949", "windows-949"),
    ("Apple Roman", "macintosh"),
    ("windows-874-2000", "TIS-620"),
    ("windows-874", "TIS-620"),
    ("MS874", "TIS-620"),
    ("x-windows-874", "TIS-620"),
    ("ISO 8859-11", "TIS-620"),
];

/// Standard names whose encoding is a subset of a more complete one.
const SUPERSETS: &[(&str, &str)] = &[
    ("GB2312", "GBK"),
    ("GB_2312-80", "GBK"),
    ("KSC_5601", "windows-949"),
    ("EUC-KR", "windows-949"),
    ("cp1363", "windows-949"),
];

/// Resolves `requested` to the name a library-backed codec is built under.
pub fn canonicalize(library: &dyn ConversionLibrary, requested: &str) -> Canonical {
    let requested = LEGACY_NAMES
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(requested))
        .map_or(requested, |(_, modern)| *modern);

    let standard = library
        .standard_name(requested, NameStandard::Mime)
        .or_else(|| library.standard_name(requested, NameStandard::Iana));

    match standard {
        Some(name) => {
            let name = SUPERSETS
                .iter()
                .find(|(subset, _)| *subset == name)
                .map_or(name, |(_, superset)| (*superset).to_owned());
            Canonical {
                name,
                local_only: false,
            }
        }
        None => Canonical {
            name: requested.to_owned(),
            local_only: true,
        },
    }
}

/// A codec whose conversions run through a conversion library.
pub(crate) struct LibraryCodec {
    name: String,
    library: Arc<dyn ConversionLibrary>,
    warned: AtomicBool,
}

impl LibraryCodec {
    pub(crate) fn new(name: String, library: Arc<dyn ConversionLibrary>) -> Self {
        Self {
            name,
            library,
            warned: AtomicBool::new(false),
        }
    }

    fn open(&self) -> Option<Box<dyn LibraryConverter>> {
        let converter = self.library.open(&self.name);
        if converter.is_none() && !self.warned.swap(true, Ordering::Relaxed) {
            warn!(encoding = %self.name, "conversion library cannot open encoding, falling back to ISO-8859-1");
        }
        converter
    }

    pub(crate) fn to_unicode(&self, input: &[u8], state: Option<&mut ConverterState>) -> Vec<u16> {
        let mut out = Vec::with_capacity(input.len());

        let Some(state) = state else {
            let Some(mut converter) = self.open() else {
                return latin1::to_unicode(input, LATIN1_MAX, None);
            };
            let replacement = ConversionFlags::DEFAULT.replacement_unit();
            converter.to_unicode(input, replacement, true, &mut out);
            return out;
        };

        let mut lib = state.take_library(&self.name);
        let Some(mut converter) = lib.converter.take().or_else(|| self.open()) else {
            state.store_library(lib);
            return latin1::to_unicode(input, LATIN1_MAX, Some(state));
        };
        state.invalid_chars += converter.to_unicode(input, state.flags.replacement_unit(), false, &mut out);
        lib.converter = Some(converter);
        state.store_library(lib);
        out
    }

    pub(crate) fn from_unicode(&self, input: &[u16], state: Option<&mut ConverterState>) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());

        let Some(state) = state else {
            let Some(mut converter) = self.open() else {
                return latin1::from_unicode(input, LATIN1_MAX, None);
            };
            let replacement = ConversionFlags::DEFAULT.replacement_byte();
            converter.from_unicode(input, replacement, true, &mut out);
            return out;
        };

        let mut lib = state.take_library(&self.name);
        let Some(mut converter) = lib.converter.take().or_else(|| self.open()) else {
            state.store_library(lib);
            return latin1::from_unicode(input, LATIN1_MAX, Some(state));
        };
        state.invalid_chars += converter.from_unicode(input, state.flags.replacement_byte(), false, &mut out);
        lib.converter = Some(converter);
        state.store_library(lib);
        out
    }

    pub(crate) fn flush_to_unicode(&self, state: &mut ConverterState) -> Vec<u16> {
        let mut out = Vec::new();
        let mut lib = state.take_library(&self.name);
        if let Some(converter) = lib.converter.as_mut() {
            state.invalid_chars += converter.to_unicode(&[], state.flags.replacement_unit(), true, &mut out);
        }
        state.store_library(lib);
        out
    }

    pub(crate) fn flush_from_unicode(&self, state: &mut ConverterState) -> Vec<u8> {
        let mut out = Vec::new();
        let mut lib = state.take_library(&self.name);
        if let Some(converter) = lib.converter.as_mut() {
            state.invalid_chars += converter.from_unicode(&[], state.flags.replacement_byte(), true, &mut out);
        }
        state.store_library(lib);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::names_match;

    /// A library that knows names but has no conversion data.
    struct NamesOnly;

    const KNOWN: &[(&str, Option<&str>, Option<&str>)] = &[
        ("GB2312", Some("GB2312"), Some("GB2312")),
        ("EUC-KR", Some("EUC-KR"), Some("EUC-KR")),
        ("KSC_5601", None, Some("KSC_5601")),
        ("windows-949", None, Some("windows-949")),
        ("TIS-620", Some("TIS-620"), Some("TIS-620")),
        ("macintosh", None, Some("macintosh")),
        ("x-windows-874", Some("windows-874"), None),
    ];

    impl ConversionLibrary for NamesOnly {
        fn standard_name(&self, name: &str, standard: NameStandard) -> Option<String> {
            let (_, mime, iana) = KNOWN.iter().find(|(n, _, _)| names_match(n, name))?;
            let found = match standard {
                NameStandard::Mime => mime,
                NameStandard::Iana => iana,
            };
            found.map(str::to_owned)
        }

        fn aliases(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }

        fn available_names(&self) -> Vec<String> {
            KNOWN.iter().map(|(n, _, _)| (*n).to_owned()).collect()
        }

        fn open(&self, _name: &str) -> Option<Box<dyn LibraryConverter>> {
            None
        }
    }

    fn canonical(name: &str) -> (String, bool) {
        let c = canonicalize(&NamesOnly, name);
        (c.name, c.local_only)
    }

    #[test]
    fn test_subsets_remapped() {
        assert_eq!(canonical("gb2312"), ("GBK".to_owned(), false));
        assert_eq!(canonical("euc-kr"), ("windows-949".to_owned(), false));
        assert_eq!(canonical("KSC_5601"), ("windows-949".to_owned(), false));
    }

    #[test]
    fn test_legacy_names() {
        assert_eq!(canonical("CP949"), ("windows-949".to_owned(), false));
        assert_eq!(canonical("Apple Roman"), ("macintosh".to_owned(), false));
    }

    #[test]
    fn test_thai_aliases_ignore_library() {
        // The library would call this windows-874.
        assert_eq!(canonical("x-windows-874"), ("TIS-620".to_owned(), false));
        assert_eq!(canonical("MS874"), ("TIS-620".to_owned(), false));
    }

    #[test]
    fn test_unknown_is_local_only() {
        assert_eq!(canonical("x-nothing"), ("x-nothing".to_owned(), true));
    }

    #[test]
    fn test_unopenable_falls_back_to_latin1() {
        let codec = LibraryCodec::new("TIS-620".to_owned(), Arc::new(NamesOnly));
        let mut state = ConverterState::new();
        assert_eq!(codec.to_unicode(b"a\xE9", Some(&mut state)), vec![0x61, 0xE9]);
        assert_eq!(codec.from_unicode(&[0x0E01], None), b"?");
        assert!(codec.flush_to_unicode(&mut state).is_empty());
    }
}
