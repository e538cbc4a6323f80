//! Text codecs: conversion between byte encodings and UTF-16.
//!
//! This crate resolves encoding names and IANA MIB numbers to [`Codec`]s
//! through a [`Registry`], and converts with them either in one shot or
//! across chunk boundaries with a [`ConverterState`]. UTF-8, UTF-16,
//! UTF-32, ISO-8859-1 and US-ASCII are implemented natively; everything else
//! goes through an external [`Transcoder`] or a [`ConversionLibrary`], both
//! backed by `encoding_rs` with the default `whatwg` feature.
//!
//! # Example
//!
//! ```
//! use textcodec::{ConverterState, Registry};
//!
//! let registry = Registry::new();
//! let codec = registry.lookup_by_name("utf8").unwrap();
//!
//! // One shot.
//! assert_eq!(codec.decode(b"\xF0\x9F\x98\x80"), "😀");
//!
//! // Chunked: the split sequence is carried in the state.
//! let mut state = ConverterState::new();
//! let mut units = codec.to_unicode(b"\xF0\x9F", Some(&mut state));
//! units.extend(codec.to_unicode(b"\x98\x80", Some(&mut state)));
//! assert_eq!(units, [0xD83D, 0xDE00]);
//! ```

#![warn(missing_docs)]

/// Codecs and their conversion engines.
pub mod codec;
/// Error types.
pub mod error;
/// Bridge to a general multi-encoding transcoder.
pub mod external;
/// Bridge to a Unicode conversion library.
pub mod library;
/// Locale inputs for system codec discovery.
pub mod locale;
/// IANA MIB numbers and their names.
pub mod mib;
/// Forgiving encoding name comparison.
pub mod name;
/// Codec lookup and registration.
pub mod registry;
/// BOM and HTML charset detection.
pub mod sniff;
/// Cross-call conversion state.
pub mod state;
/// Chunked decoding and encoding.
pub mod stream;

mod latin1;
mod unicode;
mod utf16;
mod utf32;
mod utf8;

pub use codec::{Codec, CodecKind, Endianness, NativeEngine, PluginCodec};
pub use error::{BridgeError, TranscodeError, UnknownEncodingError};
pub use external::{Conversion, ConvertStatus, Direction, HandlePool, TranscodeHandle, Transcoder};
#[cfg(feature = "whatwg")]
pub use external::WhatwgTranscoder;
pub use library::{ConversionLibrary, LibraryConverter, NameStandard};
#[cfg(feature = "whatwg")]
pub use library::WhatwgLibrary;
pub use locale::LocaleEnv;
pub use name::names_match;
pub use registry::{Registry, RegistryBuilder};
pub use sniff::{Bom, HtmlCharset};
pub use state::{ConversionFlag, ConversionFlags, ConverterState};
pub use stream::{TextDecoder, TextEncoder};
