//! The codec registry.
//!
//! A [`Registry`] owns every codec it has handed out and resolves names and
//! MIB numbers to them. The built-in codecs are collected at link time with
//! `inventory`; codecs backed by the external transcoder or the conversion
//! library are created on first lookup and kept for the registry's lifetime.
//!
//! # Example
//!
//! ```
//! use textcodec::Registry;
//!
//! let registry = Registry::builder().without_external().without_library().build();
//! let codec = registry.lookup_by_name("iso8859-1").unwrap();
//! assert_eq!(codec.name(), "ISO-8859-1");
//! assert_eq!(codec.decode(b"caf\xE9"), "café");
//! ```

use core::cell::RefCell;
use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, error, warn};

use crate::codec::{Codec, Engine, NativeEngine};
use crate::error::{TranscodeError, UnknownEncodingError};
use crate::external::{ExternalCodec, HandlePool, Transcoder};
use crate::library::{canonicalize, ConversionLibrary, LibraryCodec};
use crate::locale::LocaleEnv;
use crate::mib::{self, MIB_LATIN1, MIB_UTF16LE};
use crate::name::names_match;
use crate::sniff::{self, HtmlCharset};
use crate::state::ConverterState;

/// A built-in codec.
///
/// Each native codec module registers one of these per codec via
/// `inventory::submit!`.
#[derive(Debug)]
pub struct BuiltinCodec {
    /// The canonical name (e.g., "UTF-8").
    pub name: &'static str,
    /// The IANA MIB number.
    pub mib: i32,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// The conversion algorithm.
    pub engine: NativeEngine,
}

inventory::collect!(BuiltinCodec);

/// Returns an iterator over all built-in codecs, in link order.
pub fn builtins() -> impl Iterator<Item = &'static BuiltinCodec> {
    inventory::iter::<BuiltinCodec>()
}

/// Names that resolve to the system codec.
const SYSTEM_NAMES: [&str; 2] = ["System", "locale"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Empty,
    Ready,
    Failed,
}

struct Catalog {
    status: Status,
    /// In precedence order.
    codecs: Vec<Arc<Codec>>,
    by_name: HashMap<Vec<u8>, Arc<Codec>>,
    by_mib: HashMap<i32, Arc<Codec>>,
    system: Option<Arc<Codec>>,
}

impl Catalog {
    fn new() -> Self {
        Self {
            status: Status::Empty,
            codecs: Vec::new(),
            by_name: HashMap::new(),
            by_mib: HashMap::new(),
            system: None,
        }
    }

    fn populate(&mut self) {
        let mut builtins: Vec<&BuiltinCodec> = builtins().collect();
        builtins.sort_by_key(|b| b.mib);

        if let Err(err) = self.codecs.try_reserve(builtins.len()) {
            error!(%err, "cannot allocate the codec registry, text codecs are unavailable");
            self.status = Status::Failed;
            return;
        }
        self.codecs.extend(
            builtins
                .iter()
                .map(|b| Arc::new(Codec::native(b.name, b.mib, b.aliases, b.engine))),
        );
        self.status = Status::Ready;
        debug!(codecs = self.codecs.len(), "codec registry populated");
    }

    fn find_name(&self, name: &[u8]) -> Option<Arc<Codec>> {
        if let Some(codec) = self.by_name.get(name) {
            return Some(codec.clone());
        }
        self.codecs.iter().find(|c| c.matches_name(name)).cloned()
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        // Caches go first so no entry outlives the list it points into.
        self.system = None;
        self.by_mib.clear();
        self.by_name.clear();
    }
}

struct Shared {
    catalog: ReentrantMutex<RefCell<Catalog>>,
    external: Option<Arc<dyn Transcoder>>,
    library: Option<Arc<dyn ConversionLibrary>>,
    pool: Arc<HandlePool>,
    locale: LocaleEnv,
}

/// A shared handle to a set of codecs.
///
/// Clones share the same codecs and caches. Lookups may be made from any
/// thread; a lookup that needs another lookup (the system codec, or a
/// bridge codec needing the native UTF-16 codec) re-enters the registry
/// lock on the same thread.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    /// Creates a registry with the default bridges and the process locale.
    pub fn new() -> Self {
        RegistryBuilder::default().build()
    }

    /// Returns a builder for a customised registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the pool of transcoder handles used by stateless conversions.
    pub fn handle_pool(&self) -> &Arc<HandlePool> {
        &self.shared.pool
    }

    /// Runs `f` with the catalog locked and populated. Returns `None` when
    /// the registry could not be initialised.
    fn with_catalog<T>(&self, f: impl FnOnce(&RefCell<Catalog>) -> Option<T>) -> Option<T> {
        let guard = self.shared.catalog.lock();
        {
            let mut catalog = guard.borrow_mut();
            if catalog.status == Status::Empty {
                catalog.populate();
            }
            if catalog.status == Status::Failed {
                return None;
            }
        }
        f(&*guard)
    }

    /// Finds a codec by name.
    ///
    /// Names are compared with [`names_match`], so punctuation and case do
    /// not matter. `"System"` and `"locale"` name the [system
    /// codec](Self::system_codec). Names no registered codec answers to are
    /// offered to the external transcoder first, then to the conversion
    /// library.
    pub fn lookup_by_name(&self, name: impl AsRef<[u8]>) -> Option<Arc<Codec>> {
        let name = name.as_ref();
        if name.is_empty() {
            return None;
        }
        if SYSTEM_NAMES.iter().any(|s| names_match(s, name)) {
            return self.system_codec();
        }

        self.with_catalog(|catalog| {
            let found = catalog.borrow().find_name(name);
            if let Some(codec) = found {
                catalog.borrow_mut().by_name.insert(name.to_vec(), codec.clone());
                return Some(codec);
            }

            let text = core::str::from_utf8(name).ok()?;
            let codec = self
                .external_codec(catalog, text)
                .or_else(|| self.library_codec(catalog, text))?;

            let mut catalog = catalog.borrow_mut();
            if !catalog.codecs.iter().any(|c| Arc::ptr_eq(c, &codec)) {
                catalog.codecs.push(codec.clone());
            }
            catalog.by_name.insert(name.to_vec(), codec.clone());
            catalog.by_name.insert(codec.name().as_bytes().to_vec(), codec.clone());
            Some(codec)
        })
    }

    fn external_codec(&self, catalog: &RefCell<Catalog>, name: &str) -> Option<Arc<Codec>> {
        let external = self.shared.external.as_ref()?;
        let canonical = external.canonical_name(name)?;
        let existing = catalog.borrow().find_name(canonical.as_bytes());
        if existing.is_some() {
            return existing;
        }

        // Re-enters the registry lock.
        let unicode = self.lookup_by_mib(MIB_UTF16LE)?;
        let mib = mib::mib_for_name(&canonical);
        debug!(encoding = %canonical, mib, "creating transcoder-backed codec");
        let engine = ExternalCodec::new(canonical.clone(), external.clone(), self.shared.pool.clone(), unicode);
        Some(Arc::new(Codec::new(canonical, mib, Vec::new(), Engine::External(engine))))
    }

    fn library_codec(&self, catalog: &RefCell<Catalog>, name: &str) -> Option<Arc<Codec>> {
        let library = self.shared.library.as_ref()?;
        let canonical = canonicalize(library.as_ref(), name);
        let existing = catalog.borrow().find_name(canonical.name.as_bytes());
        if existing.is_some() {
            return existing;
        }
        if canonical.local_only {
            return None;
        }
        library.open(&canonical.name)?;

        let mib = mib::mib_for_name(&canonical.name);
        let aliases = library.aliases(&canonical.name);
        debug!(encoding = %canonical.name, mib, "creating library-backed codec");
        let engine = LibraryCodec::new(canonical.name.clone(), library.clone());
        Some(Arc::new(Codec::new(canonical.name, mib, aliases, Engine::Library(engine))))
    }

    /// Finds a codec by IANA MIB number.
    ///
    /// Numbers no registered codec carries are resolved through the static
    /// MIB table and [`lookup_by_name`](Self::lookup_by_name).
    pub fn lookup_by_mib(&self, mib: i32) -> Option<Arc<Codec>> {
        if mib <= 0 {
            return None;
        }
        self.with_catalog(|catalog| {
            {
                let mut catalog = catalog.borrow_mut();
                if let Some(codec) = catalog.by_mib.get(&mib) {
                    return Some(codec.clone());
                }
                if let Some(codec) = catalog.codecs.iter().find(|c| c.mib() == mib).cloned() {
                    catalog.by_mib.insert(mib, codec.clone());
                    return Some(codec);
                }
            }

            let codec = self.lookup_by_name(mib::name_for_mib(mib)?)?;
            catalog.borrow_mut().by_mib.insert(mib, codec.clone());
            Some(codec)
        })
    }

    /// Adds `codec` ahead of every codec already registered.
    ///
    /// Cached lookups that `codec` answers to are dropped; all others stay.
    /// A registry that failed to initialise ignores the codec.
    pub fn register(&self, codec: Codec) -> Arc<Codec> {
        let codec = Arc::new(codec);
        let guard = self.shared.catalog.lock();
        let mut catalog = guard.borrow_mut();
        if catalog.status == Status::Empty {
            catalog.populate();
        }
        if catalog.status == Status::Failed {
            warn!(name = codec.name(), "codec registry unavailable, codec not registered");
            return codec;
        }

        catalog.codecs.insert(0, codec.clone());
        catalog.by_name.retain(|name, _| !codec.matches_name(name));
        catalog.by_mib.remove(&codec.mib());
        if catalog.system.as_ref().is_some_and(|s| codec.matches_name(s.name())) {
            catalog.system = None;
        }
        debug!(name = codec.name(), mib = codec.mib(), "codec registered");
        codec
    }

    /// Returns the codec for the process locale.
    ///
    /// The [`LocaleEnv`] candidates are tried in order; the first one the
    /// registry can resolve wins. ISO-8859-1 is used when none resolves.
    pub fn system_codec(&self) -> Option<Arc<Codec>> {
        self.with_catalog(|catalog| {
            let cached = catalog.borrow().system.clone();
            if cached.is_some() {
                return cached;
            }

            let found = self
                .shared
                .locale
                .candidates()
                .iter()
                .filter(|name| !SYSTEM_NAMES.iter().any(|s| names_match(s, name)))
                .find_map(|name| self.lookup_by_name(name));
            let codec = match found {
                Some(codec) => codec,
                None => self.lookup_by_mib(MIB_LATIN1)?,
            };
            debug!(name = codec.name(), "system codec selected");
            catalog.borrow_mut().system = Some(codec.clone());
            Some(codec)
        })
    }

    /// Returns every name and alias the registry can resolve, including the
    /// catalogues of the bridges.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .with_catalog(|catalog| {
                let catalog = catalog.borrow();
                Some(
                    catalog
                        .codecs
                        .iter()
                        .flat_map(|c| c.all_names().map(str::to_owned))
                        .collect(),
                )
            })
            .unwrap_or_default();
        if names.is_empty() {
            return names;
        }

        if let Some(external) = &self.shared.external {
            names.extend(external.available_names());
        }
        if let Some(library) = &self.shared.library {
            names.extend(library.available_names());
        }
        let mut seen = HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        names
    }

    /// Returns the MIB number of every codec the registry can resolve.
    pub fn all_mibs(&self) -> Vec<i32> {
        let mut mibs: Vec<i32> = self
            .with_catalog(|catalog| Some(catalog.borrow().codecs.iter().map(|c| c.mib()).collect()))
            .unwrap_or_default();
        if mibs.is_empty() {
            return mibs;
        }

        let bridged = self
            .shared
            .external
            .iter()
            .flat_map(|e| e.available_names())
            .chain(self.shared.library.iter().flat_map(|l| l.available_names()));
        mibs.extend(bridged.map(|n| mib::mib_for_name(&n)));

        let mut seen = HashSet::new();
        mibs.retain(|&m| m > 0 && seen.insert(m));
        mibs
    }

    /// Returns the UTF codec announced by a BOM in `bytes`, or the codec for
    /// `default_mib`.
    pub fn codec_for_utf_text(&self, bytes: &[u8], default_mib: i32) -> Option<Arc<Codec>> {
        self.lookup_by_mib(sniff::mib_for_utf_text(bytes, default_mib))
    }

    /// Returns the codec for an HTML document: a BOM first, then a `<meta>`
    /// charset declaration, then the codec for `default_mib`.
    pub fn codec_for_html(&self, bytes: &[u8], default_mib: i32) -> Option<Arc<Codec>> {
        match sniff::sniff_html(bytes) {
            HtmlCharset::Bom(bom) => self.lookup_by_mib(bom.mib()),
            HtmlCharset::Meta(name) => self
                .lookup_by_name(&name)
                .or_else(|| self.lookup_by_mib(default_mib)),
            HtmlCharset::Undetermined => self.lookup_by_mib(default_mib),
        }
    }

    /// Converts a complete buffer from one encoding to another.
    ///
    /// Fails if either name is unknown, or if the input holds invalid
    /// sequences or characters the target cannot represent.
    ///
    /// ```
    /// use textcodec::Registry;
    ///
    /// let registry = Registry::new();
    /// let out = registry.transcode("żółw".as_bytes(), "UTF-8", "UTF-16LE").unwrap();
    /// assert_eq!(out, [0x7C, 0x01, 0xF3, 0x00, 0x42, 0x01, 0x77, 0x00]);
    /// assert!(registry.transcode("żółw".as_bytes(), "UTF-8", "latin1").is_err());
    /// ```
    pub fn transcode(&self, input: &[u8], from: &str, to: &str) -> Result<Vec<u8>, TranscodeError> {
        let source = self
            .lookup_by_name(from)
            .ok_or_else(|| TranscodeError::UnknownSourceEncoding(UnknownEncodingError(from.to_owned())))?;
        let target = self
            .lookup_by_name(to)
            .ok_or_else(|| TranscodeError::UnknownTargetEncoding(UnknownEncodingError(to.to_owned())))?;

        let mut decoding = ConverterState::new();
        let mut units = source.to_unicode(input, Some(&mut decoding));
        units.extend(source.flush_to_unicode(&mut decoding));

        let mut encoding = ConverterState::new();
        let mut out = target.from_unicode(&units, Some(&mut encoding));
        out.extend(target.flush_from_unicode(&mut encoding));

        match decoding.invalid_chars + encoding.invalid_chars {
            0 => Ok(out),
            invalid => Err(TranscodeError::InvalidInput { invalid }),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("external", &self.shared.external.is_some())
            .field("library", &self.shared.library.is_some())
            .field("pool", &self.shared.pool)
            .finish_non_exhaustive()
    }
}

/// Configures a [`Registry`].
///
/// By default both bridges use `encoding_rs` (with the `whatwg` feature)
/// and the locale is read from the process when the registry is built.
pub struct RegistryBuilder {
    external: Option<Arc<dyn Transcoder>>,
    library: Option<Arc<dyn ConversionLibrary>>,
    locale: Option<LocaleEnv>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        #[cfg(feature = "whatwg")]
        let (external, library): (Option<Arc<dyn Transcoder>>, Option<Arc<dyn ConversionLibrary>>) = (
            Some(Arc::new(crate::external::WhatwgTranscoder::new())),
            Some(Arc::new(crate::library::WhatwgLibrary::new())),
        );
        #[cfg(not(feature = "whatwg"))]
        let (external, library) = (None, None);

        Self {
            external,
            library,
            locale: None,
        }
    }
}

impl RegistryBuilder {
    /// Uses `transcoder` for encodings without a native codec.
    pub fn external(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.external = Some(transcoder);
        self
    }

    /// Uses `library` for encodings the transcoder does not know.
    pub fn library(mut self, library: Arc<dyn ConversionLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Disables the external transcoder.
    pub fn without_external(mut self) -> Self {
        self.external = None;
        self
    }

    /// Disables the conversion library.
    pub fn without_library(mut self) -> Self {
        self.library = None;
        self
    }

    /// Uses `locale` instead of the process locale for the system codec.
    pub fn locale(mut self, locale: LocaleEnv) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Creates the registry. Codecs are constructed on first lookup.
    pub fn build(self) -> Registry {
        Registry {
            shared: Arc::new(Shared {
                catalog: ReentrantMutex::new(RefCell::new(Catalog::new())),
                external: self.external,
                library: self.library,
                pool: Arc::new(HandlePool::new()),
                locale: self.locale.unwrap_or_else(LocaleEnv::from_process),
            }),
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("external", &self.external.is_some())
            .field("library", &self.library.is_some())
            .field("locale", &self.locale)
            .finish()
    }
}
