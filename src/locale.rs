//! Locale inputs for discovering the system codec.

/// The environment the system codec is derived from.
///
/// Build one by hand to describe a locale without touching the process, or
/// read the current one with [`LocaleEnv::from_process`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleEnv {
    /// Codeset reported by the C library (`nl_langinfo(CODESET)`).
    pub os_codeset: Option<String>,
    /// Name of the active `LC_CTYPE` locale.
    pub ctype: Option<String>,
    /// Value of `LC_ALL`.
    pub lc_all: Option<String>,
    /// Value of `LC_CTYPE`.
    pub lc_ctype: Option<String>,
    /// Value of `LANG`.
    pub lang: Option<String>,
}

fn is_c_locale(name: &str) -> bool {
    name.is_empty() || name == "C" || name == "POSIX"
}

/// `en_US.UTF-8@euro` -> `UTF-8`
fn codeset(locale: &str) -> Option<&str> {
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest);
    (!codeset.is_empty()).then_some(codeset)
}

impl LocaleEnv {
    /// Reads `LC_ALL`, `LC_CTYPE` and `LANG`, and on Unix asks the C library
    /// for its current `LC_CTYPE` locale and codeset.
    ///
    /// The C library locale is only queried, never set. A program that has
    /// not called `setlocale` runs in the `C` locale, in which case the
    /// environment variables stand in for it.
    pub fn from_process() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let mut env = Self {
            os_codeset: None,
            ctype: None,
            lc_all: var("LC_ALL"),
            lc_ctype: var("LC_CTYPE"),
            lang: var("LANG"),
        };

        #[cfg(unix)]
        {
            let (ctype, codeset) = query_c_library();
            if ctype.as_deref().is_some_and(|c| !is_c_locale(c)) {
                env.ctype = ctype;
                env.os_codeset = codeset;
            }
        }

        if env.ctype.is_none() {
            env.ctype = env.lc_all.clone().or_else(|| env.lc_ctype.clone());
        }
        env
    }

    /// Codec names to try, most specific first.
    pub fn candidates(&self) -> Vec<String> {
        fn usable(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|v| !is_c_locale(v))
        }

        let ctype = usable(&self.ctype);
        let lang = usable(&self.lc_all)
            .or_else(|| usable(&self.lc_ctype))
            .or_else(|| usable(&self.lang));

        let mut out: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !name.is_empty() && !out.iter().any(|n| n == name) {
                out.push(name.to_owned());
            }
        };

        if let Some(codeset) = self.os_codeset.as_deref() {
            push(codeset);
        }
        if let Some(codeset) = ctype.and_then(codeset) {
            push(codeset);
        }
        if let Some(codeset) = lang.and_then(codeset) {
            push(codeset);
        }
        if let Some(ctype) = ctype {
            push(ctype);
        }
        if let Some(lang) = lang {
            push(lang);
        }
        if ctype.into_iter().chain(lang).any(|l| l.contains("@euro")) {
            push("ISO-8859-15");
        }
        out
    }
}

#[cfg(unix)]
fn query_c_library() -> (Option<String>, Option<String>) {
    use std::ffi::CStr;

    // SAFETY: a null locale queries without modifying; both strings are
    // copied out before anything else can touch the C library locale.
    unsafe {
        let ctype = libc::setlocale(libc::LC_CTYPE, std::ptr::null());
        let ctype = (!ctype.is_null()).then(|| CStr::from_ptr(ctype).to_string_lossy().into_owned());
        let codeset = libc::nl_langinfo(libc::CODESET);
        let codeset = (!codeset.is_null()).then(|| CStr::from_ptr(codeset).to_string_lossy().into_owned());
        (ctype, codeset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(lc_all: Option<&str>, lc_ctype: Option<&str>, lang: Option<&str>) -> LocaleEnv {
        LocaleEnv {
            os_codeset: None,
            ctype: lc_all.or(lc_ctype).map(str::to_owned),
            lc_all: lc_all.map(str::to_owned),
            lc_ctype: lc_ctype.map(str::to_owned),
            lang: lang.map(str::to_owned),
        }
    }

    #[test]
    fn test_codeset_suffix() {
        assert_eq!(codeset("en_US.UTF-8"), Some("UTF-8"));
        assert_eq!(codeset("de_DE.ISO-8859-15@euro"), Some("ISO-8859-15"));
        assert_eq!(codeset("de_DE@euro"), None);
        assert_eq!(codeset("C"), None);
    }

    #[test]
    fn test_os_codeset_first() {
        let mut e = env(None, None, Some("ja_JP.eucJP"));
        e.os_codeset = Some("EUC-JP".to_owned());
        assert_eq!(e.candidates(), ["EUC-JP", "eucJP", "ja_JP.eucJP"]);
    }

    #[test]
    fn test_c_values_skipped() {
        let e = env(Some("C"), None, Some("ru_RU.KOI8-R"));
        assert_eq!(e.candidates(), ["KOI8-R", "ru_RU.KOI8-R"]);
    }

    #[test]
    fn test_euro_suffix() {
        let e = env(None, Some("de_DE@euro"), None);
        assert_eq!(e.candidates(), ["de_DE@euro", "ISO-8859-15"]);
    }

    #[test]
    fn test_nothing_set() {
        assert!(LocaleEnv::default().candidates().is_empty());
    }
}
