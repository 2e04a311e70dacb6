use crate::builtin::Builtin;
use crate::codec::Codec;
use crate::error::{ErrorKind, ExtensionRejection, Result};
use crate::loader::{CustomLoader, Loader, Options};
use crate::suggest::suggest;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use trawl_storage::{normalize_suffix, suffix_of};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

macro_rules! builtins {
    ($($builtin:expr => [$($suffix:literal),+ $(,)?]),+ $(,)?) => {
        static BUILTINS: LazyLock<HashMap<&'static str, Builtin>> = LazyLock::new(|| {
            let mut table = HashMap::new();
            $($(table.insert($suffix, $builtin);)+)+
            for codec in Codec::ENABLED {
                table.insert(codec.suffix(), Builtin::Compressed(*codec));
            }
            table
        });
    };
}

builtins! {
    Builtin::Raw => [""],
    Builtin::Text => ["txt", "text", "log"],
    Builtin::Csv { delimiter: b',' } => ["csv"],
    Builtin::Csv { delimiter: b'\t' } => ["tsv"],
    Builtin::Json => ["json"],
    Builtin::Yaml => ["yaml", "yml"],
    Builtin::Toml => ["toml"],
    Builtin::Xml => ["xml"],
    Builtin::Ini => ["ini", "cfg", "conf"],
    Builtin::Spreadsheet => ["xls", "xlsx", "xlsm", "xlsb", "ods"],
    Builtin::Zip => ["zip"],
    Builtin::Markdown => ["md", "markdown"],
}

static DEFAULT: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

fn mime_knows(suffix: &str) -> bool {
    !suffix.is_empty() && mime_guess::from_ext(suffix).first().is_some()
}

fn is_malformed_suffix(suffix: &str) -> bool {
    suffix.contains(['/', '\\']) || suffix.chars().any(char::is_whitespace)
}

/// Suffix to loader table.
///
/// A registry never changes once built; [`customize`](Self::customize)
/// returns a new snapshot with its own [`id`](Self::id), which is what
/// memoised loads key on.
#[derive(Clone, Debug)]
pub struct Registry {
    id: u64,
    overrides: HashMap<String, Loader>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Built-in loaders only.
    pub fn new() -> Self {
        Self { id: NEXT_ID.fetch_add(1, Ordering::Relaxed), overrides: HashMap::new() }
    }

    /// The shared built-in registry.
    pub fn builtin() -> Arc<Registry> {
        Arc::clone(&DEFAULT)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolution order: caller override, built-in family, mime-table
    /// generic loader, raw fallback. A compressed suffix whose codec is
    /// compiled out skips straight to raw.
    pub fn resolve(&self, extension: &str) -> Loader {
        let suffix = normalize_suffix(extension);
        if let Some(loader) = self.overrides.get(&suffix) {
            return loader.clone();
        }
        if let Some(builtin) = BUILTINS.get(suffix.as_str()) {
            return Loader::Builtin(*builtin);
        }
        if let Err(err) = Codec::from_suffix(&suffix) {
            tracing::warn!(suffix = %suffix, error = %err, "codec compiled out, reading raw");
            return Loader::RAW;
        }
        if mime_knows(&suffix) {
            return Loader::Builtin(Builtin::Generic);
        }
        Loader::RAW
    }

    pub fn resolve_path(&self, path: impl AsRef<Path>) -> Loader {
        self.resolve(&suffix_of(path))
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        let suffix = normalize_suffix(extension);
        self.overrides.contains_key(&suffix) || BUILTINS.contains_key(suffix.as_str()) || mime_knows(&suffix)
    }

    /// `false` when the extension would only get the raw fallback.
    pub fn has_loader(&self, extension: &str) -> bool {
        !self.resolve(extension).is_raw()
    }

    /// Explicitly registered suffixes (built-in and overridden), sorted,
    /// without the empty fallback.
    pub fn extensions(&self) -> Vec<String> {
        let all: BTreeSet<&str> = BUILTINS
            .keys()
            .copied()
            .chain(self.overrides.keys().map(String::as_str))
            .filter(|s| !s.is_empty())
            .collect();
        all.into_iter().map(str::to_string).collect()
    }

    /// Merge `overrides` over this registry, binding `options` to each.
    ///
    /// Only the named suffixes change. Fails if a suffix is malformed or a
    /// loader accepts none of `options`.
    pub fn customize<I, K>(&self, overrides: I, options: &Options) -> Result<Registry>
    where
        I: IntoIterator<Item = (K, CustomLoader)>,
        K: AsRef<str>,
    {
        let mut merged = self.overrides.clone();
        for (suffix, loader) in overrides {
            let suffix = normalize_suffix(suffix.as_ref());
            if is_malformed_suffix(&suffix) {
                exn::bail!(ErrorKind::Validation(format!("malformed extension `{suffix}`")));
            }
            tracing::debug!(suffix = %suffix, loader = %loader.name(), "overriding loader");
            merged.insert(suffix, Loader::Custom(loader.bind(options)?));
        }
        Ok(Registry { id: NEXT_ID.fetch_add(1, Ordering::Relaxed), overrides: merged })
    }

    /// Normalise a caller allow-list and drop what the registry can't load.
    ///
    /// Unknown entries are logged and skipped; if *every* entry is unknown
    /// the caller has misconfigured something and this fails. An empty
    /// request is returned as-is.
    pub fn validate_extensions<I, S>(&self, requested: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (valid, invalid): (Vec<String>, Vec<String>) = requested
            .into_iter()
            .map(|ext| normalize_suffix(ext.as_ref()))
            .partition(|ext| self.is_supported(ext));
        if valid.is_empty() && !invalid.is_empty() {
            let known = self.extensions();
            let suggestion = suggest(known.iter().map(String::as_str), &invalid[0]);
            exn::bail!(ErrorKind::Extension(ExtensionRejection { invalid, suggestion }));
        }
        if !invalid.is_empty() {
            tracing::warn!(invalid = ?invalid, "skipping invalid extensions");
        }
        Ok(valid.into_iter().collect())
    }
}
