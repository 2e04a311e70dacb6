use crate::builtin::Builtin;
use crate::content::Content;
use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

/// Keyword options handed to loaders.
pub type Options = BTreeMap<String, String>;

pub type LoadFn = dyn Fn(&Path, &Options) -> Result<Content> + Send + Sync;

/// Keep only the options `accepts` recognises.
pub fn filter_options(options: &Options, accepts: impl Fn(&str) -> bool) -> Options {
    options
        .iter()
        .filter(|(key, _)| accepts(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// A caller-supplied loader closure, with the option names it accepts.
#[derive(Clone)]
pub struct CustomLoader {
    name: String,
    params: Arc<[String]>,
    bound: Options,
    func: Arc<LoadFn>,
}

impl CustomLoader {
    pub fn new<F>(name: impl Into<String>, params: &[&str], func: F) -> Self
    where
        F: Fn(&Path, &Options) -> Result<Content> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            bound: Options::new(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.params.iter().any(|p| p == key)
    }

    /// Options fixed at registration time.
    pub fn bound(&self) -> &Options {
        &self.bound
    }

    /// Fix `options` onto this loader.
    ///
    /// Options the loader does not declare are dropped, unless it declares
    /// none of them: a binding that would silently discard everything the
    /// caller asked for is almost certainly a mistake.
    pub(crate) fn bind(mut self, options: &Options) -> Result<Self> {
        if options.is_empty() {
            return Ok(self);
        }
        let recognised = filter_options(options, |key| self.accepts(key));
        if recognised.is_empty() {
            let supplied: Vec<&str> = options.keys().map(String::as_str).collect();
            exn::bail!(ErrorKind::Validation(format!(
                "loader `{}` accepts none of the supplied options: {}",
                self.name,
                supplied.join(", ")
            )));
        }
        for dropped in options.keys().filter(|key| !self.accepts(key)) {
            tracing::debug!(loader = %self.name, option = %dropped, "dropping option the loader does not accept");
        }
        self.bound = recognised;
        Ok(self)
    }
}

impl Debug for CustomLoader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CustomLoader")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

/// A resolved loader: one of the built-in families, or a caller closure.
#[derive(Clone, Debug)]
pub enum Loader {
    Builtin(Builtin),
    Custom(CustomLoader),
}

impl Loader {
    /// The raw read every registry falls back to.
    pub const RAW: Loader = Loader::Builtin(Builtin::Raw);

    pub fn is_raw(&self) -> bool {
        matches!(self, Loader::Builtin(Builtin::Raw))
    }

    pub fn name(&self) -> &str {
        match self {
            Loader::Builtin(builtin) => builtin.name(),
            Loader::Custom(custom) => custom.name(),
        }
    }

    /// Load `path`, passing along only the options this loader accepts.
    ///
    /// For custom loaders, options bound at registration take precedence
    /// over per-call ones.
    pub fn load(&self, path: &Path, options: &Options) -> Result<Content> {
        match self {
            Loader::Builtin(builtin) => {
                let params = builtin.params();
                builtin.load(path, &filter_options(options, |key| params.contains(&key)))
            },
            Loader::Custom(custom) => {
                let mut merged = filter_options(options, |key| custom.accepts(key));
                merged.extend(custom.bound.iter().map(|(k, v)| (k.clone(), v.clone())));
                (custom.func)(path, &merged)
            },
        }
    }
}

impl From<Builtin> for Loader {
    fn from(builtin: Builtin) -> Self {
        Loader::Builtin(builtin)
    }
}

impl From<CustomLoader> for Loader {
    fn from(custom: CustomLoader) -> Self {
        Loader::Custom(custom)
    }
}
