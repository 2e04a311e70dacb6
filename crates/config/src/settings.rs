use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "TRAWL_";
const DEFAULT_FILE_NAME: &str = "config.toml";

/// Options controlling discovery, dispatch and result shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker count override; `None` uses the shared process-wide pool.
    pub workers: Option<usize>,
    /// Extension allow-list; `None` accepts every file.
    pub default_extensions: Option<Vec<String>>,
    /// Extra roots loaded (and concatenated) by `load_all`.
    pub directories: Vec<PathBuf>,
    /// Key results by full path rather than file name.
    pub full_posix: bool,
    /// Produce a lazy single-pass view instead of a mapping.
    pub generator: bool,
    /// Skip extension resolution and read every file raw.
    pub no_method: bool,
    /// Keep files whose content is empty.
    pub allow_empty: bool,
    /// Log skipped entries at warning level.
    pub verbose: bool,
    /// Record a content hash for every loaded file.
    pub track_integrity: bool,
    /// Keyword options forwarded to loaders that accept them.
    pub loader_options: BTreeMap<String, String>,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            default_extensions: None,
            directories: Vec::new(),
            full_posix: true,
            generator: false,
            no_method: false,
            allow_empty: false,
            verbose: false,
            track_integrity: true,
            loader_options: BTreeMap::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub full_posix: bool,
    /// Export file name; timestamped when unset.
    pub export_name: Option<PathBuf>,
}

impl Config {
    /// Location of the per-user configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "trawl").map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
    }

    /// Defaults, then the per-user file (when present), then environment.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
            tracing::debug!(path = %path.display(), "merging user configuration file");
            figment = merge_file(figment, &path)?;
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults, then `path`, then environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let figment = merge_file(Figment::from(Serialized::defaults(Self::default())), path)?;
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            exn::bail!(ErrorKind::Invalid("workers must be at least 1".to_string()));
        }
        if let Some(exts) = &self.default_extensions
            && let Some(bad) = exts.iter().find(|e| is_malformed_extension(e))
        {
            exn::bail!(ErrorKind::Invalid(format!("malformed extension `{bad}`")));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).unwrap_or_default();
    Ok(match ext.as_str() {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(ext)),
    })
}

fn is_malformed_extension(ext: &str) -> bool {
    ext.contains(['/', '\\']) || ext.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.full_posix);
        assert!(config.track_integrity);
        assert!(!config.generator);
        assert!(config.default_extensions.is_none());
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "trawl.toml",
            r#"
workers = 6
default_extensions = ["csv", "json"]
allow_empty = true

[loader_options]
delimiter = ";"

[metrics]
full_posix = true
"#,
        );
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.workers, Some(6));
        assert_eq!(config.default_extensions, Some(vec!["csv".to_string(), "json".to_string()]));
        assert!(config.allow_empty);
        assert_eq!(config.loader_options.get("delimiter").map(String::as_str), Some(";"));
        assert!(config.metrics.full_posix);
        // Untouched keys keep their defaults.
        assert!(config.full_posix);
    }

    #[rstest]
    #[case("trawl.yaml", "generator: true\nno_method: true\n")]
    #[case("trawl.yml", "generator: true\nno_method: true\n")]
    #[case("trawl.json", r#"{"generator": true, "no_method": true}"#)]
    fn test_load_other_formats(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(write(&dir, name, body)).unwrap();
        assert!(config.generator);
        assert!(config.no_method);
    }

    #[test]
    fn test_bad_worker_type() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(write(&dir, "trawl.toml", "workers = \"lots\"\n")).unwrap_err();
        assert_eq!(*err, ErrorKind::Extract);
    }

    #[test]
    fn test_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(write(&dir, "trawl.toml", "workers = 0\n")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[rstest]
    #[case("c sv")]
    #[case("a/b")]
    #[case("a\\b")]
    fn test_malformed_extension(#[case] ext: &str) {
        let config = Config { default_extensions: Some(vec![ext.to_string()]), ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(write(&dir, "trawl.ini", "[x]\n")).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedFormat("ini".to_string()));
    }
}
