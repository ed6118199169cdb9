//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is built in code, parsed from a configuration file, or
//! taken from the environment:
//!
//! ```text
//! # jsbridge.conf
//! [runtime]
//! namespace = "Host"
//! load_path_global = "$LOAD_PATH"
//! expose_namespace = true
//!
//! [modules]
//! search_path = ["./lib", "./vendor/js"]
//! preload = ["prelude"]
//! ```
//!
//! `JSBRIDGE_CONFIG` names a configuration file and `JSBRIDGE_PATH` (a
//! platform path list) appends directories to the module search path.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

pub const CONFIG_ENV: &str = "JSBRIDGE_CONFIG";
pub const PATH_ENV: &str = "JSBRIDGE_PATH";

#[derive(Parser)]
#[grammar = "config/config.pest"]
struct ConfigParser;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration syntax error: {0}")]
    Syntax(String),

    #[error("unknown configuration section [{0}]")]
    UnknownSection(String),

    #[error("unknown key '{key}' in [{section}]")]
    UnknownKey { section: String, key: String },

    #[error("key '{0}' appears before any section")]
    MissingSection(String),

    #[error("key '{key}' expects {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("cannot read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Global name of the namespace object.
    pub namespace: String,
    /// Namespace key under which the module search path is exposed.
    pub load_path_global: String,
    /// Whether the namespace object is installed at all.
    pub expose_namespace: bool,
    pub search_path: Vec<PathBuf>,
    /// Modules required when the runtime is created.
    pub preload: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            namespace: "Host".to_string(),
            load_path_global: "$LOAD_PATH".to_string(),
            expose_namespace: true,
            search_path: Vec::new(),
            preload: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Value {
    Str(String),
    List(Vec<String>),
    Bool(bool),
}

impl RuntimeConfig {
    pub fn new() -> Self {
        RuntimeConfig::default()
    }

    pub fn with_namespace(mut self, name: impl Into<String>) -> Self {
        self.namespace = name.into();
        self
    }

    pub fn with_load_path_global(mut self, name: impl Into<String>) -> Self {
        self.load_path_global = name.into();
        self
    }

    pub fn without_namespace(mut self) -> Self {
        self.expose_namespace = false;
        self
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.push(dir.into());
        self
    }

    pub fn with_preload(mut self, module: impl Into<String>) -> Self {
        self.preload.push(module.into());
        self
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses a configuration file; keys not present keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = RuntimeConfig::default();
        let root = ConfigParser::parse(Rule::config, content)
            .map_err(|e| ConfigError::Syntax(e.to_string()))?
            .next()
            .ok_or_else(|| ConfigError::Syntax("empty parse".to_string()))?;

        let mut section: Option<String> = None;
        for pair in root.into_inner() {
            match pair.as_rule() {
                Rule::section => {
                    let name = pair
                        .into_inner()
                        .next()
                        .map(|ident| ident.as_str().to_string())
                        .unwrap_or_default();
                    match name.as_str() {
                        "runtime" | "modules" => section = Some(name),
                        _ => return Err(ConfigError::UnknownSection(name)),
                    }
                }
                Rule::pair => {
                    let mut inner = pair.into_inner();
                    let key = inner.next().map(|k| k.as_str().to_string()).unwrap_or_default();
                    let value = match inner.next() {
                        Some(value) => parse_value(value),
                        None => return Err(ConfigError::Syntax(format!("missing value for '{}'", key))),
                    };
                    let section = section
                        .as_deref()
                        .ok_or_else(|| ConfigError::MissingSection(key.clone()))?;
                    config.assign(section, &key, value)?;
                }
                _ => {}
            }
        }
        Ok(config)
    }

    fn assign(&mut self, section: &str, key: &str, value: Value) -> Result<(), ConfigError> {
        match (section, key, value) {
            ("runtime", "namespace", Value::Str(s)) => self.namespace = s,
            ("runtime", "load_path_global", Value::Str(s)) => self.load_path_global = s,
            ("runtime", "expose_namespace", Value::Bool(b)) => self.expose_namespace = b,
            ("modules", "search_path", Value::List(dirs)) => {
                self.search_path = dirs.into_iter().map(PathBuf::from).collect()
            }
            ("modules", "preload", Value::List(modules)) => self.preload = modules,
            ("runtime", "namespace", _) | ("runtime", "load_path_global", _) => {
                return Err(invalid(key, "a string"))
            }
            ("runtime", "expose_namespace", _) => return Err(invalid(key, "a boolean")),
            ("modules", "search_path", _) | ("modules", "preload", _) => {
                return Err(invalid(key, "an array of strings"))
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Configuration from `JSBRIDGE_CONFIG` and `JSBRIDGE_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os(PATH_ENV),
        )
    }

    fn from_vars(config_file: Option<PathBuf>, search_path: Option<OsString>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(path) => Self::load(&path)?,
            None => RuntimeConfig::default(),
        };
        if let Some(paths) = search_path {
            config
                .search_path
                .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        Ok(config)
    }
}

fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        expected,
    }
}

fn parse_value(pair: Pair<Rule>) -> Value {
    match pair.as_rule() {
        Rule::boolean => Value::Bool(pair.as_str() == "true"),
        Rule::array => Value::List(pair.into_inner().map(string_value).collect()),
        _ => Value::Str(string_value(pair)),
    }
}

fn string_value(pair: Pair<Rule>) -> String {
    let raw = pair.into_inner().next().map(|inner| inner.as_str()).unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config = RuntimeConfig::parse(
            r#"
# jsbridge.conf
[runtime]
namespace = "Ruby"
load_path_global = "$PATH"   # trailing comment

[modules]
search_path = [
    "./lib",
    "./vendor/js",
]
preload = ["prelude"]
"#,
        )
        .unwrap();
        assert_eq!(config.namespace, "Ruby");
        assert_eq!(config.load_path_global, "$PATH");
        assert!(config.expose_namespace);
        assert_eq!(
            config.search_path,
            vec![PathBuf::from("./lib"), PathBuf::from("./vendor/js")]
        );
        assert_eq!(config.preload, vec!["prelude".to_string()]);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(RuntimeConfig::parse("").unwrap(), RuntimeConfig::default());
        assert_eq!(
            RuntimeConfig::parse("# nothing here\n\n").unwrap(),
            RuntimeConfig::default()
        );
    }

    #[test]
    fn test_boolean_and_escapes() {
        let config = RuntimeConfig::parse(
            "[runtime]\nexpose_namespace = false\nnamespace = \"A\\\"B\"\n",
        )
        .unwrap();
        assert!(!config.expose_namespace);
        assert_eq!(config.namespace, "A\"B");
    }

    #[test]
    fn test_rejects_unknown_section_and_key() {
        assert!(matches!(
            RuntimeConfig::parse("[plugins]\n"),
            Err(ConfigError::UnknownSection(s)) if s == "plugins"
        ));
        assert!(matches!(
            RuntimeConfig::parse("[runtime]\ncolour = \"red\"\n"),
            Err(ConfigError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_value_types() {
        assert!(matches!(
            RuntimeConfig::parse("[modules]\npreload = \"prelude\"\n"),
            Err(ConfigError::InvalidValue { expected, .. }) if expected == "an array of strings"
        ));
        assert!(matches!(
            RuntimeConfig::parse("[runtime]\nexpose_namespace = \"yes\"\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_key_outside_section() {
        assert!(matches!(
            RuntimeConfig::parse("namespace = \"Host\"\n"),
            Err(ConfigError::MissingSection(_))
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            RuntimeConfig::parse("[runtime\n"),
            Err(ConfigError::Syntax(_))
        ));
    }

    #[test]
    fn test_env_search_path_is_appended() {
        let joined = std::env::join_paths(vec!["/opt/js", "/usr/share/js"]).unwrap();
        let config = RuntimeConfig::from_vars(None, Some(joined)).unwrap();
        assert_eq!(
            config.search_path,
            vec![PathBuf::from("/opt/js"), PathBuf::from("/usr/share/js")]
        );
    }

    #[test]
    fn test_missing_config_file() {
        let missing = std::env::temp_dir().join("jsbridge-no-such-config.conf");
        assert!(matches!(
            RuntimeConfig::from_vars(Some(missing), None),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_namespace("Ruby")
            .with_search_path("lib")
            .with_preload("prelude")
            .without_namespace();
        assert_eq!(config.namespace, "Ruby");
        assert!(!config.expose_namespace);
        assert_eq!(config.search_path, vec![PathBuf::from("lib")]);
        assert_eq!(config.preload, vec!["prelude".to_string()]);
    }
}
