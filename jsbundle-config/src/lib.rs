//! jsbundle Config - Pure configuration data structures
//!
//! This crate contains only data structures, parsing of option strings and
//! validation. It performs no I/O and holds no global state; it is the shared
//! configuration vocabulary across all jsbundle crates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no entry point configured")]
    MissingEntry,

    #[error("invalid value '{value}' for option '{option}' (expected {expected})")]
    InvalidOption {
        option: String,
        value: String,
        expected: String,
    },

    #[error("invalid {kind} pair '{pair}' (expected name=value)")]
    InvalidPair { kind: String, pair: String },

    #[error("cannot read configuration file '{path}': {message}")]
    Unreadable { path: String, message: String },

    #[error("malformed configuration file '{path}': {message}")]
    Malformed { path: String, message: String },
}

/// ECMAScript level of the sources being bundled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLevel {
    #[default]
    Es5,
    Es2015,
}

/// Runtime the bundle is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Browser,
    Node,
}

/// Source map emission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMapMode {
    #[default]
    Off,
    /// Adjacent `.map` file (or inline when writing to stdout)
    On,
    /// Always inline as a base64 data URL
    Inline,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// How an externally provided module is satisfied at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum External {
    /// `module.exports = <global variable>`
    Global(String),
    /// `module.exports = {}`
    Stub,
}

/// Output location. Without a file name the bundle goes to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub folder: PathBuf,
    pub file: Option<String>,
}

/// Immutable configuration of one build session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleConfig {
    pub entry: Option<PathBuf>,
    pub source_level: SourceLevel,
    pub output: OutputConfig,
    pub target: Target,
    pub source_maps: SourceMapMode,
    pub aliases: BTreeMap<String, String>,
    pub externals: BTreeMap<String, External>,
    pub watch: bool,
    pub debug: bool,
    pub log_level: LogLevel,
}

/// Engine phase, used for phase-specific log configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Resolver,
    Graph,
    Transform,
    Orchestrator,
    Watch,
    Cache,
    SourceMap,
    Emit,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Resolver,
        Phase::Graph,
        Phase::Transform,
        Phase::Orchestrator,
        Phase::Watch,
        Phase::Cache,
        Phase::SourceMap,
        Phase::Emit,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolver => "resolver",
            Phase::Graph => "graph",
            Phase::Transform => "transform",
            Phase::Orchestrator => "orchestrator",
            Phase::Watch => "watch",
            Phase::Cache => "cache",
            Phase::SourceMap => "sourcemap",
            Phase::Emit => "emit",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("jsbundle::{}", self.as_str())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("dist"),
            file: None,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry: None,
            source_level: SourceLevel::default(),
            output: OutputConfig::default(),
            target: Target::default(),
            source_maps: SourceMapMode::default(),
            aliases: BTreeMap::new(),
            externals: BTreeMap::new(),
            watch: false,
            debug: false,
            log_level: LogLevel::default(),
        }
    }
}

impl BundleConfig {
    /// Create a configuration with the given entry and defaults elsewhere
    pub fn with_entry(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: Some(entry.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document. `origin` only labels errors.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Malformed {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.entry {
            Some(entry) if !entry.as_os_str().is_empty() => {}
            _ => return Err(ConfigError::MissingEntry),
        }
        if let Some(file) = &self.output.file {
            if file.is_empty() || file.contains('/') || file.contains('\\') {
                return Err(ConfigError::InvalidOption {
                    option: "output.file".to_string(),
                    value: file.clone(),
                    expected: "a plain file name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Add an alias from a `from=to` pair
    pub fn add_alias(&mut self, pair: &str) -> Result<(), ConfigError> {
        let (from, to) = split_pair("alias", pair)?;
        self.aliases.insert(from.to_string(), to.to_string());
        Ok(())
    }

    /// Add an external from a `name=GlobalVar` or `name=false` pair
    pub fn add_external(&mut self, pair: &str) -> Result<(), ConfigError> {
        let (name, value) = split_pair("external", pair)?;
        let external = if value == "false" {
            External::Stub
        } else {
            External::Global(value.to_string())
        };
        self.externals.insert(name.to_string(), external);
        Ok(())
    }
}

fn split_pair<'a>(kind: &str, pair: &'a str) -> Result<(&'a str, &'a str), ConfigError> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim(), value.trim()))
        }
        _ => Err(ConfigError::InvalidPair {
            kind: kind.to_string(),
            pair: pair.to_string(),
        }),
    }
}

fn invalid(option: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidOption {
        option: option.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

impl FromStr for SourceLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "es5" => Ok(SourceLevel::Es5),
            "es2015" | "es6" => Ok(SourceLevel::Es2015),
            _ => Err(invalid("sourceLevel", s, "es5 | es2015")),
        }
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "browser" => Ok(Target::Browser),
            "node" => Ok(Target::Node),
            _ => Err(invalid("target", s, "browser | node")),
        }
    }
}

impl FromStr for SourceMapMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "false" => Ok(SourceMapMode::Off),
            "true" | "on" => Ok(SourceMapMode::On),
            "inline" => Ok(SourceMapMode::Inline),
            _ => Err(invalid("sourceMaps", s, "off | true | inline")),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(invalid(
                "logLevel",
                s,
                "silent | error | warn | info | debug | trace",
            )),
        }
    }
}

impl fmt::Display for SourceMapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMapMode::Off => write!(f, "off"),
            SourceMapMode::On => write!(f, "true"),
            SourceMapMode::Inline => write!(f, "inline"),
        }
    }
}

/// Accepts both booleans and strings in configuration files
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagOrName {
    Flag(bool),
    Name(String),
}

impl Serialize for SourceMapMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceMapMode::Off => serializer.serialize_bool(false),
            SourceMapMode::On => serializer.serialize_bool(true),
            SourceMapMode::Inline => serializer.serialize_str("inline"),
        }
    }
}

impl<'de> Deserialize<'de> for SourceMapMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match FlagOrName::deserialize(deserializer)? {
            FlagOrName::Flag(true) => Ok(SourceMapMode::On),
            FlagOrName::Flag(false) => Ok(SourceMapMode::Off),
            FlagOrName::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for External {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            External::Global(name) => serializer.serialize_str(name),
            External::Stub => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for External {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match FlagOrName::deserialize(deserializer)? {
            FlagOrName::Flag(false) => Ok(External::Stub),
            FlagOrName::Flag(true) => Err(serde::de::Error::custom(
                "external must be a global variable name or false",
            )),
            FlagOrName::Name(name) if name == "false" => Ok(External::Stub),
            FlagOrName::Name(name) => Ok(External::Global(name)),
        }
    }
}
