//! Emulator configuration
//!
//! Plain data with serde derives. The persisted form is JSON with
//! lowerCamelCase keys and every field defaulted, so partial documents
//! and documents from older versions load unchanged.

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Memory controller options
    pub memory: MemoryConfig,
    /// CPU options
    pub cpu: CpuConfig,
    /// Logging options
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from its JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Memory controller options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Address space size in bytes
    pub total_size: u32,
    /// Enforce region permissions and component write gating
    pub enable_protection: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            total_size: 65536,
            enable_protection: true,
        }
    }
}

/// CPU options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuConfig {
    /// Nominal clock frequency in Hz. Informational only: execution is
    /// cycle-counted, not wall-clock timed.
    pub frequency: u32,
    /// Emit one trace log line per executed instruction
    pub enable_tracing: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000,
            enable_tracing: false,
        }
    }
}

/// Logging options, consumed by whatever logger backend the embedder
/// installs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Drop records below this level
    pub minimum_level: LogLevel,
    /// Mirror records to the console
    pub enable_console: bool,
    /// Mirror records to a file
    pub enable_file: bool,
    /// Target path when file logging is enabled
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            minimum_level: LogLevel::Info,
            enable_console: true,
            enable_file: false,
            file_path: None,
        }
    }
}

/// Log severity threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and up
    Warn,
    /// Informational and up
    Info,
    /// Debug and up
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// The equivalent `log` crate filter
    pub const fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}
