//! Server configuration.
//!
//! Build a [`ServerConfig`] with [`ServerConfig::builder`] or read one from
//! `RESTKIT_*` environment variables with [`ServerConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use tracing::Level;

use crate::error::ConfigError;

/// Runtime settings of one server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Reported by `/get_run_mode`.
    pub demo_mode: bool,

    /// Log entry and exit of every endpoint call.
    pub verbose: bool,

    /// Largest accepted request body in bytes. `None` means unlimited.
    pub max_content_length: Option<usize>,

    /// If non-empty, downloads must resolve under one of these directories.
    pub allowed_download_paths: Vec<PathBuf>,

    /// Downloads resolving under any of these are refused. Checked first.
    pub blocked_download_paths: Vec<PathBuf>,

    /// Where `/upload` stores files. Created on first upload.
    pub upload_directory: PathBuf,

    /// Upload filenames matching any of these are refused.
    pub upload_blocked_patterns: Vec<Regex>,

    /// Where the server writes (and `/logs` reads) its log files.
    pub log_directory: PathBuf,

    /// Lowest level mirrored to stderr.
    pub stream_log_level: Level,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Read `RESTKIT_*` variables; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(v) = lookup("RESTKIT_DEMO_MODE") {
            builder = builder.demo_mode(parse_flag("RESTKIT_DEMO_MODE", &v)?);
        }
        if let Some(v) = lookup("RESTKIT_VERBOSE") {
            builder = builder.verbose(parse_flag("RESTKIT_VERBOSE", &v)?);
        }
        if let Some(v) = lookup("RESTKIT_MAX_CONTENT_LENGTH") {
            let limit = v.trim().parse::<usize>().map_err(|_| invalid("RESTKIT_MAX_CONTENT_LENGTH", &v))?;
            builder = builder.max_content_length(limit);
        }
        if let Some(v) = lookup("RESTKIT_ALLOWED_DOWNLOAD_PATHS") {
            builder = builder.allowed_download_paths(split_list(&v));
        }
        if let Some(v) = lookup("RESTKIT_BLOCKED_DOWNLOAD_PATHS") {
            builder = builder.blocked_download_paths(split_list(&v));
        }
        if let Some(v) = lookup("RESTKIT_UPLOAD_DIRECTORY") {
            builder = builder.upload_directory(v);
        }
        if let Some(v) = lookup("RESTKIT_UPLOAD_BLOCKED_PATTERNS") {
            builder = builder.upload_blocked_patterns(split_list(&v));
        }
        if let Some(v) = lookup("RESTKIT_LOG_DIRECTORY") {
            builder = builder.log_directory(v);
        }
        if let Some(v) = lookup("RESTKIT_STREAM_LOG_LEVEL") {
            let level = Level::from_str(v.trim()).map_err(|_| invalid("RESTKIT_STREAM_LOG_LEVEL", &v))?;
            builder = builder.stream_log_level(level);
        }

        builder.build()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            verbose: false,
            max_content_length: None,
            allowed_download_paths: Vec::new(),
            blocked_download_paths: Vec::new(),
            upload_directory: PathBuf::from("uploads"),
            upload_blocked_patterns: Vec::new(),
            log_directory: PathBuf::from("log"),
            stream_log_level: Level::INFO,
        }
    }
}

/// Builder for [`ServerConfig`]; patterns are compiled in [`ServerConfigBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    demo_mode: bool,
    verbose: bool,
    max_content_length: Option<usize>,
    allowed_download_paths: Vec<PathBuf>,
    blocked_download_paths: Vec<PathBuf>,
    upload_directory: Option<PathBuf>,
    upload_blocked_patterns: Vec<String>,
    log_directory: Option<PathBuf>,
    stream_log_level: Option<Level>,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_content_length(mut self, bytes: usize) -> Self {
        self.max_content_length = Some(bytes);
        self
    }

    pub fn allowed_download_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.allowed_download_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn blocked_download_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.blocked_download_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn upload_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.upload_directory = Some(path.into());
        self
    }

    /// Regular expressions matched case-insensitively against upload filenames.
    pub fn upload_blocked_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upload_blocked_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn log_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_directory = Some(path.into());
        self
    }

    pub fn stream_log_level(mut self, level: Level) -> Self {
        self.stream_log_level = Some(level);
        self
    }

    /// Validate and compile the configuration.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let upload_blocked_patterns = self
            .upload_blocked_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = ServerConfig::default();
        Ok(ServerConfig {
            demo_mode: self.demo_mode,
            verbose: self.verbose,
            max_content_length: self.max_content_length,
            allowed_download_paths: self.allowed_download_paths,
            blocked_download_paths: self.blocked_download_paths,
            upload_directory: self.upload_directory.unwrap_or(defaults.upload_directory),
            upload_blocked_patterns,
            log_directory: self.log_directory.unwrap_or(defaults.log_directory),
            stream_log_level: self.stream_log_level.unwrap_or(defaults.stream_log_level),
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Comma-separated, blanks dropped.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
