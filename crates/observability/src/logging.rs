//! Per-server logging context.
//!
//! Every server owns one [`LogContext`]: a `tracing` dispatch that writes
//! plain-text lines to `{directory}/{name}_{YYYY-MM-DD_HH_MM}.log` and mirrors
//! them to stderr above a configurable level. Endpoints enter the dispatch
//! around each call, so two servers in one process never share a stream.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, fmt};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Log destination of one server.
#[derive(Clone)]
pub struct LogContext {
    name: String,
    directory: PathBuf,
    log_file: PathBuf,
    dispatch: Dispatch,
}

impl core::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogContext")
            .field("name", &self.name)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl LogContext {
    /// Open (or append to) this minute's log file for `name` under `directory`.
    pub fn create(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        stream_level: Level,
    ) -> Result<Self, LogError> {
        let name = name.into();
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| LogError::Directory {
            path: directory.clone(),
            source,
        })?;

        let log_file = directory.join(log_file_name(&name));
        let file = open_append(&log_file)?;

        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::DEBUG);
        let stream_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(LevelFilter::from_level(stream_level));
        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(stream_layer);

        Ok(Self {
            name,
            directory,
            log_file,
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The file this context is currently writing.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    /// Run `f` with this context as the current subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Names of the `.log` files in the log directory, sorted.
    pub fn list_logs(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_lowercase().ends_with(".log") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Find a log file by name, ignoring case.
    ///
    /// Only bare file names listed by [`LogContext::list_logs`] can match.
    pub fn find_log(&self, requested: &str) -> std::io::Result<Option<PathBuf>> {
        if requested.contains(['/', '\\']) || requested.contains("..") {
            return Ok(None);
        }
        let wanted = requested.to_lowercase();
        Ok(self
            .list_logs()?
            .into_iter()
            .find(|name| name.to_lowercase() == wanted)
            .map(|name| self.directory.join(name)))
    }
}

fn log_file_name(name: &str) -> String {
    format!("{name}_{}.log", Utc::now().format("%Y-%m-%d_%H_%M"))
}

fn open_append(path: &Path) -> Result<File, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::File {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_server_name_and_minute() {
        let name = log_file_name("MyServer");
        assert!(name.starts_with("MyServer_"));
        assert!(name.ends_with(".log"));
        // MyServer_YYYY-MM-DD_HH_MM.log
        assert_eq!(name.len(), "MyServer_".len() + 16 + ".log".len());
    }

    #[test]
    fn events_in_scope_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = LogContext::create("Scoped", dir.path(), Level::ERROR).unwrap();
        ctx.in_scope(|| tracing::info!("TEST_MARKER_FOR_LOG_CONTEXT"));

        let contents = fs::read_to_string(ctx.log_file()).unwrap();
        assert!(contents.contains("TEST_MARKER_FOR_LOG_CONTEXT"), "{contents}");
    }

    #[test]
    fn two_contexts_do_not_share_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = LogContext::create("Alpha", dir.path(), Level::ERROR).unwrap();
        let b = LogContext::create("Beta", dir.path(), Level::ERROR).unwrap();
        a.in_scope(|| tracing::warn!("only alpha"));

        assert!(fs::read_to_string(a.log_file()).unwrap().contains("only alpha"));
        assert!(!fs::read_to_string(b.log_file()).unwrap().contains("only alpha"));
    }

    #[test]
    fn listing_skips_other_files_and_lookup_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "not a log").unwrap();
        let ctx = LogContext::create("Lister", dir.path(), Level::ERROR).unwrap();

        let logs = ctx.list_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].ends_with(".log"));

        let upper = logs[0].to_uppercase();
        assert_eq!(ctx.find_log(&upper).unwrap(), Some(ctx.log_file().to_path_buf()));
        assert_eq!(ctx.find_log("../etc/passwd").unwrap(), None);
        assert_eq!(ctx.find_log("missing.log").unwrap(), None);
    }
}
