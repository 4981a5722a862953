//! Log viewer.

use restkit_core::{EndpointError, Reply, RestCode};
use restkit_observability::LogContext;

pub fn list_logs(logs: &LogContext) -> Result<Reply, EndpointError> {
    let names = logs
        .list_logs()
        .map_err(|e| EndpointError::failed(format!("Failed to list logs: {e}")))?;
    Reply::json(names)
}

/// The current log, or `log_file` matched by name ignoring case.
pub fn view_log(logs: &LogContext, log_file: Option<&str>) -> Result<Reply, EndpointError> {
    let path = match log_file.map(str::trim).filter(|name| !name.is_empty()) {
        None => logs.log_file().to_path_buf(),
        Some(name) => match logs
            .find_log(name)
            .map_err(|e| EndpointError::failed(format!("Failed to list logs: {e}")))?
        {
            Some(path) => path,
            None => return Ok(Reply::error("Log file not found", RestCode::NotFound)),
        },
    };

    match std::fs::read(&path) {
        Ok(bytes) => Ok(Reply::text(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(Reply::error("Log file not found", RestCode::NotFound))
        }
        Err(e) => Err(EndpointError::failed(format!("Failed to read log: {e}"))),
    }
}
