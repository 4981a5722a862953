//! File download and upload.
//!
//! Every policy check runs on the lexically normalized path before the
//! filesystem is touched.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::json;

use restkit_core::{EndpointError, Reply, RestCode, UploadedFile};

use crate::config::ServerConfig;

pub fn download(config: &ServerConfig, path: Option<&str>) -> Result<Reply, EndpointError> {
    let requested = match path.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(Reply::error("No file path provided", RestCode::BadRequest)),
    };

    let resolved = normalize(Path::new(requested))?;

    if config
        .blocked_download_paths
        .iter()
        .map(|p| normalize(p))
        .collect::<Result<Vec<_>, _>>()?
        .iter()
        .any(|blocked| resolved.starts_with(blocked))
    {
        tracing::warn!(path = %resolved.display(), "download refused: blocked path");
        return Ok(Reply::error("Access to this path is blocked", RestCode::Forbidden));
    }

    if !config.allowed_download_paths.is_empty() {
        let allowed = config
            .allowed_download_paths
            .iter()
            .map(|p| normalize(p))
            .collect::<Result<Vec<_>, _>>()?;
        if !allowed.iter().any(|root| resolved.starts_with(root)) {
            tracing::warn!(path = %resolved.display(), "download refused: outside allowed paths");
            return Ok(Reply::error("Access to this path is not allowed", RestCode::Forbidden));
        }
    }

    if !resolved.is_file() {
        return Ok(Reply::error(format!("File not found: {requested}"), RestCode::NotFound));
    }

    let bytes = fs::read(&resolved)
        .map_err(|e| EndpointError::failed(format!("Failed to read {}: {e}", resolved.display())))?;
    let filename = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    tracing::info!(path = %resolved.display(), size = bytes.len(), "serving download");
    Ok(Reply::attachment(filename, bytes))
}

pub fn upload(
    config: &ServerConfig,
    file: Option<&UploadedFile>,
    filename: Option<&str>,
) -> Result<Reply, EndpointError> {
    let Some(file) = file else {
        return Ok(Reply::error("No file provided", RestCode::BadRequest));
    };

    let requested = filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&file.filename);
    if requested.trim().is_empty() {
        return Ok(Reply::error("No file selected", RestCode::BadRequest));
    }

    let Some(name) = sanitize_filename(requested) else {
        return Ok(Reply::error("Invalid filename", RestCode::BadRequest));
    };

    if config.upload_blocked_patterns.iter().any(|re| re.is_match(&name)) {
        tracing::warn!(filename = %name, "upload refused: blocked pattern");
        return Ok(Reply::error(
            format!("Filename '{name}' matches a blocked pattern"),
            RestCode::Forbidden,
        ));
    }

    let directory = &config.upload_directory;
    fs::create_dir_all(directory).map_err(|e| {
        EndpointError::failed(format!("Failed to create upload directory {}: {e}", directory.display()))
    })?;
    let target = directory.join(&name);
    fs::write(&target, &file.bytes)
        .map_err(|e| EndpointError::failed(format!("Failed to save {}: {e}", target.display())))?;

    tracing::info!(path = %target.display(), size = file.bytes.len(), "stored upload");
    Reply::with_code(
        json!({
            "filename": name,
            "size": file.bytes.len(),
            "path": target.display().to_string(),
        }),
        RestCode::Created,
    )
}

/// Absolute form of `path` with `.` and `..` resolved, without touching the
/// filesystem. `..` never climbs above the root.
pub fn normalize(path: &Path) -> Result<PathBuf, EndpointError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| EndpointError::failed(format!("Failed to resolve current directory: {e}")))?
            .join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// Last path component of a client filename, split on both `/` and `\`.
///
/// `None` for names that reduce to nothing usable.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn json_of(reply: &Reply) -> (&Value, RestCode) {
        match reply {
            Reply::Json { data, code } => (data, *code),
            other => panic!("expected json reply, got {other:?}"),
        }
    }

    fn file(name: &str, contents: &[u8]) -> UploadedFile {
        UploadedFile {
            field: "file".into(),
            filename: name.into(),
            bytes: contents.to_vec(),
        }
    }

    #[test]
    fn normalization_is_lexical() {
        assert_eq!(
            normalize(Path::new("/srv/public/../private/./secret.txt")).unwrap(),
            PathBuf::from("/srv/private/secret.txt")
        );
        assert_eq!(normalize(Path::new("/../../etc")).unwrap(), PathBuf::from("/etc"));
    }

    #[test]
    fn filenames_lose_directory_parts() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("..\\..\\windows\\system.ini").as_deref(), Some("system.ini"));
        assert_eq!(sanitize_filename("dir/.."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn download_requires_a_path() {
        let reply = download(&ServerConfig::default(), None).unwrap();
        let (data, code) = json_of(&reply);
        assert_eq!(code, RestCode::BadRequest);
        assert_eq!(data["error"], "No file path provided");
    }

    #[test]
    fn download_policy_checks_blocked_then_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        let private = dir.path().join("private");
        fs::create_dir_all(&public).unwrap();
        fs::create_dir_all(&private).unwrap();
        fs::write(public.join("ok.txt"), b"public content").unwrap();
        fs::write(private.join("secret.txt"), b"secret").unwrap();

        let config = ServerConfig::builder()
            .allowed_download_paths([public.clone()])
            .blocked_download_paths([public.join("nested")])
            .build()
            .unwrap();

        let ok = download(&config, public.join("ok.txt").to_str()).unwrap();
        assert_eq!(ok, Reply::attachment("ok.txt", b"public content".to_vec()));

        let outside = download(&config, private.join("secret.txt").to_str()).unwrap();
        let (data, code) = json_of(&outside);
        assert_eq!(code, RestCode::Forbidden);
        assert!(data["error"].as_str().unwrap().contains("not allowed"));

        let traversal = format!("{}/../private/secret.txt", public.display());
        let (_, code) = json_of(&download(&config, Some(&traversal)).unwrap());
        assert_eq!(code, RestCode::Forbidden);

        let blocked = public.join("nested").join("x.txt");
        let reply = download(&config, blocked.to_str()).unwrap();
        let (data, code) = json_of(&reply);
        assert_eq!(code, RestCode::Forbidden);
        assert!(data["error"].as_str().unwrap().contains("blocked"));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        let reply = download(&ServerConfig::default(), dir.path().to_str()).unwrap();
        let (data, code) = json_of(&reply);
        assert_eq!(code, RestCode::NotFound);
        assert!(data["error"].as_str().unwrap().starts_with("File not found"));
    }

    #[test]
    fn upload_saves_under_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let target_dir = dir.path().join("new_uploads");
        let config = ServerConfig::builder().upload_directory(&target_dir).build().unwrap();

        let reply = upload(&config, Some(&file("../../etc/passwd", b"root")), None).unwrap();
        let (data, code) = json_of(&reply);
        assert_eq!(code, RestCode::Created);
        assert_eq!(data["filename"], "passwd");
        assert_eq!(data["size"], 4);
        assert_eq!(fs::read(target_dir.join("passwd")).unwrap(), b"root");
    }

    #[test]
    fn upload_prefers_explicit_filename() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::builder().upload_directory(dir.path()).build().unwrap();
        let reply = upload(&config, Some(&file("orig.txt", b"x")), Some("custom_name.txt")).unwrap();
        assert_eq!(json_of(&reply).0["filename"], "custom_name.txt");
    }

    #[test]
    fn upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::builder()
            .upload_directory(dir.path())
            .upload_blocked_patterns([r"\.exe$", r"^\."])
            .build()
            .unwrap();

        let none = upload(&config, None, None).unwrap();
        let (data, code) = json_of(&none);
        assert_eq!(code, RestCode::BadRequest);
        assert_eq!(data["error"], "No file provided");

        let empty = upload(&config, Some(&file("", b"x")), None).unwrap();
        assert_eq!(json_of(&empty).0["error"], "No file selected");

        for name in ["virus.EXE", ".htaccess"] {
            let reply = upload(&config, Some(&file(name, b"x")), None).unwrap();
            let (data, code) = json_of(&reply);
            assert_eq!(code, RestCode::Forbidden, "{name}");
            assert!(data["error"].as_str().unwrap().contains("blocked pattern"));
        }
    }
}
