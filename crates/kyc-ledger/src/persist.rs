//! File persistence for the stores
//!
//! Profiles are a JSON document rewritten atomically. The verification
//! ledger is JSON lines, one record per line, appended in place.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Load a JSON document, or create the file holding `T::default()` on cold
/// start.
pub(crate) async fn load_or_init<T>(path: &Path) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    if path.exists() {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Parse(format!("parsing {}: {e}", path.display())))
    } else {
        info!(path = %path.display(), "store file not found, starting empty");
        let value = T::default();
        write_atomic(path, &value).await?;
        Ok(value)
    }
}

/// Write a value to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write leaves the previous contents intact.
/// Permissions are 0600 since the files hold API keys and identity data.
pub(crate) async fn write_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Persistence(format!("serializing {}: {e}", path.display())))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Persistence(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Persistence(format!("writing {}: {e}", tmp_path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Persistence(format!("setting permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Persistence(format!("replacing {}: {e}", path.display())))?;

    debug!(path = %path.display(), "persisted store file");
    Ok(())
}

/// Load a JSON-lines file, creating it empty on cold start.
///
/// A final line without its newline is a torn append from a crash. It is
/// dropped and the file cut back to the last complete line.
pub(crate) async fn load_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        info!(path = %path.display(), "store file not found, starting empty");
        open_append(path).await?;
        return Ok(Vec::new());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;

    let mut body = contents.as_str();
    if !body.is_empty() && !body.ends_with('\n') {
        let complete = body.rfind('\n').map(|i| i + 1).unwrap_or(0);
        warn!(
            path = %path.display(),
            dropped_bytes = body.len() - complete,
            "dropping torn trailing line"
        );
        body = &body[..complete];
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| Error::Io(format!("opening {}: {e}", path.display())))?;
        file.set_len(complete as u64)
            .await
            .map_err(|e| Error::Io(format!("truncating {}: {e}", path.display())))?;
    }

    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::Parse(format!("parsing {} line {}: {e}", path.display(), i + 1))
            })
        })
        .collect()
}

/// Append one value as a single line and sync it to disk.
///
/// Cost is independent of how many lines the file already holds. On a
/// failed write the file is cut back to its previous length.
pub(crate) async fn append_line<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut line = serde_json::to_string(value)
        .map_err(|e| Error::Persistence(format!("serializing {}: {e}", path.display())))?;
    line.push('\n');

    let mut file = open_append(path).await?;
    let len = file
        .metadata()
        .await
        .map_err(|e| Error::Persistence(format!("reading {} metadata: {e}", path.display())))?
        .len();

    if let Err(e) = write_synced(&mut file, line.as_bytes()).await {
        if let Err(trunc) = file.set_len(len).await {
            warn!(path = %path.display(), error = %trunc, "could not cut back partial line");
        }
        return Err(Error::Persistence(format!(
            "appending to {}: {e}",
            path.display()
        )));
    }

    debug!(path = %path.display(), bytes = line.len(), "appended store line");
    Ok(())
}

async fn open_append(path: &Path) -> Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
        .open(path)
        .await
        .map_err(|e| Error::Persistence(format!("opening {}: {e}", path.display())))
}

async fn write_synced(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}
