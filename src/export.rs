use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

pub const EXPORT_DIR: &str = "reports";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub path: String,
    pub file_name: String,
    pub bytes: usize,
    pub sha256: String,
}

pub fn export_dir(workspace: &Path) -> PathBuf {
    workspace.join(EXPORT_DIR)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One path-safe component: anything but ASCII letters, digits and `-`
/// becomes `-`; an empty result becomes `unknown`.
pub fn file_name_part(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// `{kind}_{first}_{second}_{timestamp}.{ext}`, with path-hostile characters
/// in the middle parts replaced.
pub fn export_file_name(
    kind: &str,
    first: &str,
    second: &str,
    at: NaiveDateTime,
    ext: &str,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        kind,
        file_name_part(first),
        file_name_part(second),
        at.format("%Y-%m-%d_%H-%M-%S"),
        ext
    )
}

/// Write `contents` to `dir/file_name` through a temp file and a rename, so
/// readers never observe a partially written export.
pub fn write_export(dir: &Path, file_name: &str, contents: &[u8]) -> anyhow::Result<ExportedFile> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let final_path = dir.join(file_name);
    let tmp_path = dir.join(format!(".{}.writing", file_name));

    if let Err(e) = write_then_rename(&tmp_path, &final_path, contents) {
        discard_temp(&tmp_path);
        return Err(e);
    }

    info!(path = %final_path.display(), bytes = contents.len(), "export written");
    Ok(ExportedFile {
        path: final_path.to_string_lossy().to_string(),
        file_name: file_name.to_string(),
        bytes: contents.len(),
        sha256: sha256_hex(contents),
    })
}

fn write_then_rename(tmp_path: &Path, final_path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    {
        let mut out = File::create(tmp_path).with_context(|| {
            format!("failed to create temp file {}", tmp_path.to_string_lossy())
        })?;
        out.write_all(contents)
            .with_context(|| format!("failed to write {}", tmp_path.to_string_lossy()))?;
        out.flush().context("failed to flush export")?;
    }
    std::fs::rename(tmp_path, final_path).with_context(|| {
        format!(
            "failed to move export into place at {}",
            final_path.to_string_lossy()
        )
    })
}

/// Best-effort removal of a half-written temp file.
pub(crate) fn discard_temp(tmp_path: &Path) {
    if tmp_path.exists() {
        if let Err(e) = std::fs::remove_file(tmp_path) {
            warn!(path = %tmp_path.display(), "failed to remove temp file: {}", e);
        }
    }
}

/// Delete regular files in `dir` last modified more than `older_than_days`
/// ago. A missing directory counts as nothing to clean.
pub fn cleanup_old_exports(dir: &Path, older_than_days: u64) -> anyhow::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(older_than_days.saturating_mul(24 * 60 * 60)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0usize;
    for ent in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.to_string_lossy()))?
    {
        let ent = ent?;
        let meta = ent.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        if modified < cutoff {
            std::fs::remove_file(ent.path()).with_context(|| {
                format!("failed to delete {}", ent.path().to_string_lossy())
            })?;
            deleted += 1;
        }
    }
    info!(dir = %dir.display(), deleted, "old exports cleaned up");
    Ok(deleted)
}
