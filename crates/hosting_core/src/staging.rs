//! Staging and live-directory swap
//!
//! An upload is extracted into a fresh per-key scratch directory, prepared
//! completely there (for EasyRPG that includes the shared runtime-resource
//! merge and index generation), and only then swapped into the live serving
//! path: delete the old directory, rename the prepared subtree over it. The
//! rename is atomic where the filesystem provides it; the delete-then-rename
//! window remains and a failure inside it can leave the live directory
//! missing or partial, in which case the caller retries the whole upload.

use crate::archive::{safe_relative_path, ArchiveEntry, EntryRoot, MACOS_RESOURCE_FORK_PREFIX};
use crate::config::IndexToolConfig;
use crate::error::{StageError, StageResult};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Generated resource index consumed by the EasyRPG web player.
pub const INDEX_FILE: &str = "index.json";

/// Shared runtime resources and the index tool, supplied for EasyRPG
/// deployments only.
#[derive(Debug, Clone, Copy)]
pub struct RuntimePackage<'a> {
    /// Read-only runtime-resource directory merged copy-if-absent
    pub rtp_dir: &'a Path,
    pub index_tool: &'a IndexToolConfig,
}

/// Extract a validated archive and swap it into the live directory.
///
/// `entries` is the listing produced by validation over the same bytes; it
/// carries the already-decoded entry names so extraction never re-decodes.
///
/// Failure semantics: any error before the swap leaves the live directory
/// untouched. An error between delete and rename is the documented
/// inconsistency window.
pub async fn deploy_to_live(
    archive: Vec<u8>,
    entries: Vec<ArchiveEntry>,
    entry_root: &EntryRoot,
    temp_dir: &Path,
    live_dir: &Path,
    runtime: Option<RuntimePackage<'_>>,
) -> StageResult<()> {
    // Fresh scratch directory; stale state from a failed prior attempt is
    // discarded first.
    remove_dir_if_exists(temp_dir).await?;
    fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| StageError::DirCreate(temp_dir.to_path_buf(), e))?;

    let dest = temp_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive(&archive, &entries, &dest))
        .await
        .map_err(|e| StageError::TaskJoin(e.to_string()))??;

    let content_root = temp_dir.join(entry_root.rel_path());

    if let Some(runtime) = runtime {
        // Skip both the merge and the tool when the archive already ships
        // its own generated index.
        if !content_root.join(INDEX_FILE).exists() {
            merge_copy_if_absent(runtime.rtp_dir, &content_root).await?;
            generate_index(runtime.index_tool, &content_root).await?;
        }
    }

    swap_into_place(&content_root, live_dir).await?;
    remove_dir_if_exists(temp_dir).await?;

    info!(live = %live_dir.display(), root = %entry_root, "Deployed archive to live directory");
    Ok(())
}

/// Remove the live directory for a game. Missing directory is not an error.
pub async fn delete_live(live_dir: &Path) -> StageResult<()> {
    remove_dir_if_exists(live_dir).await?;
    info!(live = %live_dir.display(), "Removed live directory");
    Ok(())
}

/// Synchronous extraction body, run on the blocking pool.
fn extract_archive(bytes: &[u8], entries: &[ArchiveEntry], dest: &Path) -> StageResult<()> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(StageError::Archive)?;
    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(StageError::Archive)?;
        let name = match entries.get(index) {
            Some(entry) => entry.path.clone(),
            None => file.name().to_string(),
        };
        if name.starts_with(MACOS_RESOURCE_FORK_PREFIX) {
            continue;
        }
        let Some(rel) = safe_relative_path(&name) else {
            return Err(StageError::UnsafeEntryPath(name));
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        let is_dir = file.is_dir() || name.ends_with('/');
        if is_dir {
            std::fs::create_dir_all(&target)
                .map_err(|e| StageError::DirCreate(target.clone(), e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StageError::DirCreate(parent.to_path_buf(), e))?;
            }
            let mut out = std::fs::File::create(&target)
                .map_err(|e| StageError::Extract(name.clone(), e))?;
            std::io::copy(&mut file, &mut out).map_err(|e| StageError::Extract(name.clone(), e))?;
        }
    }
    Ok(())
}

/// Copy files from `src` into `dst`, never overwriting anything already
/// present. Files extracted from the archive always win over shared
/// resources.
async fn merge_copy_if_absent(src: &Path, dst: &Path) -> StageResult<()> {
    if !src.exists() {
        warn!(rtp = %src.display(), "Runtime-resource directory missing, skipping merge");
        return Ok(());
    }
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| StageError::DirCreate(to.clone(), e))?;
        let mut dir = fs::read_dir(&from)
            .await
            .map_err(|e| StageError::DirRead(from.clone(), e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StageError::DirRead(from.clone(), e))?
        {
            let target = to.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StageError::DirRead(entry.path(), e))?;
            if file_type.is_dir() {
                stack.push((entry.path(), target));
            } else if !target.exists() {
                fs::copy(entry.path(), &target).await.map_err(|e| StageError::Copy {
                    from: entry.path(),
                    to: target,
                    source: e,
                })?;
            }
        }
    }
    Ok(())
}

/// Run the external index tool against a prepared tree.
///
/// The tool receives a recursion-depth flag and the target directory and is
/// expected to write `index.json` inside it. Failures either reject the
/// deployment (strict) or degrade to a warning.
async fn generate_index(tool: &IndexToolConfig, dir: &Path) -> StageResult<()> {
    let outcome = Command::new(&tool.program)
        .arg("--depth")
        .arg(tool.depth.to_string())
        .arg(dir)
        .output()
        .await;

    let reason = match outcome {
        Ok(output) if output.status.success() => {
            debug!(dir = %dir.display(), "Generated resource index");
            return Ok(());
        }
        Ok(output) => format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => e.to_string(),
    };

    if tool.strict {
        Err(StageError::IndexTool {
            tool: tool.program.clone(),
            reason,
        })
    } else {
        warn!(tool = %tool.program.display(), %reason, "Index tool failed, deploying without index");
        Ok(())
    }
}

/// Delete the old live directory and rename the prepared subtree over it,
/// falling back to a recursive copy when rename crosses filesystems.
async fn swap_into_place(content_root: &Path, live_dir: &Path) -> StageResult<()> {
    remove_dir_if_exists(live_dir).await?;
    if let Some(parent) = live_dir.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StageError::DirCreate(parent.to_path_buf(), e))?;
    }
    if let Err(e) = fs::rename(content_root, live_dir).await {
        debug!(error = %e, "Rename failed, falling back to recursive copy");
        copy_dir_recursive(content_root, live_dir).await?;
    }
    Ok(())
}

async fn copy_dir_recursive(src: &Path, dst: &Path) -> StageResult<()> {
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| StageError::DirCreate(to.clone(), e))?;
        let mut dir = fs::read_dir(&from)
            .await
            .map_err(|e| StageError::DirRead(from.clone(), e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StageError::DirRead(from.clone(), e))?
        {
            let target = to.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StageError::DirRead(entry.path(), e))?;
            if file_type.is_dir() {
                stack.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target).await.map_err(|e| StageError::Copy {
                    from: entry.path(),
                    to: target,
                    source: e,
                })?;
            }
        }
    }
    Ok(())
}

async fn remove_dir_if_exists(path: &Path) -> StageResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StageError::DirRemove(path.to_path_buf(), e)),
    }
}
