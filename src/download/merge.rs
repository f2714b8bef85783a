//! Ordered concatenation of segment artifacts into the destination file

use super::segment::SegmentArtifact;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("nothing to merge")]
    NoSegments,

    #[error("segment {0} is missing from the merge set")]
    MissingSegment(usize),

    #[error("failed to read segment {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove segment {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move merged file into {}: {source}", .path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MergeError>;

/// Fresh staging path next to `destination`, unique to this call.
///
/// Looks like `<dir>/.<name>.<uuid>.part`: concurrent runs aimed at the same
/// destination never write the same file, and a user's own `<name>.part`
/// is left alone.
pub fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let staging = format!(".{}.{}.part", name, Uuid::new_v4().simple());

    destination.with_file_name(staging)
}

/// Concatenate `artifacts` in ascending index order into `destination`.
///
/// Indices must be exactly `0..n`; the order the artifacts arrive in does
/// not matter. Each artifact is deleted once appended. The destination only
/// appears after the last byte is written and synced, so a failed merge
/// leaves nothing at that path.
pub async fn merge(
    destination: &Path,
    mut artifacts: Vec<SegmentArtifact>,
    buffer_size: usize,
) -> Result<u64> {
    if artifacts.is_empty() {
        return Err(MergeError::NoSegments);
    }

    artifacts.sort_by_key(|artifact| artifact.index);
    if let Some(gap) = artifacts
        .iter()
        .enumerate()
        .find(|(position, artifact)| artifact.index != *position)
    {
        return Err(MergeError::MissingSegment(gap.0));
    }

    let staging = staging_path(destination);
    let buffer_size = buffer_size.max(1);

    match concatenate(&staging, &artifacts, buffer_size).await {
        Ok(total) => {
            fs::rename(&staging, destination)
                .await
                .map_err(|source| MergeError::Finalize {
                    path: destination.to_path_buf(),
                    source,
                })?;
            Ok(total)
        }
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&staging).await {
                warn!(
                    path = %staging.display(),
                    error = %remove_err,
                    "Could not remove staging file"
                );
            }
            Err(e)
        }
    }
}

async fn concatenate(
    staging: &Path,
    artifacts: &[SegmentArtifact],
    buffer_size: usize,
) -> Result<u64> {
    let write_err = |source: std::io::Error| MergeError::Write {
        path: staging.to_path_buf(),
        source,
    };

    let file = File::create(staging).await.map_err(write_err)?;
    let mut writer = BufWriter::with_capacity(buffer_size, file);
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    for artifact in artifacts {
        let read_err = |source: std::io::Error| MergeError::Read {
            path: artifact.path.clone(),
            source,
        };

        let file = File::open(&artifact.path).await.map_err(read_err)?;
        let mut reader = BufReader::with_capacity(buffer_size, file);
        let mut copied = 0u64;

        loop {
            let n = reader.read(&mut buf).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await.map_err(write_err)?;
            copied += n as u64;
        }

        fs::remove_file(&artifact.path)
            .await
            .map_err(|source| MergeError::Cleanup {
                path: artifact.path.clone(),
                source,
            })?;

        debug!(index = artifact.index, bytes = copied, "Segment merged");
        total += copied;
    }

    writer.flush().await.map_err(write_err)?;
    writer.get_ref().sync_all().await.map_err(write_err)?;

    Ok(total)
}
