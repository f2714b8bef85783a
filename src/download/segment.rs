//! Segment fetcher: one ranged GET written to one temporary artifact

use super::http::{self, HttpClient, TransportError};
use super::plan::ByteRange;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("body ended after {received} of {expected} bytes")]
    ShortBody { expected: u64, received: u64 },

    #[error("body exceeded the expected {expected} bytes")]
    LongBody { expected: u64 },
}

pub type Result<T> = std::result::Result<T, SegmentError>;

/// Naming scheme for the temporary files of one download run.
///
/// Paths look like `<dir>/.<stem>.<run_id>.section-<index>.tmp`, so two
/// runs never share a file and no artifact can be mistaken for the
/// destination itself.
#[derive(Debug, Clone)]
pub struct TempLayout {
    dir: PathBuf,
    stem: String,
    run_id: String,
}

impl TempLayout {
    pub fn new(dir: impl Into<PathBuf>, destination: &Path) -> Self {
        let stem = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        Self {
            dir: dir.into(),
            stem,
            run_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn artifact_path(&self, index: usize) -> PathBuf {
        let name = format!(".{}.{}.section-{}.tmp", self.stem, self.run_id, index);
        self.dir.join(name)
    }
}

/// Bytes of one range, persisted on disk until the merge consumes them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentArtifact {
    pub index: usize,
    pub path: PathBuf,
    pub len: u64,
}

/// Download `range` of `url` into its artifact file.
///
/// The artifact is only reported once every expected byte is flushed to
/// disk. A failed attempt removes whatever it had written.
pub async fn fetch_segment(
    client: &HttpClient,
    url: &str,
    range: ByteRange,
    layout: &TempLayout,
) -> Result<SegmentArtifact> {
    let path = layout.artifact_path(range.index);

    let result = write_range(client, url, range, &path).await;

    if result.is_err() {
        let _ = fs::remove_file(&path).await;
    }

    let len = result?;
    debug!(index = range.index, bytes = len, path = %path.display(), "Segment stored");

    Ok(SegmentArtifact {
        index: range.index,
        path,
        len,
    })
}

async fn write_range(
    client: &HttpClient,
    url: &str,
    range: ByteRange,
    path: &Path,
) -> Result<u64> {
    let io_err = |source: std::io::Error| SegmentError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut response = client.get_range(url, &range).await?;

    let file = File::create(path).await.map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    let expected = range.len();
    let mut received = 0u64;

    while let Some(chunk) = http::next_chunk(&mut response).await? {
        received += chunk.len() as u64;
        if received > expected {
            return Err(SegmentError::LongBody { expected });
        }
        writer.write_all(&chunk).await.map_err(io_err)?;
    }

    writer.flush().await.map_err(io_err)?;

    if received < expected {
        return Err(SegmentError::ShortBody { expected, received });
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths_are_distinct() {
        let layout = TempLayout::new("/tmp/downloads", Path::new("/data/archive.zip"));

        let first = layout.artifact_path(0);
        let second = layout.artifact_path(1);

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/tmp/downloads")));

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".archive.zip."));
        assert!(name.ends_with(".section-0.tmp"));
        assert!(name.contains(layout.run_id()));
    }

    #[test]
    fn test_runs_do_not_collide() {
        let destination = Path::new("out.bin");
        let a = TempLayout::new(".", destination);
        let b = TempLayout::new(".", destination);

        assert_ne!(a.artifact_path(3), b.artifact_path(3));
    }

    #[test]
    fn test_destination_without_file_name() {
        let layout = TempLayout::new(".", Path::new("/"));
        let name = layout.artifact_path(0);
        assert!(name.to_string_lossy().contains(".download."));
    }
}
