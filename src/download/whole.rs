//! Single-request download of a whole resource, no ranges involved

use super::http::{self, HttpClient, TransportError};
use super::merge::staging_path;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

#[derive(Debug, Error)]
pub enum WholeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, WholeError>;

/// Stream `url` into `destination` through a fresh staging file beside it
pub async fn download_whole(client: &HttpClient, url: &str, destination: &Path) -> Result<u64> {
    let staging = staging_path(destination);

    let result = stream_to(client, url, &staging).await;
    let written = match result {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
    };

    fs::rename(&staging, destination)
        .await
        .map_err(|source| WholeError::Io {
            path: destination.to_path_buf(),
            source,
        })?;

    info!(url, bytes = written, path = %destination.display(), "Whole-file download finished");
    Ok(written)
}

async fn stream_to(client: &HttpClient, url: &str, path: &Path) -> Result<u64> {
    let io_err = |source: std::io::Error| WholeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut response = client.get(url).await?;

    let file = File::create(path).await.map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    while let Some(chunk) = http::next_chunk(&mut response).await? {
        writer.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(io_err)?;
    Ok(written)
}
