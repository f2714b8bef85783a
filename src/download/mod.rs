//! Chunked parallel downloads
//!
//! A download run probes the resource size with `HEAD`, splits it into
//! byte ranges, fetches each range on its own task into a temporary file,
//! and concatenates the files in range order once every segment succeeded.
//!
//! ## Key Components
//!
//! - [`plan`] - partitions a size into [`ByteRange`]s
//! - [`fetch_segment`] - one ranged GET into one [`SegmentArtifact`]
//! - [`merge`] - ordered concatenation into the destination
//! - [`Downloader`] - runs a [`DownloadJob`] end to end
//! - [`download_whole`] - plain single-request fallback
//!
//! ## Example
//!
//! ```rust,no_run
//! use slicefetch::download::{DownloadJob, DownloadSettings, Downloader, HttpClient, HttpConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpConfig::default())?;
//! let downloader = Downloader::new(client, DownloadSettings::default());
//!
//! let job = DownloadJob::new("https://example.com/disk.img", "disk.img", 8)?;
//! let report = downloader.run(&job).await?;
//! println!("{} bytes in {} ms", report.content_size, report.elapsed_ms);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod merge;
mod orchestrator;
pub mod plan;
pub mod segment;
pub mod whole;

pub use http::{HttpClient, HttpConfig, TransportError};
pub use merge::{MergeError, merge};
pub use orchestrator::{
    DownloadJob, DownloadSettings, Downloader, InvalidJob, JobError, JobReport, Phase,
};
pub use plan::{ByteRange, PlanError, plan};
pub use segment::{SegmentArtifact, SegmentError, TempLayout, fetch_segment};
pub use whole::{WholeError, download_whole};
