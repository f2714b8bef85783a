//! Download orchestration: probe, plan, fetch in parallel, merge

use super::http::{HttpClient, TransportError};
use super::merge::{self, MergeError};
use super::plan::{self, ByteRange, PlanError};
use super::segment::{self, SegmentArtifact, SegmentError, TempLayout};
use crate::humanize::ByteSize;
use crate::observability::SegmentEvent;
use reqwest::Url;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::fs;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

/// Stage of a single download run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Probing,
    Planning,
    Downloading,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Probing => "probing",
            Phase::Planning => "planning",
            Phase::Downloading => "downloading",
            Phase::Merging => "merging",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("invalid download job: {0}")]
pub struct InvalidJob(String);

#[derive(Debug, Error)]
pub enum JobError {
    #[error("content size unavailable: {0}")]
    SizeUnavailable(#[source] TransportError),

    #[error("cannot plan segments: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("failed to prepare temporary directory {}: {source}", .path.display())]
    TempDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("segment {index} (bytes {start}-{end}) failed: {source}")]
    DownloadFailure {
        index: usize,
        start: u64,
        end: u64,
        #[source]
        source: SegmentError,
    },

    /// A segment task panicked or was aborted; `index` is `None` when the
    /// task could not be traced back to its range
    #[error("segment task did not finish: {reason}")]
    Join {
        index: Option<usize>,
        reason: String,
    },

    #[error("merge failed: {0}")]
    MergeFailure(#[from] MergeError),
}

impl JobError {
    /// Phase the run was in when it failed
    pub fn phase(&self) -> Phase {
        match self {
            JobError::SizeUnavailable(_) => Phase::Probing,
            JobError::InvalidPlan(_) => Phase::Planning,
            JobError::TempDir { .. }
            | JobError::DownloadFailure { .. }
            | JobError::Join { .. } => Phase::Downloading,
            JobError::MergeFailure(_) => Phase::Merging,
        }
    }

    /// Byte range of the failed segment, if a segment failed
    pub fn range(&self) -> Option<ByteRange> {
        match self {
            JobError::DownloadFailure {
                index, start, end, ..
            } => Some(ByteRange {
                index: *index,
                start: *start,
                end: *end,
            }),
            _ => None,
        }
    }

    /// Whether the run failed before any byte of the body was requested
    pub fn is_pre_download(&self) -> bool {
        matches!(
            self,
            JobError::SizeUnavailable(_) | JobError::InvalidPlan(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

/// What to download, where to, and over how many parallel segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub source_url: String,
    pub destination: PathBuf,
    pub segment_count: usize,
}

impl DownloadJob {
    pub fn new(
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        segment_count: usize,
    ) -> std::result::Result<Self, InvalidJob> {
        let source_url = source_url.into();

        let parsed = Url::parse(&source_url)
            .map_err(|e| InvalidJob(format!("'{}' is not a valid URL: {}", source_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(InvalidJob(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        if segment_count == 0 {
            return Err(InvalidJob("segment count must be at least 1".to_string()));
        }

        let destination = destination.into();
        if destination.as_os_str().is_empty() {
            return Err(InvalidJob("destination path is empty".to_string()));
        }

        Ok(Self {
            source_url,
            destination,
            segment_count,
        })
    }
}

/// Knobs for the download phase that do not change per job
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Where segment artifacts live; defaults to the destination's directory
    pub temp_dir: Option<PathBuf>,
    pub merge_buffer: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            temp_dir: None,
            merge_buffer: 64 * 1024,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub destination: PathBuf,
    pub content_size: u64,
    pub segments: usize,
    pub elapsed_ms: u64,
}

/// Runs chunked downloads. One instance can serve many jobs, one at a time
/// or concurrently; runs share nothing but the HTTP connection pool.
pub struct Downloader {
    client: HttpClient,
    settings: DownloadSettings,
    events: Option<UnboundedSender<SegmentEvent>>,
}

impl Downloader {
    pub fn new(client: HttpClient, settings: DownloadSettings) -> Self {
        Self {
            client,
            settings,
            events: None,
        }
    }

    /// Attach an observer channel that receives per-segment events
    pub fn with_events(mut self, events: UnboundedSender<SegmentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run(&self, job: &DownloadJob) -> Result<JobReport> {
        let span = info_span!(
            "download",
            url = %job.source_url,
            destination = %job.destination.display(),
            segments = job.segment_count,
        );

        let result = self.execute(job).instrument(span.clone()).await;

        if let Err(e) = &result {
            span.in_scope(|| {
                warn!(phase = %Phase::Failed, failed_in = %e.phase(), error = %e, "Download failed")
            });
        }

        result
    }

    async fn execute(&self, job: &DownloadJob) -> Result<JobReport> {
        let started = Instant::now();

        info!(phase = %Phase::Probing, "Probing content length");
        let content_size = self
            .client
            .probe(&job.source_url)
            .await
            .map_err(JobError::SizeUnavailable)?;

        info!(phase = %Phase::Planning, size = %ByteSize(content_size), "Planning segments");
        let ranges = plan::plan(content_size, job.segment_count)?;

        info!(phase = %Phase::Downloading, count = ranges.len(), "Downloading segments");
        let artifacts = self.download_segments(job, ranges).await?;

        info!(phase = %Phase::Merging, "Merging segments");
        let pending = artifacts.clone();
        let merged = merge::merge(&job.destination, artifacts, self.settings.merge_buffer).await;
        let written = match merged {
            Ok(written) => written,
            Err(e) => {
                discard_artifacts(&pending).await;
                return Err(e.into());
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            phase = %Phase::Done,
            size = %ByteSize(written),
            elapsed_ms,
            "Download completed"
        );

        Ok(JobReport {
            destination: job.destination.clone(),
            content_size: written,
            segments: job.segment_count,
            elapsed_ms,
        })
    }

    /// Fetch every range concurrently and wait for all of them.
    ///
    /// Siblings of a failed segment are not cancelled; they run to their own
    /// completion and are joined before returning. The first failure to be
    /// observed is the one reported.
    async fn download_segments(
        &self,
        job: &DownloadJob,
        ranges: Vec<ByteRange>,
    ) -> Result<Vec<SegmentArtifact>> {
        let temp_dir = self.prepare_temp_dir(&job.destination).await?;
        let layout = Arc::new(TempLayout::new(temp_dir, &job.destination));
        let url: Arc<str> = Arc::from(job.source_url.as_str());

        debug!(run_id = layout.run_id(), "Spawning segment workers");

        let mut workers = JoinSet::new();
        let mut task_ranges = HashMap::with_capacity(ranges.len());

        for range in ranges {
            self.emit(SegmentEvent::Started {
                index: range.index,
                start: range.start,
                end: range.end,
            });

            let client = self.client.clone();
            let url = Arc::clone(&url);
            let layout = Arc::clone(&layout);

            let handle = workers.spawn(async move {
                let outcome = segment::fetch_segment(&client, &url, range, &layout).await;
                (range, outcome)
            });
            task_ranges.insert(handle.id(), range);
        }

        let mut artifacts = Vec::with_capacity(task_ranges.len());
        let mut first_error: Option<JobError> = None;

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((_, (range, Ok(artifact)))) => {
                    self.emit(SegmentEvent::Completed {
                        index: range.index,
                        bytes: artifact.len,
                    });
                    artifacts.push(artifact);
                }
                Ok((_, (range, Err(source)))) => {
                    self.emit(SegmentEvent::Failed {
                        index: range.index,
                        error: source.to_string(),
                    });
                    first_error.get_or_insert(JobError::DownloadFailure {
                        index: range.index,
                        start: range.start,
                        end: range.end,
                        source,
                    });
                }
                Err(join_error) => {
                    let index = task_ranges
                        .get(&join_error.id())
                        .map(|range| range.index);
                    match index {
                        Some(index) => self.emit(SegmentEvent::Failed {
                            index,
                            error: join_error.to_string(),
                        }),
                        None => warn!(task = %join_error.id(), "Unknown segment task failed"),
                    }
                    first_error.get_or_insert(JobError::Join {
                        index,
                        reason: join_error.to_string(),
                    });
                }
            }
        }

        if let Some(e) = first_error {
            discard_artifacts(&artifacts).await;
            return Err(e);
        }

        Ok(artifacts)
    }

    async fn prepare_temp_dir(&self, destination: &Path) -> Result<PathBuf> {
        match &self.settings.temp_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .await
                    .map_err(|source| JobError::TempDir {
                        path: dir.clone(),
                        source,
                    })?;
                Ok(dir.clone())
            }
            None => Ok(destination
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))),
        }
    }

    fn emit(&self, event: SegmentEvent) {
        if let Some(events) = &self.events {
            // a dropped observer must not fail the download
            let _ = events.send(event);
        }
    }
}

async fn discard_artifacts(artifacts: &[SegmentArtifact]) {
    for artifact in artifacts {
        if let Err(e) = fs::remove_file(&artifact.path).await {
            debug!(path = %artifact.path.display(), error = %e, "Could not remove segment artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_validation() {
        assert!(DownloadJob::new("https://example.com/a.iso", "a.iso", 4).is_ok());
        assert!(DownloadJob::new("not a url", "a.iso", 4).is_err());
        assert!(DownloadJob::new("ftp://example.com/a.iso", "a.iso", 4).is_err());
        assert!(DownloadJob::new("https://example.com/a.iso", "a.iso", 0).is_err());
        assert!(DownloadJob::new("https://example.com/a.iso", "", 2).is_err());
    }

    #[test]
    fn test_error_phases() {
        let probe = JobError::SizeUnavailable(TransportError::MissingContentLength);
        assert_eq!(probe.phase(), Phase::Probing);
        assert!(probe.is_pre_download());
        assert!(probe.range().is_none());

        let plan = JobError::from(PlanError::TooManySegments {
            content_size: 2,
            segment_count: 5,
        });
        assert_eq!(plan.phase(), Phase::Planning);
        assert!(plan.is_pre_download());

        let segment = JobError::DownloadFailure {
            index: 1,
            start: 34,
            end: 67,
            source: SegmentError::ShortBody {
                expected: 34,
                received: 10,
            },
        };
        assert_eq!(segment.phase(), Phase::Downloading);
        assert!(!segment.is_pre_download());
        assert_eq!(
            segment.range(),
            Some(ByteRange {
                index: 1,
                start: 34,
                end: 67
            })
        );
        assert!(segment.to_string().contains("bytes 34-67"));

        let merge = JobError::from(MergeError::NoSegments);
        assert_eq!(merge.phase(), Phase::Merging);

        let join = JobError::Join {
            index: None,
            reason: "task panicked".to_string(),
        };
        assert_eq!(join.phase(), Phase::Downloading);
        assert!(join.range().is_none());
    }

    #[tokio::test]
    async fn test_temp_dir_defaults_to_destination_parent() {
        let downloader = Downloader::new(
            HttpClient::new(&Default::default()).unwrap(),
            DownloadSettings::default(),
        );

        let dir = downloader
            .prepare_temp_dir(Path::new("/data/images/disk.img"))
            .await
            .unwrap();
        assert_eq!(dir, PathBuf::from("/data/images"));

        let dir = downloader
            .prepare_temp_dir(Path::new("disk.img"))
            .await
            .unwrap();
        assert_eq!(dir, PathBuf::from("."));
    }

    #[tokio::test]
    async fn test_configured_temp_dir_is_created() {
        let root = tempfile::TempDir::new().unwrap();
        let wanted = root.path().join("nested").join("scratch");

        let downloader = Downloader::new(
            HttpClient::new(&Default::default()).unwrap(),
            DownloadSettings {
                temp_dir: Some(wanted.clone()),
                ..Default::default()
            },
        );

        let dir = downloader
            .prepare_temp_dir(Path::new("out.bin"))
            .await
            .unwrap();
        assert_eq!(dir, wanted);
        assert!(wanted.is_dir());
    }
}
