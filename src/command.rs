use crate::cli::GetArgs;
use serde::Serialize;
use slicefetch::config::{ByteSize, Config};
use slicefetch::download::{DownloadJob, Downloader, HttpClient, JobReport, download_whole};
use slicefetch::observability::ProgressTally;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Serialize)]
struct Outcome {
    mode: &'static str,
    #[serde(flatten)]
    report: JobReport,
}

pub async fn get(args: GetArgs, config: &Config) -> Result<(), AnyError> {
    let client = HttpClient::new(&config.http.to_http_config())?;
    let destination = args.output_path();

    if args.plain {
        let report = plain(&client, &args.url, &destination).await?;
        return emit(Outcome { mode: "plain", report }, args.json);
    }

    let segments = args.segments.unwrap_or(config.download.segments);
    let job = DownloadJob::new(args.url.clone(), destination.clone(), segments)?;

    let (events, receiver) = mpsc::unbounded_channel();
    let tally = ProgressTally::spawn(receiver);

    let downloader = Downloader::new(client.clone(), config.download.to_settings()).with_events(events);
    let result = downloader.run(&job).await;

    // closes the event channel so the tally can finish
    drop(downloader);
    let progress = tally.await?;

    match result {
        Ok(report) => {
            info!(
                completed = progress.completed,
                bytes = progress.bytes,
                "All segments accounted for"
            );
            emit(Outcome { mode: "chunked", report }, args.json)
        }
        Err(e) if args.fallback && e.is_pre_download() => {
            warn!(error = %e, "Chunked download not possible, falling back to a single request");
            let report = plain(&client, &args.url, &destination).await?;
            emit(Outcome { mode: "plain", report }, args.json)
        }
        Err(e) => {
            if let Some(range) = e.range() {
                warn!(
                    index = range.index,
                    start = range.start,
                    end = range.end,
                    failed = progress.failed,
                    "Segment failure aborted the download"
                );
            }
            Err(e.into())
        }
    }
}

async fn plain(client: &HttpClient, url: &str, destination: &Path) -> Result<JobReport, AnyError> {
    let started = Instant::now();
    let written = download_whole(client, url, destination).await?;

    Ok(JobReport {
        destination: destination.to_path_buf(),
        content_size: written,
        segments: 1,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

fn emit(outcome: Outcome, json: bool) -> Result<(), AnyError> {
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        println!(
            "{} {} ({}, {} segment(s), {} ms)",
            outcome.mode,
            outcome.report.destination.display(),
            ByteSize(outcome.report.content_size),
            outcome.report.segments,
            outcome.report.elapsed_ms
        );
    }
    Ok(())
}
