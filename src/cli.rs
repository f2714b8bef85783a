use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "slicefetch")]
#[command(about = "Download one large file over parallel byte-range requests", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides SLICEFETCH_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a URL into a local file
    Get(GetArgs),
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Resource to download
    #[arg(short, long)]
    pub url: String,

    /// Output path; defaults to the last path segment of the URL
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel segments (defaults to download.segments)
    #[arg(short, long)]
    pub segments: Option<usize>,

    /// Skip range requests and fetch the file in one GET
    #[arg(long, conflicts_with = "fallback")]
    pub plain: bool,

    /// Fall back to a single GET when the size is unknown or too small to split
    #[arg(long)]
    pub fallback: bool,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl GetArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(file_name_from_url(&self.url)))
    }
}

/// Last non-empty path segment of `url`, or `output.bin`
pub fn file_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| "output.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://dl.example.com/go/go1.17.windows-amd64.msi"),
            "go1.17.windows-amd64.msi"
        );
        assert_eq!(
            file_name_from_url("https://example.com/image.png?id=123"),
            "image.png"
        );
        assert_eq!(file_name_from_url("https://example.com/"), "output.bin");
        assert_eq!(file_name_from_url("not a url"), "output.bin");
    }

    #[test]
    fn test_parse_get_command() {
        let cli = Cli::parse_from([
            "slicefetch",
            "get",
            "--url",
            "https://example.com/a.bin",
            "-s",
            "20",
            "--fallback",
        ]);

        let Commands::Get(args) = cli.command;
        assert_eq!(args.segments, Some(20));
        assert!(args.fallback);
        assert!(!args.plain);
        assert_eq!(args.output_path(), PathBuf::from("a.bin"));
    }

    #[test]
    fn test_plain_conflicts_with_fallback() {
        let result = Cli::try_parse_from([
            "slicefetch",
            "get",
            "--url",
            "https://example.com/a.bin",
            "--plain",
            "--fallback",
        ]);
        assert!(result.is_err());
    }
}
