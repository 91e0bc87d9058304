use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use glean::config::Config;
use glean::feed::{aggregate, fetch_feeds, parse_source_list, render};
use glean::gemini::{GeminiClient, GeminiError, TlsConnector, Url};

/// Get the default config file path (~/.config/glean/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("glean")
            .join("config.toml"),
    )
}

/// Loads the config named on the command line, else the default file if `HOME` is set.
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("HOME not set, using default configuration");
                return Ok(Config::default());
            }
        },
    };
    Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// The file named by a path argument; `None` and `-` both mean the standard stream.
fn file_arg(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| *p != Path::new("-"))
}

/// Reads an optional header/footer file; a missing or unreadable file is empty text.
async fn read_optional(path: Option<&Path>, what: &str) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read {what} file, leaving it out");
            eprintln!(
                "Failed to open {what} file {}. Make sure the file exists and is readable",
                path.display()
            );
            String::new()
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "glean",
    about = "Read Gemini feeds and generate one gemtext page from them"
)]
struct Args {
    /// Feed list: a gemtext file of link lines; the label becomes the feed title (default: stdin)
    #[arg(long, value_name = "FILE")]
    feeds: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// File prepended to the feed list
    #[arg(long, value_name = "FILE")]
    header: Option<PathBuf>,

    /// File appended to the feed list
    #[arg(long, value_name = "FILE")]
    footer: Option<PathBuf>,

    /// Config file (default: ~/.config/glean/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of feeds fetched at once (overrides the config file)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout can carry the generated page
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    tracing::debug!(?config, "Effective configuration");

    let feed_list = match file_arg(args.feeds.as_deref()) {
        Some(path) => tokio::fs::read_to_string(path).await.with_context(|| {
            format!(
                "Failed to open feeds file {}. Make sure the file exists.",
                path.display()
            )
        })?,
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read feed list from stdin")?;
            text
        }
    };

    let sources = parse_source_list(&feed_list);
    if sources.is_empty() {
        eprintln!("Warning: No valid feeds found in the feed list");
    }

    let connector = TlsConnector::new(config.connect_timeout())
        .context("Failed to set up TLS")?;
    let client = GeminiClient::new(connector)
        .with_max_redirects(config.max_redirects)
        .with_max_response_size(config.max_response_bytes);

    let report = |url: &Url, error: &GeminiError| {
        eprintln!("Failure fetching feed at {url}: {error}");
    };
    let feeds = fetch_feeds(&client, &sources, config.concurrency, &report).await;

    let header = read_optional(args.header.as_deref(), "header").await;
    let footer = read_optional(args.footer.as_deref(), "footer").await;

    let page = render(&aggregate(&feeds), &header, &footer, Utc::now());

    match file_arg(args.output.as_deref()) {
        Some(path) => {
            tokio::fs::write(path, page.as_bytes())
                .await
                .with_context(|| {
                    format!(
                        "Failed to write output file {}. Make sure the path is writable.",
                        path.display()
                    )
                })?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(page.as_bytes())
                .await
                .context("Failed to write output to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
