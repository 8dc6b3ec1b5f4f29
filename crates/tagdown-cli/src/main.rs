//! tagdown - render chat markdown as terminal style tags
//!
//! Reads markdown from a file or stdin and writes the tagged text to stdout.
//! Logs go to stderr (`RUST_LOG`, default `warn`).

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tagdown_core::graphics::DownloadRegistry;
use tagdown_core::{markdown, Config, Renderer};
use tracing_subscriber::EnvFilter;

const DOWNLOAD_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "tagdown", version, about = "Render chat markdown as terminal style tags")]
struct Args {
    /// Markdown file to render (stdin when omitted)
    file: Option<PathBuf>,

    /// Config file (default: <config dir>/tagdown/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Image cache root, overrides the config
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Wait up to SECS for image downloads, then render again
    #[arg(long, value_name = "SECS")]
    wait_images: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = args.cache_dir {
        config.cache_dir = Some(dir);
    }

    let source = read_source(args.file.as_deref())?;
    let doc = markdown::parse(&source, &config.mentions);
    let mut renderer = Renderer::from_config(&config);

    render_to_stdout(&mut renderer, &source, &doc)?;
    let registry = Arc::clone(renderer.images().registry());

    if let Some(secs) = args.wait_images {
        if !registry.is_empty() {
            if wait_for_downloads(&registry, Some(Duration::from_secs(secs))).await {
                tracing::debug!("Downloads finished, rendering again");
            } else {
                tracing::warn!("Gave up waiting for {} image download(s)", registry.len());
            }
            println!();
            render_to_stdout(&mut renderer, &source, &doc)?;
        }
    }

    // Fetch tasks die with the runtime
    if !registry.is_empty() {
        tracing::debug!("Finishing {} image download(s)", registry.len());
        wait_for_downloads(&registry, None).await;
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            Ok(Config::load(path)?)
        }
        None => match Config::default_path() {
            Some(path) => Ok(Config::load(&path)?),
            None => Ok(Config::default()),
        },
    }
}

fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read stdin")?;
            Ok(source)
        }
    }
}

fn render_to_stdout(renderer: &mut Renderer, source: &str, doc: &markdown::Node) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    renderer
        .render(&mut stdout, source, doc)
        .context("Failed to render")?;
    stdout.flush()?;
    Ok(())
}

/// Poll until no downloads are in flight. Returns false on timeout.
async fn wait_for_downloads(registry: &DownloadRegistry, timeout: Option<Duration>) -> bool {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    while !registry.is_empty() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return false;
        }
        tokio::time::sleep(DOWNLOAD_POLL).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tagdown",
            "notes.md",
            "--cache-dir",
            "/tmp/c",
            "--wait-images",
            "5",
        ])
        .unwrap();
        assert_eq!(args.file, Some(PathBuf::from("notes.md")));
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/c")));
        assert_eq!(args.wait_images, Some(5));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_read_source_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.md");
        std::fs::write(&path, "# hi").unwrap();
        assert_eq!(read_source(Some(&path)).unwrap(), "# hi");
    }

    #[tokio::test]
    async fn test_wait_for_downloads() {
        let registry = Arc::new(DownloadRegistry::new());
        let short = Some(Duration::from_millis(10));
        assert!(wait_for_downloads(&registry, short).await);

        let claim = registry.try_begin("http://x/y.png").unwrap();
        assert!(!wait_for_downloads(&registry, Some(Duration::from_millis(60))).await);

        drop(claim);
        assert!(wait_for_downloads(&registry, short).await);
    }

    #[tokio::test]
    async fn test_wait_for_downloads_without_timeout_drains() {
        let registry = Arc::new(DownloadRegistry::new());
        let claim = registry.try_begin("http://x/slow.png").unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            drop(claim);
        });

        assert!(wait_for_downloads(&registry, None).await);
        assert!(registry.is_empty());
    }
}
