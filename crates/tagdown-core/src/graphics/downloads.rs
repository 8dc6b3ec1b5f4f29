//! Background image downloads
//!
//! At most one fetch per URL runs at any time, across every renderer in the
//! process. A URL is in the registry exactly while its fetch is running; the
//! entry is removed when the fetch ends, whether it succeeded or not.
//!
//! Fetches are fire-and-forget. Nothing reports completion; a later render
//! sees the cached file (or doesn't, and tries again). Bodies are written to a
//! `.part` sibling and renamed into place, so a cache path never holds a
//! partial image, even if the process exits mid-download.

use async_trait::async_trait;
use dashmap::DashSet;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

static GLOBAL_REGISTRY: Lazy<Arc<DownloadRegistry>> =
    Lazy::new(|| Arc::new(DownloadRegistry::new()));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Set of URLs with a fetch in flight
#[derive(Debug, Default)]
pub struct DownloadRegistry {
    in_flight: DashSet<String>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Claim `url`. Returns `None` if a fetch for it is already running.
    /// The claim is released when the returned guard is dropped.
    pub fn try_begin(self: &Arc<Self>, url: &str) -> Option<InFlight> {
        if self.in_flight.insert(url.to_string()) {
            Some(InFlight {
                registry: Arc::clone(self),
                url: url.to_string(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.in_flight.contains(url)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Registry claim for one URL
#[derive(Debug)]
pub struct InFlight {
    registry: Arc<DownloadRegistry>,
    url: String,
}

impl InFlight {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry.in_flight.remove(&self.url);
    }
}

/// Downloads `url` into a new file at `dest`
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Plain HTTP GET, body streamed straight to disk
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self.client.get(url).send().await?;
        // Entries are never rewritten, so an error page would stick forever
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        write_body(response.bytes_stream(), dest).await
    }
}

/// Write a streamed body to `dest`, all or nothing
async fn write_body<S, B, E>(body: S, dest: &Path) -> Result<(), FetchError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    FetchError: From<E>,
{
    let partial = partial_path(dest);
    let mut body = std::pin::pin!(body);

    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        while let Some(chunk) = body.next().await {
            file.write_all(chunk?.as_ref()).await?;
        }
        file.flush().await?;
        Ok::<_, FetchError>(())
    }
    .await;

    match written {
        Ok(()) => {
            tokio::fs::rename(&partial, dest).await?;
            Ok(())
        }
        Err(e) => {
            if let Err(remove) = tokio::fs::remove_file(&partial).await {
                debug!("Failed to remove {}: {}", partial.display(), remove);
            }
            Err(e)
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".part");
    dest.with_file_name(name)
}

/// Run a fetch in the background, holding `claim` until it finishes.
///
/// Uses the current tokio runtime if there is one, otherwise a dedicated
/// thread with its own single-threaded runtime.
pub(crate) fn spawn_fetch(
    fetcher: Arc<dyn ImageFetcher>,
    claim: InFlight,
    dest: PathBuf,
) {
    let task = async move {
        let url = claim.url().to_string();
        debug!("Fetching image {} -> {}", url, dest.display());
        match fetcher.fetch(&url, &dest).await {
            Ok(()) => debug!("Cached image {}", url),
            Err(e) => debug!("Image fetch failed for {}: {}", url, e),
        }
        drop(claim);
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => {
            let spawned = std::thread::Builder::new()
                .name("tagdown-fetch".to_string())
                .spawn(move || {
                    match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(task),
                        Err(e) => warn!("Failed to start fetch runtime: {}", e),
                    }
                });
            if let Err(e) = spawned {
                warn!("Failed to spawn fetch thread: {}", e);
            }
        }
    }
}
