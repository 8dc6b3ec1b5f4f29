//! Image resolution for the renderer
//!
//! Without graphics support an image becomes `[Image: <alt text>]`. With it,
//! a cached file is shown through the kitty protocol; otherwise a placeholder
//! is written and the download starts in the background.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::debug;

use super::cache::ImageCache;
use super::downloads::{spawn_fetch, DownloadRegistry, HttpFetcher, ImageFetcher};
use super::protocol::{kitty_display_file, GraphicsSupport};
use crate::markdown::WalkStatus;

const ALT_OPEN: &str = "[Image: ";
const ALT_CLOSE: &str = "]";
pub const IMAGE_ERROR: &str = "[Image Error]";
pub const IMAGE_DOWNLOADING: &str = "[Image Downloading...]";

pub struct ImageResolver {
    support: GraphicsSupport,
    cache: ImageCache,
    registry: Arc<DownloadRegistry>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImageResolver {
    /// Resolver sharing the process-wide download registry, fetching over HTTP
    pub fn new(support: GraphicsSupport, cache: ImageCache) -> Self {
        Self {
            support,
            cache,
            registry: DownloadRegistry::global(),
            fetcher: Arc::new(HttpFetcher::default()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<DownloadRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn support(&self) -> GraphicsSupport {
        self.support
    }

    pub fn registry(&self) -> &Arc<DownloadRegistry> {
        &self.registry
    }

    /// Write the image for `url` and tell the walker whether to render the
    /// alt text children.
    pub fn resolve<W: Write + ?Sized>(
        &self,
        w: &mut W,
        url: &str,
        entering: bool,
    ) -> io::Result<WalkStatus> {
        if !self.support.is_supported() {
            w.write_all(if entering { ALT_OPEN } else { ALT_CLOSE }.as_bytes())?;
            return Ok(WalkStatus::Continue);
        }

        if !entering {
            return Ok(WalkStatus::Continue);
        }

        let path = self.cache.path_for(url);

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                debug!("Failed to create {}: {}", parent.display(), e);
                w.write_all(IMAGE_ERROR.as_bytes())?;
                return Ok(WalkStatus::SkipChildren);
            }
        }

        if path.exists() {
            match std::path::absolute(&path) {
                Ok(absolute) => w.write_all(kitty_display_file(&absolute).as_bytes())?,
                Err(e) => {
                    debug!("Failed to resolve {}: {}", path.display(), e);
                    w.write_all(IMAGE_ERROR.as_bytes())?;
                }
            }
            return Ok(WalkStatus::SkipChildren);
        }

        if let Some(claim) = self.registry.try_begin(url) {
            spawn_fetch(Arc::clone(&self.fetcher), claim, path);
        }
        w.write_all(IMAGE_DOWNLOADING.as_bytes())?;
        Ok(WalkStatus::SkipChildren)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::downloads::FetchError;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    const URL: &str = "http://example.com/image.png";

    /// Counts calls; each fetch waits for `release` before finishing
    struct GatedFetcher {
        calls: AtomicUsize,
        release: Notify,
        succeed: bool,
    }

    impl GatedFetcher {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                succeed,
            })
        }
    }

    #[async_trait]
    impl ImageFetcher for GatedFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            if self.succeed {
                tokio::fs::write(dest, b"png bytes").await?;
                Ok(())
            } else {
                Err(FetchError::Io(io::Error::other("connection refused")))
            }
        }
    }

    fn kitty_resolver(root: &Path, fetcher: Arc<GatedFetcher>) -> ImageResolver {
        ImageResolver::new(GraphicsSupport::Kitty, ImageCache::new(root))
            .with_registry(Arc::new(DownloadRegistry::new()))
            .with_fetcher(fetcher)
    }

    fn resolve_to_string(resolver: &ImageResolver, url: &str) -> (String, WalkStatus) {
        let mut out = Vec::new();
        let status = resolver.resolve(&mut out, url, true).unwrap();
        (String::from_utf8(out).unwrap(), status)
    }

    async fn wait_until_idle(registry: &DownloadRegistry) {
        for _ in 0..200 {
            if registry.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("download never finished");
    }

    async fn wait_for_calls(fetcher: &GatedFetcher, expected: usize) {
        for _ in 0..200 {
            if fetcher.calls.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), expected);
    }

    #[test]
    fn test_placeholder_without_graphics() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ImageResolver::new(GraphicsSupport::None, ImageCache::new(dir.path()));

        let mut out = Vec::new();
        assert_eq!(
            resolver.resolve(&mut out, URL, true).unwrap(),
            WalkStatus::Continue
        );
        assert_eq!(
            resolver.resolve(&mut out, URL, false).unwrap(),
            WalkStatus::Continue
        );
        assert_eq!(out, b"[Image: ]");
        // Nothing touched on disk
        assert!(!dir.path().join("images").exists());
    }

    #[tokio::test]
    async fn test_cache_hit_emits_graphics() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GatedFetcher::new(true);
        let resolver = kitty_resolver(dir.path(), Arc::clone(&fetcher));

        let path = ImageCache::new(dir.path()).path_for(URL);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"dummy image content").unwrap();

        let (out, status) = resolve_to_string(&resolver, URL);
        assert_eq!(status, WalkStatus::SkipChildren);

        let payload = out
            .strip_prefix("\x1b_Ga=T,t=f;")
            .and_then(|s| s.strip_suffix("\x1b\\"))
            .unwrap();
        let decoded = String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!(decoded, std::path::absolute(&path).unwrap().to_string_lossy());

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(resolver.registry().is_empty());
    }

    #[tokio::test]
    async fn test_miss_starts_single_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GatedFetcher::new(true);
        let resolver = kitty_resolver(dir.path(), Arc::clone(&fetcher));

        let (out, status) = resolve_to_string(&resolver, URL);
        assert_eq!(out, IMAGE_DOWNLOADING);
        assert_eq!(status, WalkStatus::SkipChildren);
        assert_eq!(resolver.registry().len(), 1);

        // Second request while the first is pending
        let (out, _) = resolve_to_string(&resolver, URL);
        assert_eq!(out, IMAGE_DOWNLOADING);
        assert_eq!(resolver.registry().len(), 1);

        wait_for_calls(&fetcher, 1).await;

        fetcher.release.notify_one();
        wait_until_idle(resolver.registry()).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        // Converged: now a cache hit
        let (out, _) = resolve_to_string(&resolver, URL);
        assert!(out.starts_with("\x1b_Ga=T,t=f;"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_retries_on_next_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GatedFetcher::new(false);
        let resolver = kitty_resolver(dir.path(), Arc::clone(&fetcher));

        let (out, _) = resolve_to_string(&resolver, URL);
        assert_eq!(out, IMAGE_DOWNLOADING);

        fetcher.release.notify_one();
        wait_until_idle(resolver.registry()).await;
        assert!(!ImageCache::new(dir.path()).path_for(URL).exists());

        let (out, _) = resolve_to_string(&resolver, URL);
        assert_eq!(out, IMAGE_DOWNLOADING);
        assert_eq!(resolver.registry().len(), 1);

        fetcher.release.notify_one();
        wait_until_idle(resolver.registry()).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shared_registry_across_resolvers() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GatedFetcher::new(true);
        let registry = Arc::new(DownloadRegistry::new());

        let a = kitty_resolver(dir.path(), Arc::clone(&fetcher))
            .with_registry(Arc::clone(&registry));
        let b = kitty_resolver(dir.path(), Arc::clone(&fetcher))
            .with_registry(Arc::clone(&registry));

        resolve_to_string(&a, URL);
        resolve_to_string(&b, URL);
        assert_eq!(registry.len(), 1);

        fetcher.release.notify_one();
        wait_until_idle(&registry).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwritable_cache_dir_is_error_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the cache root directory should be
        let root = dir.path().join("root");
        std::fs::write(&root, b"").unwrap();

        let resolver = ImageResolver::new(GraphicsSupport::Kitty, ImageCache::new(&root))
            .with_registry(Arc::new(DownloadRegistry::new()));

        let (out, status) = resolve_to_string(&resolver, URL);
        assert_eq!(out, IMAGE_ERROR);
        assert_eq!(status, WalkStatus::SkipChildren);
        assert!(resolver.registry().is_empty());
    }
}
