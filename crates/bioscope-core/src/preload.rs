//! Anticipatory video preloading
//!
//! The strategy decides *what* to warm up from the playlist position and
//! network quality; the preloader owns the cancellable fetch tasks.
//! Preloading is best-effort: fetch failures are logged and swallowed,
//! never surfaced as playback errors.

use crate::types::{NetworkQuality, PreloadPriority, PreloadableVideo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Picks which playlist entries to warm up
pub trait PreloadStrategy: Send + Sync {
    /// Videos to preload given the current playlist position
    fn videos_to_preload(
        &self,
        current_index: usize,
        playlist: &[PreloadableVideo],
        quality: NetworkQuality,
    ) -> Vec<PreloadableVideo>;

    /// Strategy name
    fn name(&self) -> &'static str;
}

/// Preloads the next one or two videos after the current position
///
/// No wraparound and no padding: the slice is clamped to what remains of
/// the playlist.
pub struct AdjacentVideoPreloadStrategy;

impl AdjacentVideoPreloadStrategy {
    pub fn new() -> Self {
        Self
    }

    /// How many upcoming videos the network can afford to warm
    fn preload_count(quality: NetworkQuality) -> usize {
        match quality {
            NetworkQuality::Offline => 0,
            NetworkQuality::Poor | NetworkQuality::Fair => 1,
            NetworkQuality::Good | NetworkQuality::Excellent => 2,
        }
    }
}

impl Default for AdjacentVideoPreloadStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl PreloadStrategy for AdjacentVideoPreloadStrategy {
    fn videos_to_preload(
        &self,
        current_index: usize,
        playlist: &[PreloadableVideo],
        quality: NetworkQuality,
    ) -> Vec<PreloadableVideo> {
        if playlist.is_empty() || current_index >= playlist.len() {
            return Vec::new();
        }
        if quality == NetworkQuality::Offline {
            return Vec::new();
        }

        let start = current_index + 1;
        if start >= playlist.len() {
            return Vec::new();
        }

        let end = (start + Self::preload_count(quality)).min(playlist.len());
        playlist[start..end].to_vec()
    }

    fn name(&self) -> &'static str {
        "adjacent"
    }
}

/// External fetch seam; the concrete implementation does the HTTP work
#[async_trait]
pub trait PreloadFetcher: Send + Sync {
    async fn fetch(&self, video: &PreloadableVideo) -> anyhow::Result<()>;
}

struct InFlightPreload {
    cancel_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns in-flight preload tasks, one per video id
///
/// A new preload for an id cancels the prior task for that id and waits
/// for it to wind down before the new fetch starts (last-request-wins,
/// never two fetches for the same id at once).
pub struct VideoPreloader {
    fetcher: Arc<dyn PreloadFetcher>,
    in_flight: Mutex<HashMap<String, InFlightPreload>>,
}

impl VideoPreloader {
    pub fn new(fetcher: Arc<dyn PreloadFetcher>) -> Self {
        Self {
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) a preload for a video
    ///
    /// `Immediate` priority awaits the fetch before returning; every
    /// other priority is fire-and-forget.
    #[instrument(skip(self, video), fields(video_id = %video.id))]
    pub async fn preload(&self, video: PreloadableVideo, priority: PreloadPriority) {
        self.cancel_preload(&video.id).await;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let fetcher = Arc::clone(&self.fetcher);
        let id = video.id.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {
                    debug!(video = %video.id, "preload cancelled");
                }
                result = fetcher.fetch(&video) => match result {
                    Ok(()) => debug!(video = %video.id, "preload complete"),
                    Err(error) => warn!(video = %video.id, %error, "preload failed"),
                },
            }
        });

        if priority == PreloadPriority::Immediate {
            let _ = handle.await;
        } else {
            self.in_flight
                .lock()
                .await
                .insert(id, InFlightPreload { cancel_tx, handle });
        }
    }

    /// Cancel the preload for an id and wait for it to stop
    ///
    /// Safe no-op when nothing is in flight for the id.
    pub async fn cancel_preload(&self, id: &str) {
        let entry = self.in_flight.lock().await.remove(id);
        if let Some(entry) = entry {
            let _ = entry.cancel_tx.send(());
            let _ = entry.handle.await;
        }
    }

    /// Cancel everything in flight; safe no-op when idle
    pub async fn cancel_all_preloads(&self) {
        let entries: Vec<_> = self.in_flight.lock().await.drain().collect();
        for (_, entry) in entries {
            let _ = entry.cancel_tx.send(());
            let _ = entry.handle.await;
        }
    }

    /// Number of tasks still running
    pub async fn in_flight_count(&self) -> usize {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.retain(|_, entry| !entry.handle.is_finished());
        in_flight.len()
    }
}
