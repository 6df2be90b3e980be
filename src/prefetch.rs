//! Background slice decoding.
//!
//! Decodes run as independent futures with bounded concurrency and feed the
//! shared [`SliceCache`]. A focused request that completes after the viewer
//! has moved on to another slice is reported as stale rather than cancelled,
//! since the decoded slice is still worth caching.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use web_time::Instant;

use crate::cache::SliceCache;
use crate::slice::{Slice, SliceKey};

pub const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unknown slice {0}")]
    UnknownKey(SliceKey),

    #[error("Malformed slice {key}: {reason}")]
    Malformed { key: SliceKey, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Produces decoded slices; implemented by the DICOM adapter and by test
/// doubles.
pub trait SliceDecoder: Send + Sync {
    fn decode(&self, key: &SliceKey) -> BoxFuture<'_, Result<Slice, DecodeError>>;
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ready(Arc<Slice>),
    /// Another slice was requested while this one decoded. It was cached
    /// but should not be displayed.
    Stale(SliceKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefetchReport {
    pub requested: usize,
    pub decoded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct Prefetcher<D> {
    decoder: Arc<D>,
    cache: Arc<SliceCache>,
    concurrency: usize,
    focused: Mutex<Option<SliceKey>>,
    batch: Mutex<Option<AbortHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<D: SliceDecoder> Prefetcher<D> {
    /// `concurrency` is clamped to `1..=16`.
    pub fn new(decoder: Arc<D>, cache: Arc<SliceCache>, concurrency: usize) -> Self {
        Self {
            decoder,
            cache,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            focused: Mutex::new(None),
            batch: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<SliceCache> {
        &self.cache
    }

    pub fn decoder(&self) -> &Arc<D> {
        &self.decoder
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn load(&self, key: &SliceKey) -> Result<Arc<Slice>, DecodeError> {
        if let Some(slice) = self.cache.get(key) {
            return Ok(slice);
        }
        let slice = self.decoder.decode(key).await?;
        if slice.key() != key {
            return Err(DecodeError::Malformed {
                key: key.clone(),
                reason: format!("decoder returned slice {}", slice.key()),
            });
        }
        Ok(self.cache.insert(slice))
    }

    /// Decodes (or fetches from cache) the slice the viewer wants to show.
    pub async fn request(&self, key: SliceKey) -> Result<FetchOutcome, DecodeError> {
        *lock(&self.focused) = Some(key.clone());
        let slice = self.load(&key).await?;
        if lock(&self.focused).as_ref() == Some(&key) {
            Ok(FetchOutcome::Ready(slice))
        } else {
            log::debug!("Discarding stale decode of {key}");
            Ok(FetchOutcome::Stale(key))
        }
    }

    /// Decodes every uncached key, at most `concurrency` at a time. Starting
    /// a batch aborts the previous one.
    pub async fn prefetch(&self, keys: Vec<SliceKey>) -> PrefetchReport {
        let started = Instant::now();
        let pending: Vec<SliceKey> = keys
            .into_iter()
            .filter(|key| !self.cache.contains(key))
            .collect();
        let mut report = PrefetchReport {
            requested: pending.len(),
            ..PrefetchReport::default()
        };
        if pending.is_empty() {
            return report;
        }

        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = lock(&self.batch).replace(handle) {
            previous.abort();
        }

        let decoded = &mut report.decoded;
        let failed = &mut report.failed;
        let work = stream::iter(pending)
            .map(|key| async move {
                let result = self.load(&key).await;
                (key, result)
            })
            .buffer_unordered(self.concurrency)
            .for_each(|(key, result)| {
                match result {
                    Ok(_) => *decoded += 1,
                    Err(err) => {
                        log::warn!("Failed to decode {key}: {err}");
                        *failed += 1;
                    }
                }
                futures::future::ready(())
            });
        report.cancelled = Abortable::new(work, registration).await.is_err();

        log::info!(
            "Prefetched {}/{} slices ({} failed{}) in {:?}",
            report.decoded,
            report.requested,
            report.failed,
            if report.cancelled { ", cancelled" } else { "" },
            started.elapsed()
        );
        report
    }

    /// Aborts the running prefetch batch. Decodes already cached stay cached.
    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.batch).take() {
            handle.abort();
        }
    }
}

/// Keys within `radius` of `center`, nearest first.
pub fn prefetch_window(keys: &[SliceKey], center: usize, radius: usize) -> Vec<SliceKey> {
    let mut window = Vec::new();
    if center < keys.len() {
        window.push(keys[center].clone());
    }
    for distance in 1..=radius {
        if let Some(after) = center.checked_add(distance).and_then(|i| keys.get(i)) {
            window.push(after.clone());
        }
        if let Some(before) = center.checked_sub(distance).and_then(|i| keys.get(i)) {
            window.push(before.clone());
        }
    }
    window
}
