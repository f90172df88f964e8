//! Decoded-frame cache
//!
//! Two retention modes:
//! - `Lazy` keeps a small window of the most recently decoded frames and
//!   decodes on every miss (read-through). Hits do not extend a frame's
//!   stay.

//! - `FullPreload` decodes every frame up front and never evicts.
//!
//! Reads and insert-on-miss only take the cache lock briefly; decoding
//! happens outside it so playback can keep reading cached frames while a
//! preload is running on another thread.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::decoder::{Frame, FrameDecoder};
use crate::errors::MediaError;

/// Frames retained in `Lazy` mode unless configured otherwise
pub const DEFAULT_LAZY_WINDOW: usize = 3;

/// Decoded canvases are stored as 8-bit RGBA
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheMode {
    Lazy = 0,
    FullPreload = 1,
}

impl CacheMode {
    fn from_u8(value: u8) -> Self {
        if value == CacheMode::FullPreload as u8 {
            CacheMode::FullPreload
        } else {
            CacheMode::Lazy
        }
    }
}

struct CacheEntry {
    frame: Arc<Frame>,
    /// Clock value when the frame was decoded
    produced: u64,
}

struct CacheState {
    mode: CacheMode,
    entries: HashMap<usize, CacheEntry>,
    /// Indices currently being decoded by some thread
    in_flight: HashSet<usize>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn lookup(&self, index: usize) -> Option<Arc<Frame>> {
        self.entries.get(&index).map(|entry| Arc::clone(&entry.frame))
    }

    /// Keeps an already resident frame (and its age) if another thread won
    /// the race to decode it.
    fn insert(&mut self, index: usize, frame: Arc<Frame>) -> Arc<Frame> {
        let tick = self.tick();
        let entry = self
            .entries
            .entry(index)
            .or_insert(CacheEntry { frame, produced: tick });
        Arc::clone(&entry.frame)
    }

    /// Drop the oldest decoded entries until at most `keep` remain.
    fn evict_to(&mut self, keep: usize) -> usize {
        if self.entries.len() <= keep {
            return 0;
        }

        let mut by_age: Vec<(u64, usize)> = self
            .entries
            .iter()
            .map(|(&index, entry)| (entry.produced, index))
            .collect();
        by_age.sort_unstable();

        let excess = by_age.len() - keep;
        for &(_, index) in &by_age[..excess] {
            self.entries.remove(&index);
        }
        excess
    }
}

/// Clears the in-flight marker for an index, even if the decoder panics.
struct InFlight<'a> {
    store: &'a FrameStore,
    index: usize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.store.state.lock();
        state.in_flight.remove(&self.index);
        self.store.decoded.notify_all();
    }
}

/// Bounded or unbounded map from frame index to decoded frame
pub struct FrameStore {
    frame_count: usize,
    frame_bytes: usize,
    window: usize,
    state: Mutex<CacheState>,
    decoded: Condvar,
    /// Most recently requested mode; checked by a running preload
    requested: AtomicU8,
    /// Serializes mode transitions
    transition: Mutex<()>,
}

impl FrameStore {
    /// Create an empty store in `Lazy` mode.
    ///
    /// `frame_bytes` is the estimated decoded size of one frame. A `window`
    /// of zero is raised to one.
    pub fn new(frame_count: usize, frame_bytes: usize, window: usize) -> Self {
        Self {
            frame_count,
            frame_bytes,
            window: window.max(1),
            state: Mutex::new(CacheState {
                mode: CacheMode::Lazy,
                entries: HashMap::new(),
                in_flight: HashSet::new(),
                clock: 0,
            }),
            decoded: Condvar::new(),
            requested: AtomicU8::new(CacheMode::Lazy as u8),
            transition: Mutex::new(()),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn estimated_frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Mode currently applied to the cache
    pub fn mode(&self) -> CacheMode {
        self.state.lock().mode
    }

    /// Mode most recently asked for, which may still be transitioning
    pub fn requested_mode(&self) -> CacheMode {
        CacheMode::from_u8(self.requested.load(Ordering::SeqCst))
    }

    pub fn cached_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_cached(&self, index: usize) -> bool {
        self.state.lock().entries.contains_key(&index)
    }

    /// Estimated bytes held by the resident frames
    pub fn memory_size(&self) -> usize {
        self.frame_bytes * self.cached_len()
    }

    /// Return frame `index`, decoding it on a miss.
    ///
    /// If another thread is already decoding the same index, waits for that
    /// result instead of decoding twice. Failures are not cached: the next
    /// request for the index tries again.
    pub fn get(
        &self,
        index: usize,
        data: &[u8],
        decoder: &dyn FrameDecoder,
    ) -> Result<Arc<Frame>, MediaError> {
        if index >= self.frame_count {
            return Err(MediaError::IndexOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }

        {
            let mut state = self.state.lock();
            loop {
                if let Some(frame) = state.lookup(index) {
                    return Ok(frame);
                }
                if !state.in_flight.contains(&index) {
                    break;
                }
                self.decoded.wait(&mut state);
            }
            state.in_flight.insert(index);
        }

        let _in_flight = InFlight { store: self, index };
        log::trace!("frame {} cache miss, decoding", index);

        let frame = match decoder.decode_frame(data, index) {
            Ok(frame) => Arc::new(frame),
            Err(err) => {
                log::warn!("frame {} failed to decode: {}", index, err);
                return Err(match err {
                    MediaError::FrameDecode { .. } => err,
                    other => MediaError::FrameDecode {
                        index,
                        reason: other.to_string(),
                    },
                });
            }
        };

        let mut state = self.state.lock();
        let frame = state.insert(index, frame);
        if state.mode == CacheMode::Lazy {
            let evicted = state.evict_to(self.window);
            if evicted > 0 {
                log::trace!("evicted {} frame(s), {} resident", evicted, state.entries.len());
            }
        }
        Ok(frame)
    }

    /// Switch retention mode.
    ///
    /// Switching to `FullPreload` decodes every missing frame on the calling
    /// thread, in index order, and only returns once all of them are
    /// resident. Do not call it from a latency-sensitive thread. Other
    /// threads may keep calling [`get`](Self::get) meanwhile.
    ///
    /// Switching to `Lazy` drops everything outside the window before
    /// returning.
    ///
    /// Transitions serialize and the latest request wins: a preload that
    /// sees a newer `Lazy` request stops before its next frame.
    pub fn set_mode(&self, mode: CacheMode, data: &[u8], decoder: &dyn FrameDecoder) {
        self.requested.store(mode as u8, Ordering::SeqCst);
        let _transition = self.transition.lock();

        // Superseded while waiting for the previous transition
        if self.requested_mode() != mode {
            log::debug!("skipping superseded switch to {:?}", mode);
            return;
        }

        match mode {
            CacheMode::Lazy => {
                let mut state = self.state.lock();
                state.mode = CacheMode::Lazy;
                let evicted = state.evict_to(self.window);
                log::debug!(
                    "switched to lazy cache, released {} frame(s), {} resident",
                    evicted,
                    state.entries.len()
                );
            }
            CacheMode::FullPreload => {
                self.state.lock().mode = CacheMode::FullPreload;
                self.preload(data, decoder);
            }
        }
    }

    fn preload(&self, data: &[u8], decoder: &dyn FrameDecoder) {
        let missing: Vec<usize> = {
            let state = self.state.lock();
            (0..self.frame_count)
                .filter(|index| !state.entries.contains_key(index))
                .collect()
        };
        log::debug!("preloading {} of {} frame(s)", missing.len(), self.frame_count);

        if missing.is_empty() || self.requested_mode() != CacheMode::FullPreload {
            return;
        }

        decoder.decode_frames(data, &missing, &mut |index, result| {
            match result {
                Ok(frame) => {
                    self.state.lock().insert(index, Arc::new(frame));
                }
                // A bad frame must not stop the rest from loading
                Err(err) => log::warn!("preload skipped frame {}: {}", index, err),
            }
            if self.requested_mode() != CacheMode::FullPreload {
                log::debug!("preload interrupted after frame {}", index);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });

        log::debug!(
            "preload finished, {} of {} frame(s) resident",
            self.cached_len(),
            self.frame_count
        );
    }
}
