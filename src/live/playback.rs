//! Inbound audio decode and gapless playback scheduling
//!
//! Synthesized speech arrives as base64 PCM16 frames at 24kHz, in pieces
//! much shorter than the sentences they form. The scheduler lines them up
//! on a single monotonic clock so consecutive buffers play back-to-back
//! with no overlap, and a buffer arriving after a gap starts immediately
//! instead of at a stale time.
//!
//! Scheduling rule: each buffer starts at `max(next_start, now)`, then
//! `next_start` advances by the buffer's duration. The scalar is owned by
//! the scheduler and mutated nowhere else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::live::visualizer::VisualizerFeed;
use crate::live::{pcm, CancelToken, OUTPUT_SAMPLE_RATE};

/// Destination for decoded audio. Production uses a rodio sink on a
/// dedicated playback thread; tests substitute a recording sink.
pub trait OutputSink: Send + Sync {
    /// Queue samples for immediate playback
    fn play(&self, samples: Vec<f32>, sample_rate: u32);
    /// Stop everything and release the audio device
    fn shutdown(&self);
}

/// The single monotonic next-start scalar
#[derive(Debug, Default)]
pub struct PlaybackClock {
    next_start: Option<f64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a start time for a buffer of `duration` seconds arriving at
    /// clock time `now`, and advance the scalar past it.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = match self.next_start {
            Some(next) => next.max(now),
            None => now,
        };
        self.next_start = Some(start + duration);
        start
    }

    /// Earliest time the next buffer may start (None before first use)
    pub fn next_start(&self) -> Option<f64> {
        self.next_start
    }
}

/// Schedules inbound frames onto the output sink and tracks in-flight
/// sources for teardown.
pub struct PlaybackScheduler {
    sink: Arc<dyn OutputSink>,
    epoch: Instant,
    clock: Mutex<PlaybackClock>,
    sources: Arc<Mutex<HashMap<u64, AbortHandle>>>,
    next_source_id: AtomicU64,
    visualizer: VisualizerFeed,
    cancel: CancelToken,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn OutputSink>, visualizer: VisualizerFeed, cancel: CancelToken) -> Self {
        Self {
            sink,
            epoch: Instant::now(),
            clock: Mutex::new(PlaybackClock::new()),
            sources: Arc::new(Mutex::new(HashMap::new())),
            next_source_id: AtomicU64::new(0),
            visualizer,
            cancel,
        }
    }

    /// Entry point for one inbound frame of base64 PCM16 at 24kHz.
    ///
    /// Decodes, reserves a start time on the clock, and spawns the playback
    /// task. The task removes itself from the active set exactly once, at
    /// natural completion, and resets the visualizer to idle.
    pub fn handle_frame(&self, base64_data: &str) {
        if self.cancel.is_cancelled() {
            return;
        }

        let bytes = match pcm::from_base64(base64_data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("dropping undecodable audio frame: {e}");
                return;
            }
        };
        let samples = pcm::decode_pcm16(&bytes);
        if samples.is_empty() {
            return;
        }

        self.visualizer.excite_playback();

        let duration = samples.len() as f64 / OUTPUT_SAMPLE_RATE as f64;
        let now = self.epoch.elapsed().as_secs_f64();
        let start = self
            .clock
            .lock()
            .map(|mut clock| clock.schedule(now, duration))
            .unwrap_or(now);
        debug!(
            "scheduling {} samples ({duration:.3}s) at t={start:.3}",
            samples.len()
        );

        let id = self.next_source_id.fetch_add(1, Ordering::SeqCst);
        let sink = self.sink.clone();
        let sources = self.sources.clone();
        let visualizer = self.visualizer.clone();
        let cancel = self.cancel.clone();
        let start_at = self.epoch + Duration::from_secs_f64(start);

        // Hold the set lock across spawn so the task cannot observe the map
        // before its own entry is registered.
        let mut active = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(start_at).await;
            if cancel.is_cancelled() {
                return;
            }
            sink.play(samples, OUTPUT_SAMPLE_RATE);
            tokio::time::sleep(Duration::from_secs_f64(duration)).await;
            if cancel.is_cancelled() {
                return;
            }
            if let Ok(mut active) = sources.lock() {
                active.remove(&id);
            }
            visualizer.reset();
        });
        active.insert(id, task.abort_handle());
    }

    /// Number of buffers scheduled or playing
    pub fn active_sources(&self) -> usize {
        self.sources.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Earliest time the next buffer may start, in seconds since the
    /// scheduler was created (None before the first frame).
    pub fn next_start(&self) -> Option<f64> {
        self.clock.lock().ok().and_then(|clock| clock.next_start())
    }

    /// Teardown: forcibly stop every outstanding source and shut the sink
    /// down. Safe to call more than once.
    pub fn stop_all(&self) {
        let drained: Vec<AbortHandle> = match self.sources.lock() {
            Ok(mut active) => active.drain().map(|(_, handle)| handle).collect(),
            Err(_) => Vec::new(),
        };
        for handle in &drained {
            handle.abort();
        }
        if !drained.is_empty() {
            debug!("stopped {} in-flight playback sources", drained.len());
        }
        self.sink.shutdown();
    }
}

// ─── Rodio output sink ───────────────────────────────────────

#[cfg(feature = "voice")]
pub use rodio_sink::RodioSink;

#[cfg(feature = "voice")]
mod rodio_sink {
    use super::OutputSink;
    use anyhow::{bail, Context, Result};
    use std::sync::mpsc;
    use tracing::{error, info};

    enum SinkCommand {
        Play(Vec<f32>, u32),
        Shutdown,
    }

    /// Speaker output on a dedicated thread. The rodio stream handle is not
    /// Send, so the thread owns it and takes commands over a channel.
    pub struct RodioSink {
        tx: mpsc::Sender<SinkCommand>,
    }

    impl RodioSink {
        pub fn spawn() -> Result<Self> {
            let (tx, rx) = mpsc::channel();
            let (ready_tx, ready_rx) = mpsc::channel();

            std::thread::Builder::new()
                .name("woosh-playback".to_string())
                .spawn(move || {
                    let (stream, handle) = match rodio::OutputStream::try_default() {
                        Ok(ok) => ok,
                        Err(e) => {
                            let _ = ready_tx.send(Err(format!("no output device: {e}")));
                            return;
                        }
                    };
                    let sink = match rodio::Sink::try_new(&handle) {
                        Ok(sink) => sink,
                        Err(e) => {
                            let _ = ready_tx.send(Err(format!("audio sink failed: {e}")));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    info!("playback thread ready");

                    while let Ok(command) = rx.recv() {
                        match command {
                            SinkCommand::Play(samples, sample_rate) => {
                                sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, samples));
                            }
                            SinkCommand::Shutdown => {
                                sink.stop();
                                break;
                            }
                        }
                    }
                    drop(stream);
                    info!("playback thread stopped");
                })
                .context("failed to spawn playback thread")?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self { tx }),
                Ok(Err(e)) => bail!(e),
                Err(_) => bail!("playback thread exited during setup"),
            }
        }
    }

    impl OutputSink for RodioSink {
        fn play(&self, samples: Vec<f32>, sample_rate: u32) {
            if self.tx.send(SinkCommand::Play(samples, sample_rate)).is_err() {
                error!("playback thread gone, dropping buffer");
            }
        }

        fn shutdown(&self) {
            let _ = self.tx.send(SinkCommand::Shutdown);
        }
    }

    /// List available audio output devices
    pub fn list_output_devices() -> Result<Vec<String>> {
        use cpal::traits::{DeviceTrait, HostTrait};

        let host = cpal::default_host();
        let mut devices = Vec::new();
        for device in host.output_devices()? {
            if let Ok(name) = device.name() {
                devices.push(name);
            }
        }
        Ok(devices)
    }
}

#[cfg(feature = "voice")]
pub use rodio_sink::list_output_devices;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_initializes_lazily() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.next_start(), None);

        let start = clock.schedule(3.5, 1.0);
        assert_eq!(start, 3.5);
        assert_eq!(clock.next_start(), Some(4.5));
    }

    #[test]
    fn test_back_to_back_buffers_never_overlap() {
        let mut clock = PlaybackClock::new();
        let durations = [0.25, 0.5, 0.125, 1.0];

        // All frames arrive at once (now stays 0); starts must chain
        let mut expected = 0.0;
        for &duration in &durations {
            let start = clock.schedule(0.0, duration);
            assert!((start - expected).abs() < 1e-9);
            expected += duration;
        }
    }

    #[test]
    fn test_gap_snaps_to_current_time() {
        let mut clock = PlaybackClock::new();
        clock.schedule(0.0, 0.5); // next_start = 0.5

        // The clock ran past the scheduled horizon; no stale start times
        let start = clock.schedule(2.0, 0.25);
        assert_eq!(start, 2.0);
        assert_eq!(clock.next_start(), Some(2.25));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut clock = PlaybackClock::new();
        let mut last = f64::MIN;
        for (now, duration) in [(0.0, 0.3), (0.1, 0.2), (5.0, 0.1), (4.0, 0.4)] {
            let start = clock.schedule(now, duration);
            assert!(start >= last);
            last = start;
        }
    }
}
