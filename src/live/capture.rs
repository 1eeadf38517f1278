//! Microphone capture and outbound frame encoding
//!
//! Taps the default input device, folds the stream into fixed 4096-sample
//! mono blocks at 16kHz, and ships each block to the transport as base64
//! PCM16 tagged `audio/pcm;rate=16000`. One block also drives the capture
//! side of the visualizer: mean-absolute volume above the threshold excites
//! the bars, anything quieter leaves them untouched.
//!
//! Sends are fire-and-forget at block cadence for the whole session; there
//! is no acknowledgement, no backpressure and no retry. Block processing
//! waits for the transport to report open and stops when the session's
//! cancel token fires.

use crate::live::pcm;
use crate::live::transport::MediaChunk;
use crate::live::visualizer::VisualizerFeed;
use crate::live::{CAPTURE_MIME, VOLUME_THRESHOLD};

/// Accumulates arbitrary-length sample runs into fixed-size blocks
pub struct BlockBuffer {
    block: Vec<f32>,
    size: usize,
}

impl BlockBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            block: Vec::with_capacity(size),
            size,
        }
    }

    /// Feed samples in; `on_block` fires once per completed block
    pub fn push(&mut self, samples: &[f32], mut on_block: impl FnMut(&[f32])) {
        for &sample in samples {
            self.block.push(sample);
            if self.block.len() == self.size {
                on_block(&self.block);
                self.block.clear();
            }
        }
    }

    /// Samples waiting for the block to fill
    pub fn pending(&self) -> usize {
        self.block.len()
    }
}

/// Average interleaved frames down to one channel
pub fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling (good enough for speech input)
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx_floor = src_idx.floor() as usize;
        let idx_ceil = (idx_floor + 1).min(samples.len() - 1);
        let frac = (src_idx - idx_floor as f64) as f32;

        let value = samples[idx_floor] * (1.0 - frac) + samples[idx_ceil] * frac;
        resampled.push(value);
    }

    resampled
}

/// Encode one complete block for transport and report its volume metric
pub fn encode_block(block: &[f32], visualizer: &VisualizerFeed) -> MediaChunk {
    let volume = pcm::mean_abs(block);
    if volume > VOLUME_THRESHOLD {
        visualizer.excite_capture();
    }
    MediaChunk {
        mime_type: CAPTURE_MIME.to_string(),
        data: pcm::to_base64(&pcm::encode_pcm16(block)),
    }
}

#[cfg(feature = "voice")]
pub use device::{list_input_devices, CaptureConfig, CaptureEncoder};

#[cfg(feature = "voice")]
mod device {
    use super::*;
    use crate::live::transport::LiveInput;
    use crate::live::{CancelToken, CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE};
    use anyhow::{bail, Context, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{error, info};

    /// Capture stream configuration
    #[derive(Debug, Clone)]
    pub struct CaptureConfig {
        /// Target sample rate for the wire format
        pub sample_rate: u32,
        /// Samples per outbound block
        pub block_size: usize,
    }

    impl Default for CaptureConfig {
        fn default() -> Self {
            Self {
                sample_rate: INPUT_SAMPLE_RATE,
                block_size: CAPTURE_BLOCK_SIZE,
            }
        }
    }

    /// Microphone handle. `open` probes the device up front so a missing or
    /// unusable microphone fails before any connection is attempted; `start`
    /// moves the stream onto a dedicated thread (cpal streams are not Send).
    pub struct CaptureEncoder {
        device: Option<cpal::Device>,
        device_rate: u32,
        device_channels: u16,
        sample_format: cpal::SampleFormat,
        config: CaptureConfig,
        worker: Option<std::thread::JoinHandle<()>>,
    }

    impl CaptureEncoder {
        /// Acquire the default input device or fail fast
        pub fn open(config: CaptureConfig) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .context("no input device available (microphone not found)")?;
            let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

            let default_config = device
                .default_input_config()
                .context("failed to read input device configuration")?;
            let sample_format = default_config.sample_format();
            if !matches!(
                sample_format,
                cpal::SampleFormat::F32 | cpal::SampleFormat::I16
            ) {
                bail!("unsupported input sample format: {sample_format:?}");
            }

            let device_rate = default_config.sample_rate().0;
            let device_channels = default_config.channels();
            info!(
                "using input device: {} ({}Hz, {} channels, {:?})",
                device_name, device_rate, device_channels, sample_format
            );

            Ok(Self {
                device: Some(device),
                device_rate,
                device_channels,
                sample_format,
                config,
                worker: None,
            })
        }

        /// Start capturing. Blocks are encoded and sent only once
        /// `transport_open` flips true, and never after `cancel` fires.
        /// `on_fatal` reports a stream that could not be built.
        pub fn start(
            &mut self,
            input: LiveInput,
            visualizer: VisualizerFeed,
            transport_open: Arc<AtomicBool>,
            cancel: CancelToken,
            on_fatal: impl Fn(String) + Send + 'static,
        ) -> Result<()> {
            if self.worker.is_some() {
                bail!("capture already running");
            }

            let device = self.device.take().context("capture already started")?;
            let device_rate = self.device_rate;
            let device_channels = self.device_channels;
            let sample_format = self.sample_format;
            let target_rate = self.config.sample_rate;
            let block_size = self.config.block_size;

            let stream_config = cpal::StreamConfig {
                channels: device_channels,
                sample_rate: cpal::SampleRate(device_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let worker = std::thread::Builder::new()
                .name("woosh-capture".to_string())
                .spawn(move || {
                    let mut blocks = BlockBuffer::new(block_size);
                    let worker_cancel = cancel.clone();

                    let mut handle_samples = move |data: &[f32]| {
                        if worker_cancel.is_cancelled() || !transport_open.load(Ordering::SeqCst) {
                            return;
                        }
                        let mono = downmix_mono(data, device_channels);
                        let samples = resample_linear(&mono, device_rate, target_rate);
                        blocks.push(&samples, |block| {
                            let chunk = encode_block(block, &visualizer);
                            input.send_realtime_input(chunk);
                        });
                    };

                    let err_fn = |e| error!("audio input error: {e}");
                    let built = match sample_format {
                        cpal::SampleFormat::F32 => device.build_input_stream(
                            &stream_config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| handle_samples(data),
                            err_fn,
                            None,
                        ),
                        cpal::SampleFormat::I16 => device.build_input_stream(
                            &stream_config,
                            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                                let samples: Vec<f32> = data
                                    .iter()
                                    .map(|&s| (s as f32 / i16::MAX as f32).clamp(-1.0, 1.0))
                                    .collect();
                                handle_samples(&samples);
                            },
                            err_fn,
                            None,
                        ),
                        format => {
                            on_fatal(format!("unsupported sample format: {format:?}"));
                            return;
                        }
                    };

                    let stream = match built {
                        Ok(stream) => stream,
                        Err(e) => {
                            on_fatal(format!("failed to open capture stream: {e}"));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        on_fatal(format!("failed to start capture stream: {e}"));
                        return;
                    }
                    info!("microphone capture started");

                    while !cancel.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    drop(stream);
                    info!("microphone capture stopped");
                })
                .context("failed to spawn capture thread")?;

            self.worker = Some(worker);
            Ok(())
        }

        /// Join the capture thread after the session's cancel token fired
        pub fn stop(&mut self) {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// List available audio input devices
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();
        for device in host.input_devices()? {
            if let Ok(name) = device.name() {
                devices.push(name);
            }
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::CAPTURE_BLOCK_SIZE;

    #[test]
    fn test_block_buffer_emits_fixed_blocks() {
        let mut buffer = BlockBuffer::new(4);
        let mut blocks: Vec<Vec<f32>> = Vec::new();

        buffer.push(&[0.1, 0.2, 0.3], |b| blocks.push(b.to_vec()));
        assert!(blocks.is_empty());
        assert_eq!(buffer.pending(), 3);

        buffer.push(&[0.4, 0.5], |b| blocks.push(b.to_vec()));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buffer.pending(), 1);
    }

    #[test]
    fn test_block_buffer_handles_long_runs() {
        let mut buffer = BlockBuffer::new(4);
        let mut count = 0;
        buffer.push(&vec![0.0; 10], |_| count += 1);
        assert_eq!(count, 2);
        assert_eq!(buffer.pending(), 2);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);

        let mono = [0.1, 0.2];
        assert_eq!(downmix_mono(&mono, 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_identity() {
        let samples = [0.0, 0.5, -0.5, 0.25];
        assert_eq!(resample_linear(&samples, 16000, 16000), samples.to_vec());
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let resampled = resample_linear(&samples, 48000, 24000);
        assert_eq!(resampled.len(), 50);
        // Endpoints stay within the original range
        assert!(resampled.iter().all(|&s| (0.0..1.0).contains(&s)));
    }

    #[test]
    fn test_silent_block_leaves_visualizer_idle() {
        let visualizer = VisualizerFeed::new();
        let block = vec![0.0f32; CAPTURE_BLOCK_SIZE];

        let chunk = encode_block(&block, &visualizer);
        assert!(visualizer.is_idle());
        assert_eq!(chunk.mime_type, CAPTURE_MIME);
        assert!(chunk.data.starts_with("AAAA"));
    }

    #[test]
    fn test_loud_block_excites_visualizer() {
        let visualizer = VisualizerFeed::new();
        let block = vec![0.5f32; CAPTURE_BLOCK_SIZE];

        encode_block(&block, &visualizer);
        assert!(!visualizer.is_idle());
    }
}
