//! Live microphone source (cpal).
//!
//! The cpal stream is not `Send` on every platform, so it lives on a
//! dedicated capture thread. The input callback mixes every frame down to
//! mono and appends it to a shared ring buffer; `read_frame` analyses the
//! most recent `fft_size` samples.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use super::{AcquisitionError, AcquisitionSource, ByteFrequencyAnalyser};
use crate::config::AcquisitionConfig;

type SampleBuffer = Arc<Mutex<VecDeque<f32>>>;

/// Default input device feeding a byte-frequency analyser.
pub struct MicrophoneSource {
    analyser: ByteFrequencyAnalyser,
    buffer: SampleBuffer,
    block: Vec<f32>,
    stop_tx: Option<mpsc::Sender<()>>,
    capture_thread: Option<JoinHandle<()>>,
    device_name: String,
    ready: bool,
    released: bool,
}

impl MicrophoneSource {
    pub fn new(config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        let analyser = ByteFrequencyAnalyser::new(config)?;
        let block = vec![0.0; analyser.fft_size()];
        Ok(Self {
            analyser,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(block.len() * 4))),
            block,
            stop_tx: None,
            capture_thread: None,
            device_name: "unknown".to_string(),
            ready: false,
            released: false,
        })
    }
}

#[async_trait]
impl AcquisitionSource for MicrophoneSource {
    async fn ready(&mut self) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        if self.ready {
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let buffer = Arc::clone(&self.buffer);
        let capacity = self.block.len() * 4;

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(buffer, capacity, ready_tx, stop_rx))?;

        let device_name = ready_rx
            .await
            .map_err(|_| AcquisitionError::Unavailable("capture thread exited during startup".to_string()))??;

        tracing::info!(device = %device_name, "Microphone ready");
        self.device_name = device_name;
        self.stop_tx = Some(stop_tx);
        self.capture_thread = Some(handle);
        self.ready = true;
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn read_frame(&mut self, frame: &mut [u8]) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        if !self.ready {
            return Err(AcquisitionError::NotReady);
        }

        {
            let buffer = self
                .buffer
                .lock()
                .map_err(|_| AcquisitionError::Unavailable("capture buffer poisoned".to_string()))?;
            let available = buffer.len().min(self.block.len());
            let pad = self.block.len() - available;
            self.block[..pad].iter_mut().for_each(|s| *s = 0.0);
            for (slot, sample) in self.block[pad..]
                .iter_mut()
                .zip(buffer.iter().skip(buffer.len() - available))
            {
                *slot = *sample;
            }
        }

        self.analyser.analyse(&self.block, frame)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // Dropping the sender wakes the capture thread, which drops the stream.
        self.stop_tx.take();
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Microphone capture thread panicked during release");
            }
        }
        tracing::info!(device = %self.device_name, "Microphone released");
    }

    fn source_name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the cpal stream until `stop_rx` fires or its sender is dropped.
fn capture_thread(
    buffer: SampleBuffer,
    capacity: usize,
    ready_tx: oneshot::Sender<Result<String, AcquisitionError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match open_stream(buffer, capacity) {
        Ok((stream, name)) => {
            let _ = ready_tx.send(Ok(name));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Blocks until release() drops the sender.
    let _ = stop_rx.recv();
    drop(stream);
}

fn open_stream(buffer: SampleBuffer, capacity: usize) -> Result<(cpal::Stream, String), AcquisitionError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(AcquisitionError::DeviceMissing)?;
    let name = device.name().unwrap_or_else(|_| "default input".to_string());

    let supported = device
        .default_input_config()
        .map_err(|e| AcquisitionError::Unavailable(format!("no input config: {e}")))?;
    let channels = usize::from(supported.channels()).max(1);
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, buffer, capacity),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, buffer, capacity),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, buffer, capacity),
        other => Err(AcquisitionError::Unavailable(format!("unsupported sample format {other:?}"))),
    }?;

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::DeviceNotAvailable => AcquisitionError::DeviceMissing,
        other => AcquisitionError::Unavailable(other.to_string()),
    })?;

    Ok((stream, name))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    buffer: SampleBuffer,
    capacity: usize,
) -> Result<cpal::Stream, AcquisitionError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let Ok(mut buf) = buffer.lock() else {
                    return;
                };
                for chunk in data.chunks(channels) {
                    let sum: f32 = chunk.iter().map(|&s| cpal::Sample::from_sample(s)).sum::<f32>();
                    buf.push_back(sum / chunk.len() as f32);
                }
                let excess = buf.len().saturating_sub(capacity);
                buf.drain(..excess);
            },
            |err| tracing::error!(error = %err, "Microphone stream error"),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AcquisitionError::DeviceMissing,
            other => AcquisitionError::PermissionDenied(other.to_string()),
        })
}
