// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    cell::UnsafeCell,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::thread_priority::{
    configure_render_thread_priority, render_thread_priority, rt_audio_enabled,
};
use super::{AudioHost, AudioMixer, HostError, ScheduledVoice};
use crate::config;

/// Lock-free single-producer single-consumer ring of interleaved samples.
struct CircularBuffer {
    /// Backing buffer
    buffer: UnsafeCell<Vec<f32>>,
    /// Capacity (must be power of 2)
    capacity: usize,
    /// Read position (consumer)
    read_pos: AtomicUsize,
    /// Write position (producer)
    write_pos: AtomicUsize,
}

// The producer only touches [write_pos, read_pos) and the consumer only
// touches [read_pos, write_pos); positions are published with Release/Acquire.
unsafe impl Sync for CircularBuffer {}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        // Round up to next power of 2 for efficient modulo
        let cap = capacity.next_power_of_two();
        Self {
            buffer: UnsafeCell::new(vec![0.0; cap]),
            capacity: cap,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Get number of samples available to read
    #[inline]
    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        (write + self.capacity - read) & (self.capacity - 1)
    }

    /// Get space available to write
    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Returns number of samples actually written
    fn write(&self, samples: &[f32]) -> usize {
        let to_write = self.space().min(samples.len());
        if to_write == 0 {
            return 0;
        }
        let write = self.write_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        let first_chunk = (self.capacity - write).min(to_write);
        // SAFETY: only the producer writes, and only into free space.
        unsafe {
            let base = (*self.buffer.get()).as_mut_ptr();
            std::ptr::copy_nonoverlapping(samples.as_ptr(), base.add(write), first_chunk);
            if to_write > first_chunk {
                std::ptr::copy_nonoverlapping(
                    samples.as_ptr().add(first_chunk),
                    base,
                    to_write - first_chunk,
                );
            }
        }

        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Returns number of samples actually read
    fn read(&self, output: &mut [f32]) -> usize {
        let to_read = self.available().min(output.len());
        if to_read == 0 {
            return 0;
        }
        let read = self.read_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        let first_chunk = (self.capacity - read).min(to_read);
        // SAFETY: only the consumer reads, and only published samples.
        unsafe {
            let base = (*self.buffer.get()).as_ptr();
            std::ptr::copy_nonoverlapping(base.add(read), output.as_mut_ptr(), first_chunk);
            if to_read > first_chunk {
                std::ptr::copy_nonoverlapping(
                    base,
                    output.as_mut_ptr().add(first_chunk),
                    to_read - first_chunk,
                );
            }
        }

        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

/// An output device as seen by `vibeshift devices`.
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
    pub default_sample_rate: Option<u32>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) ({})", self.name, self.max_channels, self.host)?;
        if let Some(rate) = self.default_sample_rate {
            write!(f, " @ {}Hz", rate)?;
        }
        Ok(())
    }
}

/// Lists cpal output devices across all available hosts.
pub fn list_devices() -> Result<Vec<DeviceInfo>, HostError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            if max_channels == 0 {
                continue;
            }

            devices.push(DeviceInfo {
                name: device.name()?,
                host: host_id.name().to_string(),
                max_channels,
                default_sample_rate: device
                    .default_output_config()
                    .ok()
                    .map(|config| config.sample_rate().0),
            });
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

/// Plays scheduled voices through a cpal output stream.
pub struct CpalHost {
    name: String,
    host_id: cpal::HostId,
    mixer: AudioMixer,
    running: Arc<AtomicBool>,
    producer_thread: Option<thread::JoinHandle<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl CpalHost {
    /// Opens the configured device (or the default output) and starts rendering.
    pub fn get(config: &config::Audio) -> Result<CpalHost, HostError> {
        let (device, host_id) = find_device(config.device())?;
        let name = device.name()?;

        let max_channels = device
            .supported_output_configs()?
            .map(|c| c.channels())
            .max()
            .unwrap_or(0);
        let num_channels = config.channels().min(max_channels.max(1));
        let sample_format = device.default_output_config()?.sample_format();
        let sample_rate = config.sample_rate();

        let mut host = CpalHost {
            name,
            host_id,
            mixer: AudioMixer::new(num_channels, sample_rate),
            running: Arc::new(AtomicBool::new(true)),
            producer_thread: None,
            output_thread: None,
        };
        host.start(device, sample_format, config.buffer_size())?;
        Ok(host)
    }

    fn start(
        &mut self,
        device: cpal::Device,
        sample_format: cpal::SampleFormat,
        block_frames: usize,
    ) -> Result<(), HostError> {
        let num_channels = self.mixer.num_channels();
        let sample_rate = self.mixer.sample_rate();

        // Small ring (~20ms) so scheduled start times stay close to the clock.
        let capacity_samples = (sample_rate as usize * num_channels as usize) / 50;
        let block_samples = block_frames * num_channels as usize;
        let ring = Arc::new(CircularBuffer::new(
            capacity_samples.max(block_samples * 2 + 1),
        ));

        // Producer thread: mix audio and write to ring buffer.
        let mixer = self.mixer.clone();
        let ring_for_producer = ring.clone();
        let running = self.running.clone();
        let priority = render_thread_priority();
        let rt_audio = rt_audio_enabled();
        let producer_thread = thread::Builder::new()
            .name("vibeshift-render".to_string())
            .spawn(move || {
                configure_render_thread_priority(priority, rt_audio);
                let mut scratch = vec![0.0f32; block_samples];

                while running.load(Ordering::Relaxed) {
                    if ring_for_producer.space() >= block_samples {
                        mixer.process_into_output(&mut scratch, block_frames);
                        ring_for_producer.write(&scratch);
                    } else {
                        // Ring full, yield briefly
                        thread::sleep(Duration::from_micros(500));
                    }
                }
            })?;
        self.producer_thread = Some(producer_thread);

        // The stream is not Send, so it is created and kept on its own thread.
        let running = self.running.clone();
        let output_thread = thread::Builder::new()
            .name("vibeshift-output".to_string())
            .spawn(move || {
                let config = cpal::StreamConfig {
                    channels: num_channels,
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };
                let on_error = |err| error!("CPAL output stream error: {}", err);

                let stream_result = match sample_format {
                    cpal::SampleFormat::F32 => {
                        let mut callback = create_f32_callback(ring);
                        device.build_output_stream(
                            &config,
                            move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
                                callback(data, info)
                            },
                            on_error,
                            None,
                        )
                    }
                    cpal::SampleFormat::I16 => {
                        let mut callback = create_converting_callback::<i16>(ring);
                        device.build_output_stream(
                            &config,
                            move |data: &mut [i16], info: &cpal::OutputCallbackInfo| {
                                callback(data, info)
                            },
                            on_error,
                            None,
                        )
                    }
                    cpal::SampleFormat::I32 => {
                        let mut callback = create_converting_callback::<i32>(ring);
                        device.build_output_stream(
                            &config,
                            move |data: &mut [i32], info: &cpal::OutputCallbackInfo| {
                                callback(data, info)
                            },
                            on_error,
                            None,
                        )
                    }
                    other => {
                        error!(format = ?other, "Unsupported output sample format");
                        return;
                    }
                };

                match stream_result {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            error!("Failed to start CPAL stream: {}", e);
                            return;
                        }
                        info!(sample_rate, channels = num_channels, "CPAL output stream started");

                        while running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(50));
                        }
                    }
                    Err(e) => {
                        error!("Failed to create CPAL stream: {}", e);
                    }
                }
            })?;

        self.output_thread = Some(output_thread);
        Ok(())
    }
}

fn find_device(name: Option<&str>) -> Result<(cpal::Device, cpal::HostId), HostError> {
    match name {
        None | Some("default") => {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(HostError::NoDefaultDevice)?;
            Ok((device, host.id()))
        }
        Some(name) => {
            // Suppress noisy output here.
            let _shh_stdout = shh::stdout()?;
            let _shh_stderr = shh::stderr()?;

            for host_id in cpal::available_hosts() {
                let Ok(devices) = cpal::host_from_id(host_id)?.devices() else {
                    continue;
                };
                for device in devices {
                    if device.name().is_ok_and(|n| n.trim() == name) {
                        return Ok((device, host_id));
                    }
                }
            }
            Err(HostError::NoDevice(name.to_string()))
        }
    }
}

/// f32 callback: read directly into the cpal buffer.
fn create_f32_callback(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let read = ring.read(data);
        // Zero-fill any shortfall
        data[read..].fill(0.0);
    }
}

/// Integer callback: read from ring and convert
fn create_converting_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut temp: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        temp.resize(data.len(), 0.0);
        let read = ring.read(&mut temp);
        temp[read..].fill(0.0);

        for (dst, &src) in data.iter_mut().zip(temp.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl fmt::Display for CpalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.mixer.num_channels(),
            self.host_id.name()
        )
    }
}

impl AudioHost for CpalHost {
    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn num_channels(&self) -> u16 {
        self.mixer.num_channels()
    }

    fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    /// The pitch processor is compiled in, so it is always available while
    /// the output is running.
    fn load_processor(&self) -> Result<(), HostError> {
        if self.running.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(HostError::Closed)
        }
    }

    fn schedule(&self, voice: ScheduledVoice) -> Result<(), HostError> {
        let span = span!(Level::DEBUG, "schedule (cpal)");
        let _enter = span.enter();
        self.mixer.schedule(voice)
    }

    fn stop_all(&self) {
        self.mixer.cancel_all();
    }
}

impl Drop for CpalHost {
    fn drop(&mut self) {
        self.mixer.cancel_all();
        self.running.store(false, Ordering::Relaxed);

        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}
