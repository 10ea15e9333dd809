//! Recorded or imported audio placed on the timeline.

use crate::buffer::{self, SampleBuffer, SampleFormat};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One block of mono frames starting at frame `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveBuffer {
    pub x: u64,
    pub data: SampleBuffer,
}

impl WaveBuffer {
    pub fn end(&self) -> u64 {
        self.x + self.data.len() as u64
    }
}

#[derive(Debug)]
pub struct Wave {
    audio_channel: usize,
    samplerate: u32,
    buffer_size: usize,
    format: SampleFormat,
    buffers: ArcSwap<Vec<WaveBuffer>>,
}

impl Wave {
    pub fn new(audio_channel: usize, samplerate: u32, buffer_size: usize, format: SampleFormat) -> Self {
        Self {
            audio_channel,
            samplerate,
            buffer_size,
            format,
            buffers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn audio_channel(&self) -> usize {
        self.audio_channel
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn snapshot(&self) -> Arc<Vec<WaveBuffer>> {
        self.buffers.load_full()
    }

    /// Insert sorted by `x`, converting the data to the wave's format.
    /// A buffer already starting at `x` is replaced.
    pub fn add_buffer(&self, x: u64, data: SampleBuffer) {
        let data = convert(&data, self.format);
        self.buffers.rcu(|buffers| {
            let mut buffers = Vec::clone(buffers);
            let entry = WaveBuffer {
                x,
                data: data.clone(),
            };
            match buffers.binary_search_by_key(&x, |b| b.x) {
                Ok(i) => buffers[i] = entry,
                Err(i) => buffers.insert(i, entry),
            }
            buffers
        });
    }

    pub fn remove_buffer(&self, x: u64) -> bool {
        let mut removed = false;
        self.buffers.rcu(|buffers| {
            let mut buffers = Vec::clone(buffers);
            let before = buffers.len();
            buffers.retain(|b| b.x != x);
            removed = buffers.len() != before;
            buffers
        });
        removed
    }

    /// Buffer covering frame `x`.
    pub fn find_point(&self, x: u64) -> Option<WaveBuffer> {
        self.buffers
            .load()
            .iter()
            .find(|b| b.x <= x && x < b.end())
            .cloned()
    }

    /// Buffers overlapping `[x0, x1)`.
    pub fn find_region(&self, x0: u64, x1: u64) -> Vec<WaveBuffer> {
        self.buffers
            .load()
            .iter()
            .filter(|b| b.x < x1 && b.end() > x0)
            .cloned()
            .collect()
    }

    /// Mix `count` frames starting at timeline frame `x` into `dest` at
    /// `doffset`, stepping `dchannels` samples per frame. Gaps stay untouched.
    pub fn read(&self, x: u64, dest: &mut SampleBuffer, dchannels: usize, doffset: usize, count: usize) {
        let end = x + count as u64;
        for wave_buffer in self.buffers.load().iter() {
            if wave_buffer.x >= end || wave_buffer.end() <= x {
                continue;
            }
            let start = wave_buffer.x.max(x);
            let stop = wave_buffer.end().min(end);
            buffer::copy(
                dest,
                dchannels,
                doffset + ((start - x) as usize) * dchannels,
                &wave_buffer.data,
                1,
                (start - wave_buffer.x) as usize,
                (stop - start) as usize,
            );
        }
    }

    /// Resample every buffer; positions are scaled with the rate.
    pub fn set_samplerate(&mut self, samplerate: u32) {
        if samplerate == self.samplerate || samplerate == 0 {
            return;
        }
        let old = self.samplerate;
        let buffers = self
            .snapshot()
            .iter()
            .map(|b| WaveBuffer {
                x: b.x * samplerate as u64 / old as u64,
                data: buffer::resample(&b.data, 1, old, b.data.len(), samplerate),
            })
            .collect();
        self.buffers.store(Arc::new(buffers));
        self.samplerate = samplerate;
    }

    /// Buffers are resized to the new size, zero-filled or truncated.
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        let buffers = self
            .snapshot()
            .iter()
            .map(|b| {
                let mut data = b.data.clone();
                data.resize(buffer_size);
                WaveBuffer { x: b.x, data }
            })
            .collect();
        self.buffers.store(Arc::new(buffers));
        self.buffer_size = buffer_size;
    }

    pub fn set_format(&mut self, format: SampleFormat) {
        if format == self.format {
            return;
        }
        let buffers = self
            .snapshot()
            .iter()
            .map(|b| WaveBuffer {
                x: b.x,
                data: convert(&b.data, format),
            })
            .collect();
        self.buffers.store(Arc::new(buffers));
        self.format = format;
    }

    pub fn metadata(&self) -> WaveMetadata {
        let buffers = self.buffers.load();
        WaveMetadata {
            audio_channel: self.audio_channel,
            samplerate: self.samplerate,
            buffer_size: self.buffer_size,
            format: self.format,
            offsets: buffers.iter().map(|b| b.x).collect(),
        }
    }
}

fn convert(data: &SampleBuffer, format: SampleFormat) -> SampleBuffer {
    if data.format() == format {
        return data.clone();
    }
    let mut out = SampleBuffer::new(format, data.len());
    buffer::copy(&mut out, 1, 0, data, 1, 0, data.len());
    out
}

/// Persisted description of a wave. Sample data is stored externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveMetadata {
    pub audio_channel: usize,
    pub samplerate: u32,
    pub buffer_size: usize,
    pub format: SampleFormat,
    pub offsets: Vec<u64>,
}
