//! Streaming framer
//!
//! Wire layout of a streamed response:
//! 1. one 44-byte WAV header with unknown-length sentinels
//! 2. fixed-duration 16-bit PCM chunks (the last may be shorter)
//! 3. a trailing marker: `<!--JOB_ID:<uuid>-->` on success, or
//!    `<!--ERROR:generation failed-->` if generation failed mid-stream
//!
//! Clients stop decoding at end of stream or ignore trailing bytes, so the
//! marker is never played as audio.

use voicegate_core::JobId;

use crate::wav::{pcm16_bytes, streaming_header};

/// Marker sent instead of a job id when generation fails mid-stream
pub const ERROR_MARKER: &[u8] = b"<!--ERROR:generation failed-->";

/// Splits a growing waveform into fixed-size PCM byte chunks
#[derive(Debug)]
pub struct StreamingFramer {
    sample_rate: u32,
    chunk_bytes: usize,
    pending: Vec<u8>,
    header_sent: bool,
}

impl StreamingFramer {
    /// # Arguments
    /// * `sample_rate` - Rate declared in the header
    /// * `chunk_ms` - Duration of each emitted chunk
    pub fn new(sample_rate: u32, chunk_ms: u32) -> Self {
        let samples_per_chunk = (sample_rate as u64 * chunk_ms as u64 / 1000).max(1) as usize;
        Self {
            sample_rate,
            chunk_bytes: samples_per_chunk * 2,
            pending: Vec::new(),
            header_sent: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// The header, exactly once; `None` afterwards
    pub fn header(&mut self) -> Option<Vec<u8>> {
        if self.header_sent {
            return None;
        }
        self.header_sent = true;
        Some(streaming_header(self.sample_rate).to_vec())
    }

    /// Convert samples and return every complete chunk now available
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(&pcm16_bytes(samples));
        let complete = self.pending.len() / self.chunk_bytes;
        if complete == 0 {
            return Vec::new();
        }
        let rest = self.pending.split_off(complete * self.chunk_bytes);
        let full = std::mem::replace(&mut self.pending, rest);
        full.chunks(self.chunk_bytes).map(<[u8]>::to_vec).collect()
    }

    /// Flush the final partial chunk, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn job_marker(id: &JobId) -> Vec<u8> {
        format!("<!--JOB_ID:{}-->", id).into_bytes()
    }

    pub fn error_marker() -> Vec<u8> {
        ERROR_MARKER.to_vec()
    }
}

/// Extract the job id from the tail of a streamed body
pub fn parse_job_marker(body: &[u8]) -> Option<JobId> {
    const PREFIX: &[u8] = b"<!--JOB_ID:";
    let start = body
        .windows(PREFIX.len())
        .rposition(|w| w == PREFIX)?;
    let tail = std::str::from_utf8(&body[start + PREFIX.len()..]).ok()?;
    let id = tail.strip_suffix("-->")?;
    JobId::parse(id).ok()
}
