//! 16-bit mono PCM WAV encoding
//!
//! Single-shot responses and downloads are written with hound. Streaming
//! responses start with a hand-built header whose size fields carry the
//! unknown-length sentinel, followed by raw PCM.

use std::io::Cursor;

use crate::dsp::AudioError;

/// Length of a canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// RIFF size sentinel for streams of unknown length
const UNKNOWN_RIFF_SIZE: u32 = 0xFFFF_FFFF;

/// Float sample to 16-bit PCM, clipping rather than wrapping
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Little-endian 16-bit PCM bytes
pub fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&to_pcm16(*s).to_le_bytes());
    }
    out
}

/// Encode a complete mono WAV file
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let mut pcm = writer.get_i16_writer(samples.len() as u32);
        for s in samples {
            pcm.write_sample(to_pcm16(*s));
        }
        pcm.flush()?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Header for a WAV stream of unknown length
pub fn streaming_header(sample_rate: u32) -> [u8; WAV_HEADER_LEN] {
    let channels: u16 = 1;
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&UNKNOWN_RIFF_SIZE.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&(UNKNOWN_RIFF_SIZE - 36).to_le_bytes());
    header
}

/// Decode the PCM payload of a mono 16-bit WAV file
pub fn decode_pcm16(bytes: &[u8]) -> Result<(Vec<i16>, u32), AudioError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let rate = reader.spec().sample_rate;
    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((samples, rate))
}
