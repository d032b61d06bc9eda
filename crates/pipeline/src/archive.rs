//! Zip archives of several recordings
//!
//! Entries are named `output_001.wav`, `output_002.wav`, ... in input order.

use std::io::{Cursor, Write};
use voicegate_core::Waveform;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dsp::AudioError;
use crate::wav::encode_wav;

/// Archive entry name for the item at `index` (zero-based)
pub fn entry_name(index: usize) -> String {
    format!("output_{:03}.wav", index + 1)
}

/// Encode each waveform as WAV and pack them into one deflated zip
pub fn zip_wavs(waveforms: &[Waveform]) -> Result<Vec<u8>, AudioError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, waveform) in waveforms.iter().enumerate() {
        let wav = encode_wav(&waveform.samples, waveform.sample_rate)?;
        writer.start_file(entry_name(index), options)?;
        writer.write_all(&wav)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_entries_in_input_order() {
        let waveforms = vec![
            Waveform::new(vec![0.1; 2_400], 24_000),
            Waveform::new(vec![-0.2; 4_800], 16_000),
        ];
        let bytes = zip_wavs(&waveforms).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "output_001.wav");
        assert_eq!(archive.by_index(1).unwrap().name(), "output_002.wav");

        let mut wav = Vec::new();
        archive.by_name("output_002.wav").unwrap().read_to_end(&mut wav).unwrap();
        assert_eq!(wav, encode_wav(&waveforms[1].samples, 16_000).unwrap());
    }

    #[test]
    fn test_entry_names_are_padded() {
        assert_eq!(entry_name(0), "output_001.wav");
        assert_eq!(entry_name(49), "output_050.wav");
    }
}
