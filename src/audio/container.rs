//! # Container Assembler
//!
//! Wraps the raw PCM of one utterance into a canonical RIFF/WAVE file, the
//! container the transcription service expects.
//!
//! ## Layout (44-byte header, all integers little-endian):
//! ```text
//! 0  "RIFF"   4  riff size (36 + data)   8  "WAVE"
//! 12 "fmt "   16 16 (fmt size)   20 1 (PCM)   22 channels   24 sample rate
//! 28 byte rate   32 block align   34 bits per sample
//! 36 "data"   40 data size   44 PCM bytes, unchanged
//! ```
//! `hound` writes exactly this header for 16-bit mono integer PCM. No
//! resampling and no channel mixing happen here: the samples the client sent
//! are the samples in the data chunk.

use crate::audio::format::AudioFormat;
use crate::error::EncodingError;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;
use std::time::Duration;

/// Size of the canonical PCM WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

/// A finished audio container.
///
/// ## Immutability:
/// Fields are private and there are no `&mut self` methods, so once
/// [`assemble`] returns, the container can only be read or moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    bytes: Vec<u8>,
    format: AudioFormat,
    sample_count: usize,
}

impl AudioArtifact {
    /// The whole container, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Just the PCM payload.
    pub fn pcm(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    /// Number of 16-bit samples (payload length / 2).
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.pcm().len())
    }
}

fn wav_spec(format: AudioFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Build a WAVE container around `pcm`.
///
/// ## Errors:
/// - `UnsupportedFormat` for any format other than mono / 16-bit / 16 kHz
/// - `Empty` / `OddLength` unless `pcm` holds a positive whole number of samples
/// - `TooLarge` if the RIFF size field would overflow
/// - `InvalidContainer` if the writer fails
pub fn assemble(pcm: &[u8], format: AudioFormat) -> Result<AudioArtifact, EncodingError> {
    if !format.is_supported() {
        return Err(EncodingError::UnsupportedFormat(format));
    }
    if pcm.is_empty() {
        return Err(EncodingError::Empty);
    }
    if pcm.len() % format.block_align() as usize != 0 {
        return Err(EncodingError::OddLength(pcm.len()));
    }
    if pcm.len() > (u32::MAX - 36) as usize {
        return Err(EncodingError::TooLarge(pcm.len()));
    }

    let sample_count = pcm.len() / format.block_align() as usize;
    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), wav_spec(format))?;
        let mut samples = writer.get_i16_writer(sample_count as u32);
        for sample in pcm.chunks_exact(2) {
            samples.write_sample(LittleEndian::read_i16(sample));
        }
        samples.flush()?;
        writer.finalize()?;
    }

    Ok(AudioArtifact {
        bytes,
        format,
        sample_count,
    })
}

/// Read a 16-bit PCM WAVE container back into its format and raw bytes.
#[cfg(test)]
pub fn parse(container: &[u8]) -> Result<(AudioFormat, Vec<u8>), EncodingError> {
    let reader = hound::WavReader::new(Cursor::new(container))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(EncodingError::InvalidContainer(format!(
            "expected 16-bit integer PCM, found {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()?;
    let mut pcm = vec![0u8; samples.len() * 2];
    LittleEndian::write_i16_into(&samples, &mut pcm);

    Ok((
        AudioFormat::new(spec.sample_rate, spec.channels, spec.bits_per_sample),
        pcm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_pcm(samples: i16) -> Vec<u8> {
        (0..samples)
            .map(|i| i.wrapping_mul(257).wrapping_sub(1000))
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_header_is_canonical() {
        let pcm = ramp_pcm(100);
        let artifact = assemble(&pcm, AudioFormat::PCM16_MONO_16K).unwrap();
        let bytes = artifact.as_bytes();

        assert_eq!(bytes.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&bytes[4..8]), 36 + 200);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), 1);
        assert_eq!(LittleEndian::read_u16(&bytes[22..24]), 1);
        assert_eq!(LittleEndian::read_u32(&bytes[24..28]), 16_000);
        assert_eq!(LittleEndian::read_u32(&bytes[28..32]), 32_000);
        assert_eq!(LittleEndian::read_u16(&bytes[32..34]), 2);
        assert_eq!(LittleEndian::read_u16(&bytes[34..36]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(LittleEndian::read_u32(&bytes[40..44]), 200);
        assert_eq!(artifact.pcm(), &pcm[..]);
        assert_eq!(artifact.sample_count(), 100);
    }

    #[test]
    fn test_round_trip_recovers_pcm() {
        for samples in [1i16, 2, 1600, 4800] {
            let pcm = ramp_pcm(samples);
            let artifact = assemble(&pcm, AudioFormat::PCM16_MONO_16K).unwrap();
            let (format, recovered) = parse(artifact.as_bytes()).unwrap();
            assert_eq!(format, AudioFormat::PCM16_MONO_16K);
            assert_eq!(recovered, pcm);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let format = AudioFormat::PCM16_MONO_16K;
        assert_eq!(assemble(&[], format), Err(EncodingError::Empty));
        assert_eq!(assemble(&[1, 2, 3], format), Err(EncodingError::OddLength(3)));

        let stereo = AudioFormat::new(16_000, 2, 16);
        assert_eq!(
            assemble(&[0, 0, 0, 0], stereo),
            Err(EncodingError::UnsupportedFormat(stereo))
        );
        let cd = AudioFormat::new(44_100, 1, 16);
        assert!(matches!(assemble(&[0, 0], cd), Err(EncodingError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_silence_scenario_sizes() {
        let artifact = assemble(&vec![0u8; 9_600], AudioFormat::PCM16_MONO_16K).unwrap();
        assert_eq!(artifact.pcm().len(), 9_600);
        assert_eq!(artifact.sample_count(), 4_800);
        assert_eq!(artifact.duration(), Duration::from_millis(300));
    }

    #[test]
    fn test_extreme_sample_values_survive() {
        let pcm: Vec<u8> = [i16::MIN, -1, 0, 1, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let artifact = assemble(&pcm, AudioFormat::PCM16_MONO_16K).unwrap();
        assert_eq!(artifact.pcm(), &pcm[..]);
        assert_eq!(parse(artifact.as_bytes()).unwrap().1, pcm);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse(b"definitely not a wave file"),
            Err(EncodingError::InvalidContainer(_))
        ));
    }
}
