//! WAV decode, crossfade concatenation, and export for synthesized chunks.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{NarratorError, Result};

pub struct WavSegment {
    pub spec: WavSpec,
    pub samples: Vec<i16>,
}

pub fn decode(bytes: &[u8]) -> Result<WavSegment> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| NarratorError::TtsSynthesisError(format!("invalid wav from tts endpoint: {e}")))?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(NarratorError::TtsSynthesisError(format!(
            "unsupported wav format from tts endpoint: {:?} {}-bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .map_err(|e| NarratorError::TtsSynthesisError(format!("failed to decode wav samples: {e}")))?;

    Ok(WavSegment { spec, samples })
}

pub fn write(path: &Path, segment: &WavSegment) -> Result<()> {
    let mut writer = WavWriter::create(path, segment.spec)
        .map_err(|e| NarratorError::OutputWriteError(e.to_string()))?;
    for &sample in &segment.samples {
        writer
            .write_sample(sample)
            .map_err(|e| NarratorError::OutputWriteError(e.to_string()))?;
    }
    writer.finalize().map_err(|e| NarratorError::OutputWriteError(e.to_string()))?;
    Ok(())
}

/// Concatenates segments in order, linearly blending `crossfade_ms` of
/// overlap between each adjacent pair. Assumes all segments share the first
/// segment's spec (true here: every chunk comes from the same endpoint call).
pub fn crossfade_concat(segments: Vec<WavSegment>, crossfade_ms: u32) -> WavSegment {
    let mut iter = segments.into_iter();
    let first = iter.next().expect("synthesize_chapter guarantees at least one segment");
    let spec = first.spec;
    let channels = spec.channels as usize;
    let fade_frames = (spec.sample_rate as u64 * crossfade_ms as u64 / 1000) as usize;

    let mut samples = first.samples;
    for seg in iter {
        append_with_crossfade(&mut samples, &seg.samples, channels, fade_frames);
    }

    WavSegment { spec, samples }
}

fn append_with_crossfade(base: &mut Vec<i16>, next: &[i16], channels: usize, fade_frames: usize) {
    if channels == 0 {
        base.extend_from_slice(next);
        return;
    }

    let base_frames = base.len() / channels;
    let next_frames = next.len() / channels;
    let frames = fade_frames.min(base_frames).min(next_frames);

    if frames == 0 {
        base.extend_from_slice(next);
        return;
    }

    let fade_len = frames * channels;
    let overlap_start = base.len() - fade_len;
    for i in 0..fade_len {
        let frame = i / channels;
        let t = frame as f32 / frames as f32;
        let a = base[overlap_start + i] as f32;
        let b = next[i] as f32;
        let mixed = a * (1.0 - t) + b * t;
        base[overlap_start + i] = mixed.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
    base.extend_from_slice(&next[fade_len..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(samples: Vec<i16>) -> WavSegment {
        WavSegment {
            spec: WavSpec {
                channels: 1,
                sample_rate: 1000,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            samples,
        }
    }

    #[test]
    fn no_overlap_is_plain_concatenation() {
        let a = segment(vec![1, 2, 3]);
        let b = segment(vec![4, 5, 6]);
        let combined = crossfade_concat(vec![a, b], 0);
        assert_eq!(combined.samples, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn crossfade_blends_overlap_region() {
        // 1000 Hz sample rate, 5ms crossfade => 5 frames of overlap.
        let a = segment(vec![100; 10]);
        let b = segment(vec![0; 10]);
        let combined = crossfade_concat(vec![a, b], 5);
        assert_eq!(combined.samples.len(), 15);
        // overlap region ramps from ~100 down toward 0
        assert!(combined.samples[5] > combined.samples[9]);
        assert_eq!(combined.samples[9], 20);
    }

    #[test]
    fn single_segment_round_trips_unchanged() {
        let a = segment(vec![7, 8, 9]);
        let combined = crossfade_concat(vec![a], 50);
        assert_eq!(combined.samples, vec![7, 8, 9]);
    }

    #[test]
    fn decode_rejects_non_pcm16() {
        // Build a minimal 8-bit wav header-less buffer; hound will fail to
        // parse a bogus RIFF blob outright, which is what we're asserting on.
        let bytes = b"not a real wav file";
        assert!(decode(bytes).is_err());
    }
}
