use anyhow::{Result, anyhow};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::intake::TARGET_SAMPLE_RATE;

/// Resamples interleaved audio to the 16kHz rate Whisper expects.
pub fn resample_to_16khz(
    audio_data: &[f32],
    sample_rate: u32,
    channels: usize,
) -> Result<Vec<f32>> {
    if sample_rate == TARGET_SAMPLE_RATE {
        return Ok(audio_data.to_vec());
    }
    if channels == 0 {
        return Err(anyhow!("Cannot resample audio with zero channels"));
    }

    let frames = audio_data.len() / channels;
    if frames == 0 {
        return Err(anyhow!("No audio frames to resample"));
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut input_channels = vec![Vec::with_capacity(frames); channels];
    for frame in audio_data.chunks_exact(channels) {
        for (channel, &sample) in input_channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    let ratio = TARGET_SAMPLE_RATE as f64 / sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, channels)?;

    // Flush the filter delay with a zero-padded partial chunk so the tail of
    // the clip is not lost.
    let delay = resampler.output_delay();
    let expected_frames = (frames as f64 * ratio) as usize;
    let mut resampled = resampler.process(&input_channels, None)?;
    let tail = resampler.process_partial::<Vec<f32>>(None, None)?;
    for (channel, rest) in resampled.iter_mut().zip(tail) {
        channel.extend(rest);
    }

    let end = (delay + expected_frames).min(resampled[0].len());
    let mut output = Vec::with_capacity(end.saturating_sub(delay) * channels);
    for frame_idx in delay..end {
        for channel in &resampled {
            output.push(channel[frame_idx]);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_16khz_audio() {
        let audio = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_16khz(&audio, 16000, 1).unwrap(), audio);
    }

    #[test]
    fn downsamples_48khz_to_a_third_of_the_frames() {
        let audio = vec![0.0_f32; 48000];
        let out = resample_to_16khz(&audio, 48000, 1).unwrap();
        assert!((15900..=16000).contains(&out.len()), "got {}", out.len());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(resample_to_16khz(&[], 44100, 1).is_err());
        assert!(resample_to_16khz(&[0.0; 4], 44100, 0).is_err());
    }
}
