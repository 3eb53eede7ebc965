use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use log::{debug, error, warn};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::intake::PcmSpec;

pub fn convert_audio_bytes_to_samples(
    audio_bytes: &[u8],
    bit_depth: u8,
) -> Result<Vec<f32>, String> {
    debug!(
        "Converting {} bytes of {}-bit audio to samples",
        audio_bytes.len(),
        bit_depth
    );

    match bit_depth {
        16 => {
            if audio_bytes.len() % 2 != 0 {
                error!(
                    "Invalid 16-bit audio data: odd number of bytes ({})",
                    audio_bytes.len()
                );
                return Err("Invalid 16-bit audio data: odd number of bytes".to_string());
            }
            Ok(audio_bytes
                .chunks_exact(2)
                .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / i16::MAX as f32)
                .collect())
        }
        24 => {
            if audio_bytes.len() % 3 != 0 {
                error!(
                    "Invalid 24-bit audio data: byte count ({}) not divisible by 3",
                    audio_bytes.len()
                );
                return Err("Invalid 24-bit audio data: byte count not divisible by 3".to_string());
            }
            Ok(audio_bytes
                .chunks_exact(3)
                .map(|chunk| {
                    // Sign-extend by placing the sample in the top three bytes.
                    let sample = i32::from_le_bytes([0, chunk[0], chunk[1], chunk[2]]) >> 8;
                    sample as f32 / 8388607.0
                })
                .collect())
        }
        32 => {
            if audio_bytes.len() % 4 != 0 {
                error!(
                    "Invalid 32-bit audio data: byte count ({}) not divisible by 4",
                    audio_bytes.len()
                );
                return Err("Invalid 32-bit audio data: byte count not divisible by 4".to_string());
            }
            Ok(audio_bytes
                .chunks_exact(4)
                .map(|chunk| {
                    let sample = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    sample as f32 / i32::MAX as f32
                })
                .collect())
        }
        _ => {
            error!("Unsupported bit depth: {bit_depth}");
            Err(format!("Unsupported bit depth: {bit_depth}"))
        }
    }
}

/// Averages interleaved frames down to a single channel. A trailing partial
/// frame is dropped.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

pub fn encode_samples(samples: &[f32], bit_depth: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(samples.len() * (bit_depth as usize / 8));
    match bit_depth {
        16 => {
            for &sample in samples {
                let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                bytes.extend_from_slice(&sample_i16.to_le_bytes());
            }
        }
        24 => {
            for &sample in samples {
                let sample_i32 = (sample.clamp(-1.0, 1.0) * 8388607.0) as i32;
                bytes.extend_from_slice(&sample_i32.to_le_bytes()[0..3]);
            }
        }
        32 => {
            for &sample in samples {
                let sample_i32 = (sample.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32;
                bytes.extend_from_slice(&sample_i32.to_le_bytes());
            }
        }
        _ => return Err(anyhow!("Unsupported bit depth: {}", bit_depth)),
    }
    Ok(bytes)
}

pub struct Recording {
    pub bytes: Vec<u8>,
    pub spec: PcmSpec,
}

pub fn record_audio(config: &ClientConfig) -> Result<Recording> {
    println!("🎤 Starting audio recording...");
    println!("   Duration: {} seconds", config.record_duration);

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    println!("🎙️  Using input device: {}", device.name()?);

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| anyhow!("Error querying input configs: {}", e))?
        .find(|range| {
            range.sample_format() == cpal::SampleFormat::F32
                && range.channels() as usize == config.channels
                && range.min_sample_rate().0 <= config.sample_rate
                && range.max_sample_rate().0 >= config.sample_rate
        })
        .map(|range| range.with_sample_rate(cpal::SampleRate(config.sample_rate)))
        .map_or_else(|| device.default_input_config(), Ok)
        .map_err(|e| anyhow!("No supported input config: {}", e))?;

    // The device decides the real format; the server is told what we got.
    let spec = PcmSpec {
        sample_rate: supported_config.sample_rate().0,
        channels: supported_config.channels() as usize,
        bit_depth: config.bit_depth,
    };
    if spec.sample_rate != config.sample_rate || spec.channels != config.channels {
        warn!(
            "Device does not support {}Hz/{}ch, recording at {}Hz/{}ch",
            config.sample_rate, config.channels, spec.sample_rate, spec.channels
        );
    }
    println!(
        "   Format: {}Hz, {} channels, {}-bit",
        spec.sample_rate, spec.channels, spec.bit_depth
    );

    let recorded_samples = Arc::new(Mutex::new(Vec::new()));
    let sample_format = supported_config.sample_format();
    let stream_config: cpal::StreamConfig = supported_config.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(&device, &stream_config, &recorded_samples)?,
        SampleFormat::I16 => build_input_stream::<i16>(&device, &stream_config, &recorded_samples)?,
        SampleFormat::U16 => build_input_stream::<u16>(&device, &stream_config, &recorded_samples)?,
        SampleFormat::I32 => build_input_stream::<i32>(&device, &stream_config, &recorded_samples)?,
        SampleFormat::I8 => build_input_stream::<i8>(&device, &stream_config, &recorded_samples)?,
        SampleFormat::U8 => build_input_stream::<u8>(&device, &stream_config, &recorded_samples)?,
        other => return Err(anyhow!("Unsupported input sample format: {other:?}")),
    };

    stream.play()?;

    println!("🔴 Recording starting in...");
    for i in (1..=3).rev() {
        print!("   {i}... ");
        std::io::stdout().flush()?;
        std::thread::sleep(Duration::from_secs(1));
    }
    println!("🎙️  GO!");

    for remaining in (1..=config.record_duration).rev() {
        if remaining % 5 == 0 || remaining <= 3 {
            println!("   {remaining} seconds remaining...");
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    drop(stream);
    println!("⏹️  Recording stopped");

    let samples = recorded_samples
        .lock()
        .map_err(|_| anyhow!("Recording buffer lock poisoned"))?;
    println!("📊 Recorded {} samples", samples.len());

    let bytes = encode_samples(&samples, spec.bit_depth)?;
    println!("💾 Converted to {} bytes", bytes.len());
    Ok(Recording { bytes, spec })
}

/// Opens an input stream in the device's native sample type, storing f32.
fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: &Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let sink = Arc::clone(sink);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if let Ok(mut samples) = sink.lock() {
                append_as_f32(&mut samples, data);
            }
        },
        |err| error!("Error in audio stream: {err}"),
        None,
    )?;
    Ok(stream)
}

fn append_as_f32<T>(buffer: &mut Vec<f32>, data: &[T])
where
    T: Sample,
    f32: FromSample<T>,
{
    buffer.extend(data.iter().map(|&sample| f32::from_sample(sample)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_device_samples_are_stored_as_f32() {
        let mut buffer = Vec::new();
        append_as_f32(&mut buffer, &[i16::MIN, 0, 16384]);
        append_as_f32(&mut buffer, &[32768u16]);
        append_as_f32(&mut buffer, &[0.25f32]);
        assert_eq!(buffer, vec![-1.0, 0.0, 0.5, 0.0, 0.25]);
    }

    #[test]
    fn converts_16_bit_little_endian() {
        let bytes = [0x00, 0x00, 0xff, 0x7f, 0x01, 0x80];
        let samples = convert_audio_bytes_to_samples(&bytes, 16).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 1.0).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn converts_negative_24_bit_samples() {
        // -1 in 24-bit two's complement.
        let samples = convert_audio_bytes_to_samples(&[0xff, 0xff, 0xff], 24).unwrap();
        assert!(samples[0] < 0.0);
        assert!(samples[0].abs() < 1e-6);
    }

    #[test]
    fn rejects_truncated_frames() {
        assert!(convert_audio_bytes_to_samples(&[0, 0, 0], 16).is_err());
        assert!(convert_audio_bytes_to_samples(&[0, 0], 24).is_err());
        assert!(convert_audio_bytes_to_samples(&[0, 0, 0], 32).is_err());
        assert!(convert_audio_bytes_to_samples(&[0, 0], 8).is_err());
    }

    #[test]
    fn downmix_averages_frames() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix_to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn encoding_matches_decoding() {
        let samples = [0.0, 0.5, -0.5];
        for bit_depth in [16, 24, 32] {
            let bytes = encode_samples(&samples, bit_depth).unwrap();
            let decoded = convert_audio_bytes_to_samples(&bytes, bit_depth).unwrap();
            for (a, b) in samples.iter().zip(&decoded) {
                assert!((a - b).abs() < 1e-3, "{bit_depth}-bit: {a} vs {b}");
            }
        }
    }
}
