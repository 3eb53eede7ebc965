use anyhow::{Result, anyhow};
use std::fs;
use std::path::Path;

use crate::audio::record_audio;
use crate::config::ClientConfig;
use crate::dto::ProcessDto;
use crate::pipeline::OutputMode;

const RECORDING_NAME: &str = "recording.pcm";

pub async fn send_process_request(config: &ClientConfig) -> Result<ProcessDto> {
    let client = reqwest::Client::new();

    let mut form = reqwest::multipart::Form::new()
        .text("model", config.model.to_string())
        .text(
            "bilingual",
            (config.mode == OutputMode::Bilingual).to_string(),
        );

    if config.record_mode {
        let recording = record_audio(config)?;
        println!("📁 Audio source: recorded audio ({} bytes)", recording.bytes.len());
        form = form
            .part(
                "audio",
                reqwest::multipart::Part::bytes(recording.bytes).file_name(RECORDING_NAME),
            )
            .text("sample_rate", recording.spec.sample_rate.to_string())
            .text("channels", recording.spec.channels.to_string())
            .text("bit_depth", recording.spec.bit_depth.to_string());
    } else {
        let file = config
            .audio_file
            .as_deref()
            .ok_or_else(|| anyhow!("No audio source specified"))?;
        let path = Path::new(file);
        if !path.exists() {
            return Err(anyhow!("Audio file not found: {}", file));
        }
        let audio_data = fs::read(path).map_err(|e| anyhow!("Failed to read audio file: {}", e))?;
        println!("📁 Audio source: file: {} ({} bytes)", file, audio_data.len());

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file)
            .to_string();
        form = form.part(
            "audio",
            reqwest::multipart::Part::bytes(audio_data).file_name(file_name),
        );
    }

    println!(
        "🚀 Sending request to: {}/api/v1/process (model: {})",
        config.server_url, config.model
    );

    let response = client
        .post(format!("{}/api/v1/process", config.server_url))
        .multipart(form)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to send request: {}", e))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response: {}", e))?;

    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&response_text)
            .ok()
            .and_then(|body| body["error"].as_str().map(str::to_string))
            .unwrap_or(response_text);
        return Err(anyhow!("Server returned error {}: {}", status, message));
    }

    serde_json::from_str(&response_text).map_err(|e| anyhow!("Failed to parse JSON response: {}", e))
}

pub async fn check_server_health(server_url: &str) -> Result<()> {
    let client = reqwest::Client::new();

    println!("🔍 Checking server health at: {server_url}/health");

    let response = client
        .get(format!("{server_url}/health"))
        .send()
        .await
        .map_err(|e| anyhow!("Failed to connect to server: {}", e))?;

    if response.status().is_success() {
        println!("✅ Server is healthy");
        Ok(())
    } else {
        Err(anyhow!("Server health check failed: {}", response.status()))
    }
}

fn write_subtitles(result: &ProcessDto, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .map_err(|e| anyhow!("Failed to create {}: {}", output_dir.display(), e))?;

    let mut files = vec![(&result.srt_filename, &result.srt)];
    if let (Some(name), Some(srt)) = (&result.bilingual_filename, &result.bilingual_srt) {
        files.push((name, srt));
    }

    for (name, content) in files {
        let path = output_dir.join(name);
        fs::write(&path, content)
            .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        println!("💾 Saved {}", path.display());
    }
    Ok(())
}

pub async fn run_client(config: ClientConfig) -> Result<()> {
    println!("🎬 Whisper Translate Client");
    println!("===========================");

    if config.record_mode {
        println!("🎤 Recording Mode");
        println!("   Make sure your microphone is connected and working!");
    } else if let Some(file) = &config.audio_file {
        println!("📁 File Mode: {file}");
    }
    println!();

    if let Err(e) = check_server_health(&config.server_url).await {
        eprintln!("❌ {e}");
        eprintln!("💡 Make sure the server is running: whisper-translate serve");
        return Err(e);
    }

    match send_process_request(&config).await {
        Ok(result) => {
            println!("\n✅ Subtitles generated!");
            println!("   Detected language: {}", result.language);
            println!("   Segments: {}", result.segments_count);
            println!("📝 Original:\n{}", result.original_text);
            println!("🇹🇼 Traditional Chinese:\n{}", result.translated_text);
            write_subtitles(&result, &config.output_dir)?;
        }
        Err(e) => {
            eprintln!("❌ Processing failed: {e}");
            return Err(e);
        }
    }

    Ok(())
}
