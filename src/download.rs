use anyhow::{Result, anyhow};
use log::info;
use std::path::Path;
use std::process::Command;

use crate::whisper::tier::ModelTier;

const MODEL_REPOSITORY: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

pub fn list_available_models() -> String {
    let mut output = String::from("\nAvailable models:\n");
    for tier in ModelTier::ALL {
        output.push_str(&format!("  {:<8} {}\n", tier.as_str(), tier.description()));
    }
    output
}

pub fn model_url(tier: ModelTier) -> String {
    format!("{MODEL_REPOSITORY}/{}", tier.file_name())
}

fn check_download_tool() -> Result<&'static str> {
    ["wget2", "wget", "curl"]
        .into_iter()
        .find(|tool| {
            Command::new("which")
                .arg(tool)
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            anyhow!(
                "Either wget, wget2, or curl is required to download models. Please install one of them."
            )
        })
}

fn download_with_tool(tool: &str, url: &str, output_path: &Path) -> Result<()> {
    let mut cmd = Command::new(tool);

    match tool {
        "wget2" => {
            cmd.args(["--no-config", "--progress", "bar", "-O"]);
        }
        "wget" => {
            cmd.args(["--no-config", "--quiet", "--show-progress", "-O"]);
        }
        "curl" => {
            cmd.args(["-fL", "--output"]);
        }
        _ => return Err(anyhow!("Unsupported download tool: {}", tool)),
    }
    cmd.arg(output_path).arg(url);

    let status = cmd
        .status()
        .map_err(|e| anyhow!("Failed to execute {}: {}", tool, e))?;

    if !status.success() {
        // Don't leave a truncated model behind for the server to choke on.
        let _ = std::fs::remove_file(output_path);
        return Err(anyhow!("Download failed with {}", tool));
    }

    Ok(())
}

pub fn download_model(tier: ModelTier, models_dir: &Path) -> Result<()> {
    let file_path = tier.model_path(models_dir);

    if file_path.exists() {
        println!("Model '{tier}' already exists. Skipping download.");
        return Ok(());
    }

    let url = model_url(tier);
    println!("Downloading ggml model '{tier}' from '{url}'...");
    info!("Downloading {} to {}", url, file_path.display());

    let tool = check_download_tool()?;

    std::fs::create_dir_all(models_dir)
        .map_err(|e| anyhow!("Failed to create directory: {}", e))?;

    download_with_tool(tool, &url, &file_path)?;

    println!("Done! Model '{}' saved in '{}'", tier, file_path.display());
    println!("You can now use it like this:");
    println!(
        "  $ whisper-translate serve --models-dir {} --model {}",
        models_dir.display(),
        tier
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_point_at_ggml_files() {
        assert_eq!(
            model_url(ModelTier::Tiny),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin"
        );
    }

    #[test]
    fn listing_mentions_every_tier() {
        let listing = list_available_models();
        for tier in ModelTier::ALL {
            assert!(listing.contains(tier.as_str()));
        }
    }

    #[test]
    fn existing_model_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(ModelTier::Tiny.model_path(dir.path()), b"model").unwrap();
        download_model(ModelTier::Tiny, dir.path()).unwrap();
    }
}
