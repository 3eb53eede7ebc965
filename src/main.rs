use anyhow::{Result, anyhow};
use clap::Parser;
use log::error;

use whisper_translate::check::{CheckOptions, run_checks};
use whisper_translate::cli::{Cli, Commands};
use whisper_translate::client::{check_server_health, run_client};
use whisper_translate::config::{ClientConfig, ServerConfig};
use whisper_translate::download::{download_model, list_available_models};
use whisper_translate::intake::AudioDecoder;
use whisper_translate::pipeline::OutputMode;
use whisper_translate::server::run_server;
use whisper_translate::translate::TranslateConfig;
use whisper_translate::whisper::config::WhisperConfig;
use whisper_translate::whisper::tier::parse_tier_list;

fn output_mode(bilingual: bool) -> OutputMode {
    if bilingual {
        OutputMode::Bilingual
    } else {
        OutputMode::Translation
    }
}

#[actix_web::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Route whisper.cpp output through `log` instead of stderr.
    whisper_rs::install_logging_hooks();

    if let Err(e) = run(Cli::parse()).await {
        error!("{e:#}");
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            health_port,
            models_dir,
            model,
            preload,
            max_upload_mb,
            ffmpeg,
        } => {
            let mut whisper_config = WhisperConfig::from_env()?;
            if let Some(models_dir) = models_dir {
                whisper_config.models_dir = models_dir;
            }
            if let Some(model) = model {
                whisper_config.default_tier = model;
            }
            if let Some(preload) = preload {
                whisper_config.preload = parse_tier_list(&preload).map_err(|e| anyhow!(e))?;
            }

            let server_config = ServerConfig {
                host,
                port,
                health_port,
                max_upload_bytes: max_upload_mb * 1024 * 1024,
                ffmpeg_path: ffmpeg,
            };

            run_server(server_config, whisper_config, TranslateConfig::from_env()?).await
        }
        Commands::TranscribeFile {
            audio_file,
            server_url,
            model,
            bilingual,
            output_dir,
        } => {
            let config = ClientConfig::new_file_mode(
                server_url,
                audio_file,
                model,
                output_mode(bilingual),
                output_dir,
            );
            run_client(config).await
        }
        Commands::Record {
            duration,
            server_url,
            model,
            bilingual,
            output_dir,
            sample_rate,
            channels,
            bit_depth,
        } => {
            let config = ClientConfig::new_record_mode(
                server_url,
                model,
                output_mode(bilingual),
                output_dir,
                sample_rate,
                channels,
                bit_depth,
                duration,
            );
            run_client(config).await
        }
        Commands::Download {
            model,
            models_dir,
            list,
        } => match model {
            Some(model) if !list => download_model(model, &models_dir),
            _ => {
                print!("{}", list_available_models());
                Ok(())
            }
        },
        Commands::Check { offline, ffmpeg } => {
            run_checks(CheckOptions {
                decoder: AudioDecoder::new(ffmpeg),
                whisper: WhisperConfig::from_env()?,
                translate: TranslateConfig::from_env()?,
                offline,
            })
            .await
        }
        Commands::Health { server_url } => check_server_health(&server_url).await,
    }
}
