pub mod audio;
pub mod check;
pub mod cli;
pub mod client;
pub mod config;
pub mod download;
pub mod dto;
pub mod error;
pub mod intake;
pub mod pipeline;
pub mod server;
pub mod subtitle;
pub mod translate;
pub mod whisper;
