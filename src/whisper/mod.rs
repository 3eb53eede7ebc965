pub mod config;
pub mod resampler;
pub mod tier;
pub mod transcriber;
