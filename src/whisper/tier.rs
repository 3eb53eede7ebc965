use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whisper model size. Larger tiers are slower but more accurate.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
}

impl ModelTier {
    pub const ALL: [ModelTier; 4] = [
        ModelTier::Tiny,
        ModelTier::Base,
        ModelTier::Small,
        ModelTier::Medium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Tiny => "tiny",
            ModelTier::Base => "base",
            ModelTier::Small => "small",
            ModelTier::Medium => "medium",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelTier::Tiny => "fastest, lowest accuracy",
            ModelTier::Base => "balanced (recommended)",
            ModelTier::Small => "slower, more accurate",
            ModelTier::Medium => "slowest, most accurate",
        }
    }

    /// File name of the ggml model as published by whisper.cpp.
    pub fn file_name(&self) -> String {
        format!("ggml-{}.bin", self.as_str())
    }

    pub fn model_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.file_name())
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ModelTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown model tier '{}'. Available: tiny, base, small, medium",
                    s.trim()
                )
            })
    }
}

/// Parses a comma separated tier list such as `"tiny,base"`.
pub fn parse_tier_list(value: &str) -> Result<Vec<ModelTier>, String> {
    let mut tiers = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let tier: ModelTier = part.parse()?;
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }
    Ok(tiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive_names() {
        assert_eq!("Small".parse::<ModelTier>(), Ok(ModelTier::Small));
        assert_eq!(" tiny ".parse::<ModelTier>(), Ok(ModelTier::Tiny));
        assert!("large".parse::<ModelTier>().is_err());
    }

    #[test]
    fn tier_list_skips_blanks_and_duplicates() {
        let tiers = parse_tier_list("base, tiny,,base").unwrap();
        assert_eq!(tiers, vec![ModelTier::Base, ModelTier::Tiny]);
    }

    #[test]
    fn model_path_uses_ggml_naming() {
        let path = ModelTier::Medium.model_path(Path::new("/models"));
        assert_eq!(path, PathBuf::from("/models/ggml-medium.bin"));
    }
}
