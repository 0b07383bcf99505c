use serde::{Deserialize, Serialize};

use crate::{config::AssetConfig, PoseRevealError, Result};

/// Asset category served by the static host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCategory {
    /// Untouched game footage.
    Raw,
    /// Pose-annotated rendering of the same clip.
    Overlay,
}

/// The two URLs played back together for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSources {
    pub primary: String,
    pub overlay: String,
}

/// Builds clip URLs following `{base}/{category}/{player}/{player}_{clip}.{ext}`.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    config: AssetConfig,
}

impl AssetResolver {
    pub fn new(config: AssetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn category_dir(&self, category: AssetCategory) -> &str {
        match category {
            AssetCategory::Raw => &self.config.raw_dir,
            AssetCategory::Overlay => &self.config.overlay_dir,
        }
    }

    pub fn clip_url(
        &self,
        category: AssetCategory,
        player: &str,
        clip_number: u32,
    ) -> Result<String> {
        let player = player.trim();
        if player.is_empty() {
            return Err(PoseRevealError::config("player identifier must not be blank"));
        }
        if clip_number == 0 {
            return Err(PoseRevealError::config("clip numbers start at 1"));
        }

        let base = self.config.base_url.trim_end_matches('/');
        let dir = self.category_dir(category);
        let ext = self.config.extension.trim_start_matches('.');
        Ok(format!("{base}/{dir}/{player}/{player}_{clip_number}.{ext}"))
    }

    pub fn clip_sources(&self, player: &str, clip_number: u32) -> Result<ClipSources> {
        Ok(ClipSources {
            primary: self.clip_url(AssetCategory::Raw, player, clip_number)?,
            overlay: self.clip_url(AssetCategory::Overlay, player, clip_number)?,
        })
    }

    /// Sources for the configured default clip number.
    pub fn default_sources(&self, player: &str) -> Result<ClipSources> {
        self.clip_sources(player, self.config.clip_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(base: &str) -> AssetResolver {
        AssetResolver::new(AssetConfig {
            base_url: base.to_string(),
            ..AssetConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn builds_conventional_paths() {
        let sources = resolver("/static").clip_sources("Dame", 2).unwrap();
        assert_eq!(sources.primary, "/static/raw_clips/Dame/Dame_2.mp4");
        assert_eq!(sources.overlay, "/static/gifs/Dame/Dame_2.mp4");
    }

    #[test]
    fn empty_base_yields_root_relative_urls() {
        let sources = resolver("").default_sources("Kobe").unwrap();
        assert_eq!(sources.primary, "/raw_clips/Kobe/Kobe_1.mp4");
    }

    #[test]
    fn trailing_slash_is_not_doubled() {
        let url = resolver("https://cdn.example.com/")
            .clip_url(AssetCategory::Overlay, "MPJ", 1)
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/gifs/MPJ/MPJ_1.mp4");
    }

    #[test]
    fn errors_on_blank_player_or_zero_clip() {
        let resolver = resolver("");
        let err = resolver.clip_sources("  ", 1).unwrap_err();
        assert!(format!("{err}").contains("blank"));
        assert!(resolver.clip_sources("Dame", 0).is_err());
    }
}
