// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config = Self::from_yaml(&contents)?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents).context("Invalid config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let counting = &self.counting;
        if counting.backtrack_length == 0 {
            bail!("counting.backtrack_length must be at least 1");
        }
        if counting.track_length <= counting.backtrack_length {
            bail!(
                "counting.track_length ({}) must exceed backtrack_length ({})",
                counting.track_length,
                counting.backtrack_length
            );
        }
        if !(0.0..50.0).contains(&counting.buffer_size) {
            bail!(
                "counting.buffer_size must be in [0, 50) percent, got {}",
                counting.buffer_size
            );
        }

        if self.frame.width == 0 || self.frame.height == 0 {
            bail!(
                "frame size must be non-zero, got {}x{}",
                self.frame.width,
                self.frame.height
            );
        }
        if !self.frame.fps.is_finite() || self.frame.fps <= 0.0 {
            bail!("frame.fps must be positive, got {}", self.frame.fps);
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.id) {
                bail!("duplicate zone id {}", zone.id);
            }
            // Point count and finiteness are checked by Zone::from_points
            // when the counters are built.
        }

        if self.output.overlay_dir.is_some() && self.output.overlay_every == 0 {
            bail!("output.overlay_every must be at least 1 when overlay_dir is set");
        }
        if self.output.event_bus_capacity == 0 {
            bail!("output.event_bus_capacity must be at least 1");
        }

        Ok(())
    }
}
