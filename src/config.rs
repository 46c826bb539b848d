// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Declarative per-channel configuration.
//!
//! Configuration lives independently of the live channels: it can be set
//! before a channel exists, survives channel removal and re-creation in
//! the host, and migrates automatically when a channel is renamed. It is
//! applied to a live channel in a fixed order (see
//! [`crate::registry::ChannelRegistry::set_config`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::playback::VoiceKind;

/// Default maximum number of voices per channel.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default channel volume as normalized linear gain.
pub const DEFAULT_VOLUME: f64 = 0.5;

/// How a channel's voices advance relative to the host's pause state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Follow the owning node's update mode.
    #[default]
    Inherit,
    /// Update only while the host is not paused.
    Pausable,
    /// Update only while the host is paused.
    WhenPaused,
    /// Always update.
    Always,
    /// Never update.
    Disabled,
}

/// A YAML representation of one channel's declarative settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Which playback unit kind the channel's pool creates.
    #[serde(default)]
    pub voice_kind: VoiceKind,

    /// Maximum number of voices in the pool. Zero means unbounded.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// How many voices to create up front when the channel appears.
    #[serde(default)]
    pub pre_allocate: usize,

    /// Channel volume as normalized linear gain (0.0 to 1.0).
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Update mode applied to the channel's voices.
    #[serde(default)]
    pub update_mode: UpdateMode,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_volume() -> f64 {
    DEFAULT_VOLUME
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            voice_kind: VoiceKind::default(),
            capacity: DEFAULT_CAPACITY,
            pre_allocate: 0,
            volume: DEFAULT_VOLUME,
            update_mode: UpdateMode::default(),
        }
    }
}

impl ChannelConfig {
    /// Returns a copy with the volume clamped into [0, 1].
    pub fn clamped(mut self) -> Self {
        self.volume = self.volume.clamp(0.0, 1.0);
        self
    }
}

/// Typed map of channel configurations keyed by channel name.
///
/// Replaces inspector-style string property paths with an explicit
/// read/write surface that any editor layer can sit on top of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigStore {
    #[serde(default)]
    channels: BTreeMap<String, ChannelConfig>,
}

impl ConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the configuration for a channel, if one is stored.
    pub fn get(&self, channel: &str) -> Option<&ChannelConfig> {
        self.channels.get(channel)
    }

    /// Stores a configuration for a channel, clamping the volume.
    pub fn set(&mut self, channel: &str, config: ChannelConfig) {
        self.channels.insert(channel.to_string(), config.clamped());
    }

    /// Ensures a configuration exists for the channel, creating a default
    /// one if needed, and returns it.
    pub fn ensure(&mut self, channel: &str) -> &ChannelConfig {
        self.channels.entry(channel.to_string()).or_default()
    }

    /// Removes a channel's configuration.
    pub fn remove(&mut self, channel: &str) -> Option<ChannelConfig> {
        self.channels.remove(channel)
    }

    /// Moves a configuration from one channel name to another.
    /// Does nothing if no configuration is stored for the old name.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(config) = self.channels.remove(old) {
            self.channels.insert(new.to_string(), config);
        }
    }

    /// Iterates over all stored configurations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChannelConfig)> {
        self.channels.iter()
    }

    /// Loads a store from a YAML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let store: ConfigStore = serde_yml::from_str(&contents)?;
        Ok(store)
    }

    /// Saves the store to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = serde_yml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
