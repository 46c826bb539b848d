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

//! Playback unit abstraction over the host engine's concrete players.
//!
//! The host provides the actual sound-producing objects (non-spatial, 2D
//! spatial and 3D spatial variants). This crate only drives them through
//! the [`PlaybackUnit`] trait and creates them through a [`UnitFactory`],
//! so the pool and registry never depend on a live engine.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The spatialization capability of a playback unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    /// Plain playback with no positional behavior.
    #[default]
    NonSpatial,
    /// Playback attenuated and panned in 2D space.
    Spatial2d,
    /// Playback attenuated and panned in 3D space.
    Spatial3d,
}

impl fmt::Display for VoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceKind::NonSpatial => write!(f, "non-spatial"),
            VoiceKind::Spatial2d => write!(f, "2D"),
            VoiceKind::Spatial3d => write!(f, "3D"),
        }
    }
}

/// A single kind-specific playback setting.
///
/// These are opaque to the pool and scheduler. Typical keys are things
/// like `pitch_scale`, `attenuation` or `position`; the playback unit
/// decides which ones it understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
}

/// Kind-specific playback settings passed along with a play request.
pub type PlayParams = HashMap<String, ParamValue>;

/// One sound-producing slot owned by the host engine.
///
/// Gain is always supplied in decibels; the linear-domain bookkeeping
/// stays inside the crossfade scheduler and is converted at application
/// time only.
pub trait PlaybackUnit {
    /// The spatialization capability of this unit.
    fn kind(&self) -> VoiceKind;

    /// Sets the unit's output gain in decibels.
    fn set_gain_db(&mut self, db: f64);

    /// Assigns or clears the content this unit plays.
    fn set_source(&mut self, source: Option<String>);

    /// Starts output from the given offset in seconds.
    fn play(&mut self, offset: f64);

    /// Stops output.
    fn stop(&mut self);

    /// Moves playback to the given position in seconds.
    fn seek(&mut self, position: f64);

    /// Returns true if the unit is actively producing sound.
    fn is_playing(&self) -> bool;

    /// Returns the current playback position in seconds.
    fn position(&self) -> f64;

    /// Applies kind-specific settings. Unknown keys are ignored.
    fn apply_params(&mut self, params: &PlayParams);
}

/// Creates playback units of a given kind for a channel's voice pool.
pub trait UnitFactory {
    /// Creates a new unit routed to `channel` that will occupy voice
    /// slot `index`.
    fn create(&self, kind: VoiceKind, channel: &str, index: usize) -> Box<dyn PlaybackUnit>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_kind_display() {
        assert_eq!("non-spatial", VoiceKind::NonSpatial.to_string());
        assert_eq!("2D", VoiceKind::Spatial2d.to_string());
        assert_eq!("3D", VoiceKind::Spatial3d.to_string());
    }

    #[test]
    fn test_voice_kind_serde() {
        let yaml = serde_yml::to_string(&VoiceKind::Spatial2d).expect("serialize");
        assert_eq!("spatial2d", yaml.trim());

        let kind: VoiceKind = serde_yml::from_str("non_spatial").expect("deserialize");
        assert_eq!(VoiceKind::NonSpatial, kind);
    }
}
