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

//! Mock collaborators. These don't talk to a real engine and exist so the
//! registry, pools and scheduler can be exercised without one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::playback::{PlayParams, PlaybackUnit, UnitFactory, VoiceKind};
use crate::routing::RoutingEngine;
use crate::util::db_to_linear;

/// Observable state of a mock playback unit.
#[derive(Debug, Clone, Default)]
pub struct MockUnitState {
    pub kind: VoiceKind,
    pub source: Option<String>,
    pub gain_db: f64,
    pub playing: bool,
    pub position: f64,
    pub params: PlayParams,
    pub play_count: u32,
}

/// A handle into a mock unit's state, kept alive by the factory even
/// after the unit itself has been destroyed.
#[derive(Clone)]
pub struct MockUnitHandle {
    /// The channel the unit was created for.
    pub channel: String,
    /// The voice slot the unit was created for.
    pub index: usize,
    state: Arc<Mutex<MockUnitState>>,
}

impl MockUnitHandle {
    /// Returns a snapshot of the unit's state.
    pub fn state(&self) -> MockUnitState {
        self.state.lock().clone()
    }

    /// Returns the unit's gain as normalized linear gain.
    pub fn gain_linear(&self) -> f64 {
        db_to_linear(self.state.lock().gain_db)
    }
}

/// A mock playback unit. Doesn't actually play anything.
pub struct MockUnit {
    state: Arc<Mutex<MockUnitState>>,
}

impl PlaybackUnit for MockUnit {
    fn kind(&self) -> VoiceKind {
        self.state.lock().kind
    }

    fn set_gain_db(&mut self, db: f64) {
        self.state.lock().gain_db = db;
    }

    fn set_source(&mut self, source: Option<String>) {
        self.state.lock().source = source;
    }

    fn play(&mut self, offset: f64) {
        let mut state = self.state.lock();
        if state.source.is_some() {
            state.playing = true;
            state.position = offset;
            state.play_count += 1;
        }
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.position = 0.0;
    }

    fn seek(&mut self, position: f64) {
        self.state.lock().position = position;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn apply_params(&mut self, params: &PlayParams) {
        self.state.lock().params = params.clone();
    }
}

/// A factory producing mock units. Keeps a handle to every unit it has
/// ever created so tests can inspect them, including units that a pool
/// has since destroyed.
#[derive(Clone, Default)]
pub struct MockFactory {
    created: Arc<Mutex<Vec<MockUnitHandle>>>,
}

impl MockFactory {
    /// Creates a new mock factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of units created so far.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// The most recently created unit for the given channel and slot.
    pub fn unit(&self, channel: &str, index: usize) -> Option<MockUnitHandle> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|h| h.channel == channel && h.index == index)
            .cloned()
    }
}

impl UnitFactory for MockFactory {
    fn create(&self, kind: VoiceKind, channel: &str, index: usize) -> Box<dyn PlaybackUnit> {
        let state = Arc::new(Mutex::new(MockUnitState {
            kind,
            ..Default::default()
        }));
        self.created.lock().push(MockUnitHandle {
            channel: channel.to_string(),
            index,
            state: state.clone(),
        });
        Box::new(MockUnit { state })
    }
}

/// A mock routing engine holding an editable channel list. Clones share
/// state, so a test can hand one clone to the registry and drive channel
/// changes through another.
#[derive(Clone, Default)]
pub struct MockRoutingEngine {
    channels: Arc<Mutex<Vec<(String, f64)>>>,
}

impl MockRoutingEngine {
    /// Creates a routing engine with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a routing engine with the given channels at 0 dB.
    pub fn with_channels(names: &[&str]) -> Self {
        let engine = Self::new();
        for name in names {
            engine.add_channel(name);
        }
        engine
    }

    /// Appends a channel at unity gain.
    pub fn add_channel(&self, name: &str) {
        self.channels.lock().push((name.to_string(), 0.0));
    }

    /// Removes the named channel. Later channels shift down an index,
    /// like host channel lists do.
    pub fn remove_channel(&self, name: &str) {
        self.channels.lock().retain(|(n, _)| n != name);
    }

    /// Renames a channel in place, keeping its index and gain.
    pub fn rename_channel(&self, old: &str, new: &str) {
        let mut channels = self.channels.lock();
        if let Some(entry) = channels.iter_mut().find(|(n, _)| n == old) {
            entry.0 = new.to_string();
        }
    }

    /// The named channel's gain in decibels, if it exists.
    pub fn gain_db(&self, name: &str) -> Option<f64> {
        self.channels
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, db)| *db)
    }

    /// The named channel's gain as normalized linear gain, if it exists.
    pub fn gain_linear(&self, name: &str) -> Option<f64> {
        self.gain_db(name).map(db_to_linear)
    }
}

impl RoutingEngine for MockRoutingEngine {
    fn list_channels(&self) -> Vec<(String, usize)> {
        self.channels
            .lock()
            .iter()
            .enumerate()
            .map(|(index, (name, _))| (name.clone(), index))
            .collect()
    }

    fn channel_gain_db(&self, index: usize) -> f64 {
        self.channels
            .lock()
            .get(index)
            .map(|(_, db)| *db)
            .unwrap_or(0.0)
    }

    fn set_channel_gain_db(&mut self, index: usize, db: f64) {
        if let Some(entry) = self.channels.lock().get_mut(index) {
            entry.1 = db;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_unit_lifecycle() {
        let factory = MockFactory::new();
        let mut unit = factory.create(VoiceKind::Spatial2d, "sfx", 0);

        // No source, no playback.
        unit.play(0.0);
        assert!(!unit.is_playing());

        unit.set_source(Some("steps".to_string()));
        unit.play(1.5);
        assert!(unit.is_playing());
        assert_eq!(1.5, unit.position());

        unit.seek(3.0);
        assert_eq!(3.0, unit.position());

        unit.stop();
        assert!(!unit.is_playing());

        let handle = factory.unit("sfx", 0).expect("created unit");
        assert_eq!(VoiceKind::Spatial2d, handle.state().kind);
        assert_eq!(1, handle.state().play_count);
    }

    #[test]
    fn test_mock_routing_indices_shift_on_removal() {
        let routing = MockRoutingEngine::with_channels(&["Master", "Music", "SFX"]);
        routing.remove_channel("Music");

        let channels = routing.list_channels();
        assert_eq!(
            vec![("Master".to_string(), 0), ("SFX".to_string(), 1)],
            channels
        );
    }
}
