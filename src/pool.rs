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

//! Voice pools: ordered collections of playback slots for one channel.
//!
//! A pool owns its voices outright. Voice indices are stable for as long
//! as the voice exists; the free set always refers to valid indices and
//! `busy + free == pool size` holds at every public-method boundary.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::{UpdateMode, DEFAULT_CAPACITY};
use crate::playback::{PlaybackUnit, UnitFactory, VoiceKind};

/// One playback slot. Free voices have no source assigned; busy voices
/// carry content, whether or not they are audibly producing sound.
pub struct Voice {
    unit: Box<dyn PlaybackUnit>,
}

impl Voice {
    fn new(unit: Box<dyn PlaybackUnit>) -> Self {
        Self { unit }
    }

    /// The playback unit behind this voice.
    pub fn unit(&self) -> &dyn PlaybackUnit {
        self.unit.as_ref()
    }

    /// Mutable access to the playback unit behind this voice.
    pub fn unit_mut(&mut self) -> &mut dyn PlaybackUnit {
        self.unit.as_mut()
    }

    /// Stops output and clears the assigned source.
    fn clear(&mut self) {
        self.unit.stop();
        self.unit.set_source(None);
    }
}

/// The set of voices owned by one channel.
pub struct VoicePool {
    kind: VoiceKind,
    capacity: usize,
    update_mode: UpdateMode,
    voices: Vec<Voice>,
    /// Indices of voices free to be used. Ordered so voice selection is
    /// deterministic: the smallest free index always wins.
    free: BTreeSet<usize>,
}

impl VoicePool {
    /// Creates an empty pool producing voices of the given kind.
    pub fn new(kind: VoiceKind) -> Self {
        Self {
            kind,
            capacity: DEFAULT_CAPACITY,
            update_mode: UpdateMode::default(),
            voices: Vec::new(),
            free: BTreeSet::new(),
        }
    }

    /// The kind of voice this pool creates.
    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    /// The maximum number of voices. Zero means unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The update mode applied to this pool's voices.
    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// Sets the update mode for this pool's voices.
    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.update_mode = mode;
    }

    /// The number of voices currently in the pool.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Returns true if the pool holds no voices.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// The number of voices free to be used.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// The number of voices currently marked in use.
    pub fn busy_count(&self) -> usize {
        self.voices.len() - self.free.len()
    }

    /// The number of voices actively producing sound.
    pub fn playing_count(&self) -> usize {
        self.voices.iter().filter(|v| v.unit.is_playing()).count()
    }

    /// Indices of voices actively producing sound.
    pub fn currently_playing(&self) -> Vec<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.unit.is_playing())
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns true if a new voice may be created without exceeding the
    /// capacity.
    pub fn can_create(&self) -> bool {
        self.capacity == 0 || self.voices.len() < self.capacity
    }

    /// Appends a new voice of the pool's kind, initially free.
    /// Returns `None` when the pool is at capacity.
    pub fn create_voice(&mut self, factory: &dyn UnitFactory, channel: &str) -> Option<usize> {
        if !self.can_create() {
            return None;
        }

        let index = self.voices.len();
        self.voices
            .push(Voice::new(factory.create(self.kind, channel, index)));
        self.free.insert(index);
        Some(index)
    }

    /// Takes the smallest free voice index, marking it in use.
    pub fn acquire_free_voice(&mut self) -> Option<usize> {
        self.free.pop_first()
    }

    /// Returns the smallest free voice index without marking it in use.
    pub fn peek_free_voice(&self) -> Option<usize> {
        self.free.first().copied()
    }

    /// Marks a specific voice as in use, interrupting whatever it held.
    pub fn acquire(&mut self, index: usize) {
        self.free.remove(&index);
    }

    /// Returns the voice to the free set and clears its content.
    /// Releasing an already-free voice is a no-op.
    pub fn release(&mut self, index: usize) {
        let Some(voice) = self.voices.get_mut(index) else {
            return;
        };
        voice.clear();
        self.free.insert(index);
    }

    /// Returns true if the voice at `index` is marked in use.
    pub fn is_used(&self, index: usize) -> bool {
        index < self.voices.len() && !self.free.contains(&index)
    }

    /// Returns true if the voice at `index` is actively producing sound.
    /// Out-of-range indices report false.
    pub fn is_voice_playing(&self, index: usize) -> bool {
        self.voices
            .get(index)
            .map(|v| v.unit.is_playing())
            .unwrap_or(false)
    }

    /// The playback unit of the voice at `index`, if it exists.
    pub fn unit(&self, index: usize) -> Option<&dyn PlaybackUnit> {
        self.voices.get(index).map(|v| v.unit())
    }

    /// Mutable playback unit of the voice at `index`, if it exists.
    pub fn unit_mut(&mut self, index: usize) -> Option<&mut dyn PlaybackUnit> {
        self.voices.get_mut(index).map(|v| v.unit_mut())
    }

    /// Caps the pool at `capacity` voices. When shrinking, voices are
    /// evicted from the highest index down, released regardless of busy
    /// state. Zero removes the cap.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;

        if capacity == 0 {
            return;
        }
        while self.voices.len() > capacity {
            let index = self.voices.len() - 1;
            if let Some(voice) = self.voices.last_mut() {
                voice.clear();
            }
            self.voices.pop();
            self.free.remove(&index);
            debug!(index, "Evicted voice while shrinking pool");
        }
    }

    /// Replaces every voice with one of the new kind, preserving the pool
    /// size but not the content: all voices come back free. A no-op when
    /// the kind is unchanged.
    pub fn rebuild(&mut self, new_kind: VoiceKind, factory: &dyn UnitFactory, channel: &str) {
        if new_kind == self.kind {
            return;
        }

        let count = self.voices.len();
        self.clear();
        self.kind = new_kind;
        for _ in 0..count {
            self.create_voice(factory, channel);
        }
        debug!(channel, kind = %new_kind, count, "Rebuilt voice pool");
    }

    /// Releases every voice's resources and empties the pool.
    pub fn clear(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.clear();
        }
        self.voices.clear();
        self.free.clear();
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("voices", &self.voices.len())
            .field("free", &self.free.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFactory;

    fn make_pool(kind: VoiceKind, capacity: usize) -> (VoicePool, MockFactory) {
        let mut pool = VoicePool::new(kind);
        pool.set_capacity(capacity);
        (pool, MockFactory::new())
    }

    #[test]
    fn test_create_and_acquire_smallest_index() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 0);

        assert_eq!(Some(0), pool.create_voice(&factory, "sfx"));
        assert_eq!(Some(1), pool.create_voice(&factory, "sfx"));
        assert_eq!(Some(2), pool.create_voice(&factory, "sfx"));
        assert_eq!(3, pool.len());
        assert_eq!(3, pool.free_count());

        assert_eq!(Some(0), pool.acquire_free_voice());
        assert_eq!(Some(1), pool.acquire_free_voice());

        // Releasing 0 makes it the smallest free index again.
        pool.release(0);
        assert_eq!(Some(0), pool.acquire_free_voice());
        assert_eq!(Some(2), pool.acquire_free_voice());
        assert_eq!(None, pool.acquire_free_voice());
    }

    #[test]
    fn test_capacity_blocks_creation() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 2);

        assert!(pool.create_voice(&factory, "sfx").is_some());
        assert!(pool.create_voice(&factory, "sfx").is_some());
        assert!(pool.create_voice(&factory, "sfx").is_none());
        assert_eq!(2, pool.len());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 0);
        pool.create_voice(&factory, "sfx");
        pool.acquire_free_voice();
        assert_eq!(0, pool.free_count());

        pool.release(0);
        assert_eq!(1, pool.free_count());
        pool.release(0);
        assert_eq!(1, pool.free_count());

        // Out-of-range release does nothing.
        pool.release(17);
        assert_eq!(1, pool.free_count());
        assert_eq!(1, pool.len());
    }

    #[test]
    fn test_release_clears_source() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 0);
        pool.create_voice(&factory, "sfx");
        pool.acquire(0);

        if let Some(unit) = pool.unit_mut(0) {
            unit.set_source(Some("door_open".to_string()));
            unit.play(0.0);
        }
        assert!(pool.is_voice_playing(0));

        pool.release(0);
        let state = factory.unit("sfx", 0).expect("unit").state();
        assert!(state.source.is_none());
        assert!(!state.playing);
    }

    #[test]
    fn test_shrink_evicts_highest_first() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 0);
        for _ in 0..4 {
            pool.create_voice(&factory, "sfx");
        }
        // Mark 2 and 3 busy; eviction ignores busy state.
        pool.acquire(2);
        pool.acquire(3);
        if let Some(unit) = pool.unit_mut(3) {
            unit.set_source(Some("music".to_string()));
            unit.play(0.0);
        }

        pool.set_capacity(2);
        assert_eq!(2, pool.len());
        assert_eq!(2, pool.free_count());
        assert!(!pool.is_used(3));

        // The evicted busy voice had its resources released.
        let state = factory.unit("sfx", 3).expect("unit").state();
        assert!(state.source.is_none());
        assert!(!state.playing);
    }

    #[test]
    fn test_rebuild_preserves_count_not_content() {
        let (mut pool, factory) = make_pool(VoiceKind::NonSpatial, 0);
        for _ in 0..3 {
            pool.create_voice(&factory, "sfx");
        }
        pool.acquire_free_voice();
        if let Some(unit) = pool.unit_mut(0) {
            unit.set_source(Some("beep".to_string()));
        }

        pool.rebuild(VoiceKind::Spatial3d, &factory, "sfx");
        assert_eq!(VoiceKind::Spatial3d, pool.kind());
        assert_eq!(3, pool.len());
        assert_eq!(3, pool.free_count());
        assert_eq!(
            Some(VoiceKind::Spatial3d),
            pool.unit(0).map(|u| u.kind())
        );

        // Same kind is a no-op: nothing gets destroyed.
        pool.acquire_free_voice();
        pool.rebuild(VoiceKind::Spatial3d, &factory, "sfx");
        assert_eq!(2, pool.free_count());
    }

    #[test]
    fn test_counts_stay_consistent() {
        let (mut pool, factory) = make_pool(VoiceKind::Spatial2d, 8);
        for _ in 0..5 {
            pool.create_voice(&factory, "ambient");
        }
        pool.acquire_free_voice();
        pool.acquire_free_voice();
        pool.release(0);

        assert_eq!(pool.len(), pool.busy_count() + pool.free_count());
        assert_eq!(1, pool.busy_count());
        assert!(pool.is_used(1));
        assert!(!pool.is_used(0));
    }
}
