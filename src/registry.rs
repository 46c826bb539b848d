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

//! The channel registry: the top-level map from channel name to voice
//! pool and configuration.
//!
//! The registry mirrors the routing engine's channel list rather than
//! owning it. The host is expected to call [`ChannelRegistry::synchronize`]
//! when the channel list changes, [`ChannelRegistry::rename`] when a
//! channel is renamed, and [`ChannelRegistry::on_tick`] once per frame.
//! Play, stop and volume requests are addressed by channel name; the
//! cached routing index is revalidated on every synchronize.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ChannelConfig, ConfigStore, UpdateMode};
use crate::error::Error;
use crate::fade::{FadeScheduler, FadeTask};
use crate::playback::{PlayParams, UnitFactory, VoiceKind};
use crate::pool::VoicePool;
use crate::routing::RoutingEngine;
use crate::util::{db_to_linear, linear_to_db, SILENCE_DB};

/// Emitted whenever a voice's playback ends, either naturally or at the
/// end of a fade-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFinished {
    /// The channel the voice belongs to.
    pub channel: String,
    /// The index of the voice within its pool.
    pub voice: usize,
}

/// One mirrored channel: a cached routing index plus the owned pool.
pub(crate) struct Channel {
    pub(crate) routing_index: usize,
    pub(crate) pool: VoicePool,
}

/// A snapshot of one channel's pool state for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDetails {
    /// The channel name.
    pub name: String,
    /// Number of voices currently in the pool.
    pub voice_count: usize,
    /// Maximum number of voices. Zero means unbounded.
    pub capacity: usize,
    /// Number of voices actively producing sound.
    pub playing: usize,
    /// Number of voices free to be used.
    pub free: usize,
    /// The kind of voice the pool creates.
    pub kind: VoiceKind,
}

fn lookup<'a>(channels: &'a HashMap<String, Channel>, name: &str) -> Result<&'a Channel, Error> {
    channels.get(name).ok_or_else(|| {
        warn!(channel = name, "Channel not found in registry");
        Error::UnknownChannel(name.to_string())
    })
}

fn lookup_mut<'a>(
    channels: &'a mut HashMap<String, Channel>,
    name: &str,
) -> Result<&'a mut Channel, Error> {
    channels.get_mut(name).ok_or_else(|| {
        warn!(channel = name, "Channel not found in registry");
        Error::UnknownChannel(name.to_string())
    })
}

/// Owns every channel's voice pool, the crossfade scheduler and the
/// declarative configuration store.
pub struct ChannelRegistry {
    routing: Box<dyn RoutingEngine>,
    factory: Box<dyn UnitFactory>,
    channels: HashMap<String, Channel>,
    configs: ConfigStore,
    fades: FadeScheduler,
    event_tx: Sender<PlaybackFinished>,
    event_rx: Receiver<PlaybackFinished>,
}

impl ChannelRegistry {
    /// Creates a registry over the given routing engine and unit factory.
    /// Call [`Self::synchronize`] afterwards to mirror the channel list.
    pub fn new(routing: Box<dyn RoutingEngine>, factory: Box<dyn UnitFactory>) -> Self {
        Self::with_configs(routing, factory, ConfigStore::new())
    }

    /// Creates a registry seeded with persisted channel configurations.
    /// Each configuration is applied when its channel first appears.
    pub fn with_configs(
        routing: Box<dyn RoutingEngine>,
        factory: Box<dyn UnitFactory>,
        configs: ConfigStore,
    ) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            routing,
            factory,
            channels: HashMap::new(),
            configs,
            fades: FadeScheduler::new(),
            event_tx,
            event_rx,
        }
    }

    /// A receiver for playback-finished events. May be cloned freely.
    pub fn events(&self) -> Receiver<PlaybackFinished> {
        self.event_rx.clone()
    }

    /// Reconciles the local channel map against the routing engine.
    ///
    /// New channels get an empty pool, a pending configuration if none is
    /// stored yet, and the configuration applied. Known channels only
    /// have their cached routing index refreshed. Channels gone from the
    /// engine are dropped along with their voices and configuration.
    pub fn synchronize(&mut self) {
        let external = self.routing.list_channels();

        let stale: Vec<String> = self
            .channels
            .keys()
            .filter(|name| !external.iter().any(|(e, _)| e == *name))
            .cloned()
            .collect();

        let mut created = Vec::new();
        for (name, index) in external {
            match self.channels.get_mut(&name) {
                Some(channel) => channel.routing_index = index,
                None => {
                    self.channels.insert(
                        name.clone(),
                        Channel {
                            routing_index: index,
                            pool: VoicePool::new(VoiceKind::default()),
                        },
                    );
                    self.configs.ensure(&name);
                    created.push(name);
                }
            }
        }

        for name in stale {
            if let Some(mut channel) = self.channels.remove(&name) {
                channel.pool.clear();
                self.configs.remove(&name);
                debug!(channel = name, "Dropped channel no longer in routing engine");
            }
        }

        for name in &created {
            self.apply_config(name);
            info!(channel = name.as_str(), "Channel registered");
        }
    }

    /// Moves a channel and its configuration to a new name. The live pool
    /// is carried over untouched; the old name is invalid immediately.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), Error> {
        let Some(channel) = self.channels.remove(old) else {
            warn!(channel = old, "Attempted to rename an unknown channel");
            return Err(Error::UnknownChannel(old.to_string()));
        };
        self.channels.insert(new.to_string(), channel);
        self.configs.rename(old, new);
        info!(from = old, to = new, "Channel renamed");
        Ok(())
    }

    /// Plays `source` on the named channel.
    ///
    /// With an explicit voice index, that voice is used directly,
    /// interrupting whatever it held. Otherwise the smallest free voice
    /// is taken, growing the pool when allowed; with the pool full and
    /// no voice free, the request is silently ignored and `Ok(None)` is
    /// returned.
    ///
    /// A positive `fade_time` schedules a fade-in from silence to unity;
    /// otherwise the voice starts at unity gain. Output begins at
    /// `offset` seconds.
    pub fn play(
        &mut self,
        channel: &str,
        source: &str,
        voice: Option<usize>,
        fade_time: f64,
        params: &PlayParams,
        offset: f64,
    ) -> Result<Option<usize>, Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;

        let index = match voice {
            Some(index) => {
                if index >= chan.pool.len() {
                    return Err(Error::VoiceOutOfRange {
                        channel: channel.to_string(),
                        index,
                    });
                }
                chan.pool.acquire(index);
                index
            }
            None => match chan.pool.acquire_free_voice() {
                Some(index) => index,
                None => {
                    if chan.pool.create_voice(self.factory.as_ref(), channel).is_none() {
                        // Full pool with nothing free: the request is
                        // dropped without a diagnostic.
                        return Ok(None);
                    }
                    match chan.pool.acquire_free_voice() {
                        Some(index) => index,
                        None => return Ok(None),
                    }
                }
            },
        };

        let Some(unit) = chan.pool.unit_mut(index) else {
            return Ok(None);
        };
        unit.set_source(Some(source.to_string()));
        unit.apply_params(params);

        if fade_time > 0.0 {
            unit.set_gain_db(SILENCE_DB);
            self.fades
                .enqueue(FadeTask::voice_fade(channel, index, 0.0, 1.0, fade_time));
        } else {
            unit.set_gain_db(0.0);
        }
        unit.play(offset);

        debug!(channel, voice = index, source, "Playback started");
        Ok(Some(index))
    }

    /// Stops the voice at `index`. A positive `fade_time` schedules a
    /// fade to silence that releases the voice on completion; otherwise
    /// the voice is released immediately if it is producing sound.
    /// Out-of-range indices are ignored.
    pub fn stop(&mut self, channel: &str, index: usize, fade_time: f64) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        if index >= chan.pool.len() {
            return Ok(());
        }

        if fade_time > 0.0 {
            self.fades
                .enqueue(FadeTask::voice_fade(channel, index, 1.0, 0.0, fade_time));
        } else if chan.pool.is_voice_playing(index) {
            chan.pool.release(index);
        }
        Ok(())
    }

    /// Stops every currently-playing voice in the channel.
    pub fn stop_all_in_channel(&mut self, channel: &str, fade_time: f64) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        let playing = chan.pool.currently_playing();

        if fade_time > 0.0 {
            for index in playing {
                self.fades
                    .enqueue(FadeTask::voice_fade(channel, index, 1.0, 0.0, fade_time));
            }
        } else {
            for index in playing {
                chan.pool.release(index);
            }
        }
        Ok(())
    }

    /// Stops every currently-playing voice in every channel.
    pub fn stop_all(&mut self, fade_time: f64) {
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            let _ = self.stop_all_in_channel(&name, fade_time);
        }
    }

    /// Sets the channel's master volume as normalized linear gain. A
    /// positive `fade_time` schedules a transition from the current gain.
    pub fn set_channel_volume(
        &mut self,
        channel: &str,
        volume: f64,
        fade_time: f64,
    ) -> Result<(), Error> {
        let chan = lookup(&self.channels, channel)?;
        let volume = volume.clamp(0.0, 1.0);

        if fade_time > 0.0 {
            let current = db_to_linear(self.routing.channel_gain_db(chan.routing_index));
            self.fades
                .enqueue(FadeTask::channel_fade(channel, current, volume, fade_time));
        } else {
            self.routing
                .set_channel_gain_db(chan.routing_index, linear_to_db(volume));
        }
        Ok(())
    }

    /// The channel's master volume as normalized linear gain.
    pub fn channel_volume(&self, channel: &str) -> Result<f64, Error> {
        let chan = lookup(&self.channels, channel)?;
        Ok(db_to_linear(self.routing.channel_gain_db(chan.routing_index)))
    }

    /// Changes the kind of voice the channel's pool creates, rebuilding
    /// the pool (same voice count, all free) when the kind differs.
    pub fn set_voice_kind(&mut self, channel: &str, kind: VoiceKind) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        chan.pool.rebuild(kind, self.factory.as_ref(), channel);
        Ok(())
    }

    /// Caps the channel's pool, evicting voices when shrinking. Zero
    /// removes the cap.
    pub fn set_capacity(&mut self, channel: &str, capacity: usize) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        chan.pool.set_capacity(capacity);
        Ok(())
    }

    /// Creates up to `count` additional voices, never exceeding the
    /// capacity. Returns the number actually created.
    pub fn allocate_voices(&mut self, channel: &str, count: usize) -> Result<usize, Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        let count = if chan.pool.capacity() > 0 {
            count.min(chan.pool.capacity().saturating_sub(chan.pool.len()))
        } else {
            count
        };

        let mut created = 0;
        for _ in 0..count {
            if chan
                .pool
                .create_voice(self.factory.as_ref(), channel)
                .is_none()
            {
                break;
            }
            created += 1;
        }
        Ok(created)
    }

    /// Sets the update mode for the channel's voices.
    pub fn set_update_mode(&mut self, channel: &str, mode: UpdateMode) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        chan.pool.set_update_mode(mode);
        Ok(())
    }

    /// Returns true if the voice at `index` is marked in use.
    pub fn is_voice_used(&self, channel: &str, index: usize) -> Result<bool, Error> {
        Ok(lookup(&self.channels, channel)?.pool.is_used(index))
    }

    /// Returns true if the voice at `index` is actively producing sound.
    pub fn is_voice_playing(&self, channel: &str, index: usize) -> Result<bool, Error> {
        Ok(lookup(&self.channels, channel)?.pool.is_voice_playing(index))
    }

    /// The playback position of the voice at `index`, in seconds.
    pub fn playback_position(&self, channel: &str, index: usize) -> Result<f64, Error> {
        let chan = lookup(&self.channels, channel)?;
        chan.pool
            .unit(index)
            .map(|unit| unit.position())
            .ok_or_else(|| Error::VoiceOutOfRange {
                channel: channel.to_string(),
                index,
            })
    }

    /// Moves the voice at `index` to `position` seconds.
    pub fn seek(&mut self, channel: &str, index: usize, position: f64) -> Result<(), Error> {
        let chan = lookup_mut(&mut self.channels, channel)?;
        let unit = chan.pool.unit_mut(index).ok_or_else(|| Error::VoiceOutOfRange {
            channel: channel.to_string(),
            index,
        })?;
        unit.seek(position);
        Ok(())
    }

    /// The smallest free voice index in the channel, if any.
    pub fn free_voice_index(&self, channel: &str) -> Result<Option<usize>, Error> {
        Ok(lookup(&self.channels, channel)?.pool.peek_free_voice())
    }

    /// Handles the host's report that a voice finished playing naturally.
    /// The voice is released immediately, independent of any in-flight
    /// fade, and the completion is reported.
    pub fn on_playback_finished(&mut self, channel: &str, index: usize) {
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.pool.release(index);
        }
        let _ = self.event_tx.send(PlaybackFinished {
            channel: channel.to_string(),
            voice: index,
        });
    }

    /// Advances all queued fades by `dt` seconds. Does nothing while the
    /// scheduler is idle.
    pub fn on_tick(&mut self, dt: f64) {
        if self.fades.is_idle() {
            return;
        }
        self.fades
            .tick(dt, &mut self.channels, self.routing.as_mut(), &self.event_tx);
    }

    /// Returns true if any fades are queued. Hosts can use this to skip
    /// tick delivery entirely while idle.
    pub fn has_pending_fades(&self) -> bool {
        !self.fades.is_idle()
    }

    /// Stores a configuration for the channel and, if the channel is
    /// live, applies it immediately.
    pub fn set_config(&mut self, channel: &str, config: ChannelConfig) {
        self.configs.set(channel, config);
        if self.channels.contains_key(channel) {
            self.apply_config(channel);
        }
    }

    /// The stored configuration for the channel, if any.
    pub fn config(&self, channel: &str) -> Option<&ChannelConfig> {
        self.configs.get(channel)
    }

    /// The whole configuration store, e.g. for persisting to disk.
    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    /// A snapshot of every channel's pool state, in routing-engine order.
    pub fn details(&self) -> Vec<ChannelDetails> {
        self.routing
            .list_channels()
            .into_iter()
            .filter_map(|(name, _)| {
                self.channels
                    .get(&name)
                    .map(|channel| Self::channel_details(&name, channel))
            })
            .collect()
    }

    /// A snapshot of one channel's pool state.
    pub fn query(&self, channel: &str) -> Result<ChannelDetails, Error> {
        let chan = lookup(&self.channels, channel)?;
        Ok(Self::channel_details(channel, chan))
    }

    fn channel_details(name: &str, channel: &Channel) -> ChannelDetails {
        ChannelDetails {
            name: name.to_string(),
            voice_count: channel.pool.len(),
            capacity: channel.pool.capacity(),
            playing: channel.pool.playing_count(),
            free: channel.pool.free_count(),
            kind: channel.pool.kind(),
        }
    }

    /// Applies the stored configuration to a live channel. Each step
    /// feeds the next: the kind may rebuild the pool, the capacity may
    /// evict, and pre-allocation respects the capacity just set. The
    /// volume applies to the channel's master gain, not to voices.
    fn apply_config(&mut self, name: &str) {
        let Some(config) = self.configs.get(name).cloned() else {
            return;
        };
        let Some(channel) = self.channels.get_mut(name) else {
            return;
        };

        channel
            .pool
            .rebuild(config.voice_kind, self.factory.as_ref(), name);
        channel.pool.set_capacity(config.capacity);

        if config.pre_allocate > 0 {
            let room = if channel.pool.capacity() > 0 {
                config
                    .pre_allocate
                    .min(channel.pool.capacity().saturating_sub(channel.pool.len()))
            } else {
                config.pre_allocate
            };
            for _ in 0..room {
                channel.pool.create_voice(self.factory.as_ref(), name);
            }
        }

        self.routing
            .set_channel_gain_db(channel.routing_index, linear_to_db(config.volume));
        channel.pool.set_update_mode(config.update_mode);
        debug!(channel = name, "Applied channel configuration");
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .field("pending_fades", &self.fades.len())
            .finish()
    }
}
