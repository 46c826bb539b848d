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

//! Time-based gain transitions.
//!
//! The scheduler holds a queue of active fades, processed once per host
//! tick in insertion order. Task state stores normalized linear gain
//! only; conversion to the host's decibel unit happens at application
//! time. Tasks refer to their targets by channel name and voice index, so
//! a task whose target has since been destroyed is treated as already
//! complete and dropped without side effects.

use std::collections::HashMap;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::registry::{Channel, PlaybackFinished};
use crate::routing::RoutingEngine;
use crate::util::{lerp, linear_to_db};

/// A scheduled linear-domain gain transition over a fixed duration.
///
/// Targets either a single voice or, when no voice index is carried, the
/// channel's master gain.
#[derive(Debug, Clone)]
pub struct FadeTask {
    channel: String,
    voice: Option<usize>,
    from: f64,
    to: f64,
    duration: f64,
    elapsed: f64,
    release_on_complete: bool,
}

impl FadeTask {
    /// Creates a fade targeting one voice. The voice is released on
    /// completion exactly when the fade ends in silence.
    pub fn voice_fade(channel: &str, index: usize, from: f64, to: f64, duration: f64) -> Self {
        Self {
            channel: channel.to_string(),
            voice: Some(index),
            from,
            to,
            duration,
            elapsed: 0.0,
            release_on_complete: to <= 0.0,
        }
    }

    /// Creates a fade targeting the channel's master gain. Channel fades
    /// never change any voice's free/busy state.
    pub fn channel_fade(channel: &str, from: f64, to: f64, duration: f64) -> Self {
        Self {
            channel: channel.to_string(),
            voice: None,
            from,
            to,
            duration,
            elapsed: 0.0,
            release_on_complete: false,
        }
    }

    /// The channel this fade targets.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The voice this fade targets, or `None` for a channel fade.
    pub fn voice(&self) -> Option<usize> {
        self.voice
    }

    /// The starting linear gain.
    pub fn start_gain(&self) -> f64 {
        self.from
    }

    /// The ending linear gain.
    pub fn end_gain(&self) -> f64 {
        self.to
    }
}

/// The queue of active gain transitions.
#[derive(Debug, Default)]
pub struct FadeScheduler {
    tasks: Vec<FadeTask>,
}

impl FadeScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no fades are queued. The host can skip ticking
    /// entirely while this holds.
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The number of queued fades.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when no fades are queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queues a fade. Non-positive durations are rejected; the caller is
    /// expected to apply the end value immediately instead of scheduling.
    pub fn enqueue(&mut self, task: FadeTask) -> bool {
        if task.duration <= 0.0 {
            warn!(
                channel = task.channel,
                duration = task.duration,
                "Rejected fade with non-positive duration"
            );
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Advances every queued fade by `dt` seconds, in insertion order.
    ///
    /// Interpolation happens in the linear domain; the result is
    /// converted to decibels only when applied to the target. Completed
    /// tasks are removed without reordering the remainder. A completed
    /// fade-to-silence releases its voice and reports the playback as
    /// finished.
    pub(crate) fn tick(
        &mut self,
        dt: f64,
        channels: &mut HashMap<String, Channel>,
        routing: &mut dyn RoutingEngine,
        events: &Sender<PlaybackFinished>,
    ) {
        let mut index = 0;
        while index < self.tasks.len() {
            let task = &mut self.tasks[index];
            task.elapsed += dt;
            let alpha = (task.elapsed / task.duration).clamp(0.0, 1.0);
            let db = linear_to_db(lerp(task.from, task.to, alpha));

            let applied = match channels.get_mut(&task.channel) {
                None => false,
                Some(channel) => match task.voice {
                    None => {
                        routing.set_channel_gain_db(channel.routing_index, db);
                        true
                    }
                    Some(voice) => match channel.pool.unit_mut(voice) {
                        None => false,
                        Some(unit) => {
                            unit.set_gain_db(db);
                            true
                        }
                    },
                },
            };

            if !applied {
                // The target is gone; treat the fade as already complete.
                let task = self.tasks.remove(index);
                debug!(
                    channel = task.channel,
                    voice = ?task.voice,
                    "Dropped fade for destroyed target"
                );
                continue;
            }

            if alpha >= 1.0 {
                let task = self.tasks.remove(index);
                if task.release_on_complete {
                    if let Some(voice) = task.voice {
                        if let Some(channel) = channels.get_mut(&task.channel) {
                            channel.pool.release(voice);
                        }
                        let _ = events.send(PlaybackFinished {
                            channel: task.channel,
                            voice,
                        });
                    }
                }
                continue;
            }

            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFactory, MockRoutingEngine};
    use crate::playback::VoiceKind;
    use crate::pool::VoicePool;

    struct Fixture {
        channels: HashMap<String, Channel>,
        routing: MockRoutingEngine,
        factory: MockFactory,
        scheduler: FadeScheduler,
        events: (
            Sender<PlaybackFinished>,
            crossbeam_channel::Receiver<PlaybackFinished>,
        ),
    }

    impl Fixture {
        fn new(channel: &str, voices: usize) -> Self {
            let factory = MockFactory::new();
            let routing = MockRoutingEngine::with_channels(&[channel]);
            let mut pool = VoicePool::new(VoiceKind::NonSpatial);
            for _ in 0..voices {
                pool.create_voice(&factory, channel);
            }
            let mut channels = HashMap::new();
            channels.insert(
                channel.to_string(),
                Channel {
                    routing_index: 0,
                    pool,
                },
            );
            Self {
                channels,
                routing,
                factory,
                scheduler: FadeScheduler::new(),
                events: crossbeam_channel::unbounded(),
            }
        }

        fn tick(&mut self, dt: f64) {
            let mut routing = self.routing.clone();
            self.scheduler
                .tick(dt, &mut self.channels, &mut routing, &self.events.0);
        }

        fn voice_gain(&self, channel: &str, index: usize) -> f64 {
            self.factory
                .unit(channel, index)
                .map(|h| h.gain_linear())
                .unwrap_or(f64::NAN)
        }
    }

    #[test]
    fn test_fade_bounds_and_monotonicity() {
        let mut fx = Fixture::new("sfx", 1);
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 0.2, 0.9, 1.0));

        let mut last = 0.2;
        for _ in 0..10 {
            fx.tick(0.1);
            let gain = fx.voice_gain("sfx", 0);
            assert!(gain >= last - 1e-9);
            last = gain;
        }
        assert!((last - 0.9).abs() < 1e-6);
        assert!(fx.scheduler.is_idle());
    }

    #[test]
    fn test_overshoot_clamps_to_end_value() {
        let mut fx = Fixture::new("sfx", 1);
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 0.0, 1.0, 0.5));

        fx.tick(10.0);
        assert!((fx.voice_gain("sfx", 0) - 1.0).abs() < 1e-9);
        assert!(fx.scheduler.is_idle());
    }

    #[test]
    fn test_fade_out_releases_voice_and_reports() {
        let mut fx = Fixture::new("sfx", 1);
        {
            let channel = fx.channels.get_mut("sfx").expect("channel");
            channel.pool.acquire(0);
            if let Some(unit) = channel.pool.unit_mut(0) {
                unit.set_source(Some("steps".to_string()));
                unit.play(0.0);
            }
        }

        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 1.0, 0.0, 1.0));
        fx.tick(0.5);
        assert!(fx.channels["sfx"].pool.is_used(0));
        fx.tick(0.5);

        let pool = &fx.channels["sfx"].pool;
        assert!(!pool.is_used(0));
        assert_eq!(1, pool.free_count());
        let event = fx.events.1.try_recv().expect("finished event");
        assert_eq!("sfx", event.channel);
        assert_eq!(0, event.voice);
    }

    #[test]
    fn test_channel_fade_never_touches_voices() {
        let mut fx = Fixture::new("music", 2);
        {
            let channel = fx.channels.get_mut("music").expect("channel");
            channel.pool.acquire(0);
        }

        fx.scheduler
            .enqueue(FadeTask::channel_fade("music", 1.0, 0.0, 1.0));
        fx.tick(0.5);
        let halfway = fx.routing.gain_linear("music").expect("gain");
        assert!((halfway - 0.5).abs() < 1e-6);

        fx.tick(0.5);
        assert!((fx.routing.gain_linear("music").expect("gain")).abs() < 1e-9);
        assert!(fx.scheduler.is_idle());
        assert!(fx.events.1.try_recv().is_err());

        // Busy voice stayed busy through the whole channel fade.
        assert!(fx.channels["music"].pool.is_used(0));
    }

    #[test]
    fn test_orphaned_task_dropped_without_side_effects() {
        let mut fx = Fixture::new("sfx", 1);
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 1.0, 0.0, 1.0));

        fx.channels.remove("sfx");
        fx.tick(0.1);

        assert!(fx.scheduler.is_idle());
        assert!(fx.events.1.try_recv().is_err());
    }

    #[test]
    fn test_out_of_range_voice_is_orphaned() {
        let mut fx = Fixture::new("sfx", 1);
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 5, 1.0, 0.0, 1.0));
        fx.tick(0.1);
        assert!(fx.scheduler.is_idle());
    }

    #[test]
    fn test_insertion_order_applies_later_task_last() {
        let mut fx = Fixture::new("sfx", 1);
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 0.0, 1.0, 1.0));
        fx.scheduler
            .enqueue(FadeTask::voice_fade("sfx", 0, 1.0, 0.4, 1.0));

        fx.tick(0.5);
        // Both tasks applied, in order; the later enqueue wins the slot.
        let gain = fx.voice_gain("sfx", 0);
        assert!((gain - 0.7).abs() < 1e-6);
        assert_eq!(2, fx.scheduler.len());
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let mut scheduler = FadeScheduler::new();
        assert!(!scheduler.enqueue(FadeTask::voice_fade("sfx", 0, 0.0, 1.0, 0.0)));
        assert!(!scheduler.enqueue(FadeTask::channel_fade("sfx", 0.0, 1.0, -1.0)));
        assert!(scheduler.is_empty());
    }
}
