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

//! Channel voice pools and crossfade scheduling for game audio playback.
//!
//! This crate manages pools of playback slots ("voices") per output
//! channel and runs time-based volume transitions over them. It sits
//! between a host game engine and its audio routing layer:
//!
//! - The routing engine owns the authoritative channel list and native
//!   channel gain; it is injected through [`routing::RoutingEngine`].
//! - Concrete sound-producing objects (non-spatial, 2D and 3D players)
//!   are created through an injected [`playback::UnitFactory`] and driven
//!   through [`playback::PlaybackUnit`].
//! - The host delivers structural events (channel list changed, channel
//!   renamed) and a per-frame tick; everything runs single-threaded to
//!   completion.
//!
//! The entry point is [`registry::ChannelRegistry`]. Per-channel
//! declarative settings live in [`config::ConfigStore`] and survive
//! independent of live channel existence.

pub mod config;
pub mod error;
pub mod fade;
pub mod mock;
pub mod playback;
pub mod pool;
pub mod registry;
pub mod routing;
pub mod util;

pub use config::{ChannelConfig, ConfigStore, UpdateMode};
pub use error::Error;
pub use fade::{FadeScheduler, FadeTask};
pub use playback::{ParamValue, PlayParams, PlaybackUnit, UnitFactory, VoiceKind};
pub use pool::{Voice, VoicePool};
pub use registry::{ChannelDetails, ChannelRegistry, PlaybackFinished};
pub use routing::RoutingEngine;
