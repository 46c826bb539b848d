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

//! Interface to the external routing engine.
//!
//! The routing engine owns the authoritative list of output channels and
//! their native (decibel) gain. The registry only ever sees it through
//! this trait, so synchronization can be driven without a live engine.

/// The external authority over output channels.
///
/// Channel identity is the name; the index is a per-snapshot detail that
/// the registry caches and revalidates on every synchronize.
pub trait RoutingEngine {
    /// Returns the current channel list as (name, index) pairs, in the
    /// engine's own order.
    fn list_channels(&self) -> Vec<(String, usize)>;

    /// Returns the native gain of the channel at `index`, in decibels.
    fn channel_gain_db(&self, index: usize) -> f64;

    /// Sets the native gain of the channel at `index`, in decibels.
    fn set_channel_gain_db(&mut self, index: usize, db: f64);
}
