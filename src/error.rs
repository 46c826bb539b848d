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
/// Error types for channel registry and configuration operations.
///
/// None of these are fatal to the subsystem; a failed request simply did
/// not happen.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("voice index {index} out of range for channel {channel}")]
    VoiceOutOfRange { channel: String, index: usize },

    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config format error: {0}")]
    Yaml(#[from] serde_yml::Error),
}
