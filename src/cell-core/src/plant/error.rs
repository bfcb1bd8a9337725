// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Error reported by a plant link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlantError {
    #[error("cannot connect to plant at {address}:{port}: {reason}")]
    Connection {
        address: String,
        port: u16,
        reason: String,
    },

    #[error("cannot resolve plant object '{0}'")]
    HandleResolution(String),

    #[error("cannot start streaming '{0}'")]
    Streaming(&'static str),

    #[error("no fresh value for '{0}'")]
    Stale(&'static str),

    #[error("write to '{signal}' failed: {reason}")]
    Write {
        signal: &'static str,
        reason: String,
    },

    #[error("plant link is not connected")]
    NotConnected,
}

pub type PlantResult<T> = Result<T, PlantError>;

impl PlantError {
    pub fn connection(address: &str, port: u16, reason: impl Into<String>) -> Self {
        Self::Connection {
            address: address.to_string(),
            port,
            reason: reason.into(),
        }
    }

    pub fn write(signal: &'static str, reason: impl Into<String>) -> Self {
        Self::Write {
            signal,
            reason: reason.into(),
        }
    }

    /// Errors worth retrying: a dropped frame or a refused connection may
    /// succeed on the next attempt, a missing plant object never will.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Stale(_) | Self::Write { .. }
        )
    }
}
