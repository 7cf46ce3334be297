// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("command `{command}` failed (exit status {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot execute an empty command")]
    EmptyCommand,
}

impl TracerError {
    /// Whether this error represents an external command exiting unsuccessfully.
    pub fn is_command_failure(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }

    /// Captured stderr of a failed command.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Captured stdout of a failed command.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stdout, .. } => Some(stdout),
            _ => None,
        }
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, TracerError>;
