// SPDX-License-Identifier: MIT
//
// Error taxonomy for palette construction and terminal probing.
//
// Every variant is fatal for whatever produced it. Nothing here is retried
// and nothing falls back to guessed defaults: a wrong window size or wrong
// register colors would produce visibly wrong output with no hint why.

use std::io;

use thiserror::Error;

/// Errors produced while probing the terminal or building a palette.
#[derive(Debug, Error)]
pub enum Error {
    /// The process has no controlling terminal (`/dev/tty` cannot be opened
    /// or is not a TTY).
    #[error("no controlling terminal")]
    NoControllingTerminal,

    /// The terminal did not start answering a query within the bounded wait.
    #[error("terminal did not answer the {query} query in time")]
    CapabilityQueryTimeout {
        /// Which capability was being queried.
        query: &'static str,
    },

    /// The terminal answered, but not with the expected escape sequence.
    #[error("malformed response to the {query} query: {response:?}")]
    MalformedCapabilityResponse {
        /// Which capability was being queried.
        query: &'static str,
        /// The raw response, lossily decoded for display.
        response: String,
    },

    /// Two colors of different families were blended. Palette construction
    /// only pairs colors of the same family, so this is a construction bug.
    #[error("cannot blend a {foreground} color over a {background} color")]
    BlendTypeMismatch {
        /// Family of the background (the color `blend` was called on).
        background: &'static str,
        /// Family of the foreground.
        foreground: &'static str,
    },

    /// The background color cannot serve as a blend background (truecolor,
    /// an already blended cell, or a bold ANSI color).
    #[error("a {kind} color cannot be used as a blend background")]
    UnsupportedBlendTarget {
        /// Description of the offending color.
        kind: &'static str,
    },

    /// The query has no implementation on this platform.
    #[error("the {query} query is not supported on this platform")]
    Unsupported {
        /// Which capability was being queried.
        query: &'static str,
    },

    /// Underlying I/O failure talking to the terminal.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::MalformedCapabilityResponse`] from raw response bytes.
    pub(crate) fn malformed(query: &'static str, response: &[u8]) -> Self {
        Self::MalformedCapabilityResponse {
            query,
            response: String::from_utf8_lossy(response).into_owned(),
        }
    }
}
