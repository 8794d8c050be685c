//! Error types for every layer of the command pipeline.
//!
//! Each stage owns its own enum so callers can tell a framing fault (the
//! stream keeps going) from a command fault (only that command is dropped)
//! from a transport fault (the session degrades to local-only).

use thiserror::Error;

/// Failure while cutting the inbound byte stream into commands.
///
/// The decoder logs these and carries on with the next token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// A bracket-balanced token that is not valid JSON.
    #[error("malformed token: {reason} (buffer: {buffer})")]
    Malformed {
        /// Raw contents of the discarded buffer (lossy UTF-8).
        buffer: String,
        /// Parser message.
        reason: String,
    },
    /// Valid JSON that does not describe a command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Failure while applying a command to the picture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// `tool_down` named a tool that is not in the lookup table.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The command targets a layer id the picture does not hold.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    /// `create_layer` reused an id seen before in this picture.
    #[error("layer id already used: {0}")]
    DuplicateLayer(String),
    /// `reorder_layers` order is not a permutation of the current ids.
    #[error("invalid layer order: {0}")]
    InvalidReorder(String),
}

/// Failure while routing a command through the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The command names a user with no registered interpreter.
    #[error("unknown user: {0}")]
    UnknownUser(String),
    /// A routed command carried no `user` field.
    #[error("command '{0}' has no user field")]
    MissingUser(String),
    /// The target interpreter rejected the command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Failure on the network side.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Host name resolution failed.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// Host that was looked up.
        host: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Every resolved address refused or failed the connect.
    #[error("could not connect to any of {attempts} address(es) for {host}")]
    AllAddressesFailed {
        /// Host that was looked up.
        host: String,
        /// Number of addresses tried.
        attempts: usize,
    },
}
