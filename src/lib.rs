//! canvas-sync - shared layered canvas for several participants.
//!
//! Every participant's drawing actions travel as small JSON commands over
//! one relay stream. Each participant owns an interpreter that applies its
//! commands to the one shared picture, so all peers that see the same
//! command order end up with the same pixels.
//!
//! # Architecture
//!
//! - **Session** - Owns the picture and one interpreter per participant, routes commands
//! - **ToolRunner** - Stroke state machine, per-layer undo by replay, function listeners
//! - **Framing** - Cuts the unframed byte stream into commands by bracket depth
//! - **Transport** - TCP link to the relay, hands decoded commands to the session
//!
//! # Modules
//!
//! - [`command`] - Wire command model
//! - [`framing`] - Bracket-depth stream decoder
//! - [`history`] - Per-layer undo levels
//! - [`picture`] - Picture, layers and rasters
//! - [`tools`] - Drawing tools
//! - [`runner`] - Per-participant interpreter
//! - [`session`] - User registry and routing
//! - [`input`] - Local command builders
//! - [`transport`] - TCP transport
//! - [`config`] - Configuration loading/saving

// Library modules
pub mod command;
pub mod commands;
pub mod framing;
pub mod history;
pub mod input;
pub mod picture;
pub mod runner;
pub mod session;
pub mod tools;
pub mod transport;

pub mod config;
pub mod constants;
pub mod error;

// Re-export commonly used types
pub use command::{Command, CommandKind, LayerId, UserId};
pub use config::Config;
pub use error::{CommandError, FramingError, SessionError, TransportError};
pub use framing::{BracketDecoder, FramingMode};
pub use input::CanvasInput;
pub use picture::{Layer, Picture, Raster};
pub use runner::{listener, FunctionEvent, FunctionListener, ListenerId, ToolRunner};
pub use session::{Outbound, Session, SessionEvent};
pub use transport::TransportHandle;
