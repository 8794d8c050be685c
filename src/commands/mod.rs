//! CLI subcommand implementations for canvas-sync.
//!
//! - [`start`] - Headless session: stdin as GUI input, optional relay link
//! - [`replay`] - Rebuild a picture offline from a recorded command stream
//!
//! # Usage
//!
//! ```ignore
//! use canvas_sync::commands;
//!
//! commands::replay::run(&path, &config)?;
//! commands::start::run(config, offline).await?;
//! ```

pub mod replay;
pub mod start;

#[doc(inline)]
pub use replay::{replay_bytes, LayerReport, ReplayOutcome};
#[doc(inline)]
pub use start::install_listeners;
