//! Offline replay of a recorded command stream.
//!
//! A recording is the raw byte stream a client saw: back-to-back JSON
//! values, optionally with array batches. It is cut with the same
//! [`BracketDecoder`] the transport uses. Commands carrying a `user` are
//! routed like relay traffic; commands without one are applied as local
//! input.
//!
//! ```bash
//! canvas-sync replay session.log
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::framing::{BracketDecoder, FramingMode};
use crate::picture::Picture;
use crate::session::Session;

/// Summary of one layer after replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerReport {
    /// Layer id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Undo levels left.
    pub levels: usize,
    /// Commands stored across those levels.
    pub commands: usize,
    /// Non-transparent pixels.
    pub painted: usize,
    /// Raster digest, see [`crate::picture::Raster::digest`].
    pub digest: String,
}

/// Session state and counters after a replay.
#[derive(Debug)]
pub struct ReplayOutcome {
    /// Session the stream was applied to.
    pub session: Session,
    /// Commands applied without error.
    pub applied: usize,
    /// Tokens or commands that were dropped.
    pub rejected: usize,
}

impl ReplayOutcome {
    /// Per-layer summary, bottom layer first.
    pub fn layers(&self) -> Vec<LayerReport> {
        self.session
            .picture()
            .layers()
            .map(|layer| LayerReport {
                id: layer.id().to_string(),
                name: layer.name.clone(),
                levels: layer.history.level_count(),
                commands: layer.history.command_count(),
                painted: layer.raster.painted_pixels(),
                digest: layer.raster.digest(),
            })
            .collect()
    }
}

/// Apply a recorded stream to a fresh offline session.
pub fn replay_bytes(bytes: &[u8], picture: Picture, framing: FramingMode) -> ReplayOutcome {
    let mut session = Session::new(picture);
    session.create_local_user();

    let mut decoder = BracketDecoder::with_mode(framing);
    let mut applied = 0;
    let mut rejected = 0;

    for decoded in decoder.feed(bytes) {
        let result = match decoded {
            Ok(command) if command.user.is_some() => session.handle_inbound(command),
            Ok(command) => session.gui_input(command),
            Err(e) => {
                log::warn!("[Replay] Skipping token: {e}");
                rejected += 1;
                continue;
            }
        };
        match result {
            Ok(()) => applied += 1,
            Err(e) => {
                log::warn!("[Replay] Command rejected: {e}");
                rejected += 1;
            }
        }
    }

    if decoder.has_partial() {
        log::warn!("[Replay] Stream ended inside an unterminated token");
        rejected += 1;
    }

    ReplayOutcome {
        session,
        applied,
        rejected,
    }
}

/// Replay `path` with the picture size and framing from `config`, printing
/// a per-layer summary.
pub fn run(path: &Path, config: &Config) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let outcome = replay_bytes(
        &bytes,
        Picture::new(config.width, config.height),
        config.framing,
    );

    println!(
        "Replayed {}: {} applied, {} rejected, {} user(s)",
        path.display(),
        outcome.applied,
        outcome.rejected,
        outcome.session.user_count()
    );
    for layer in outcome.layers() {
        println!(
            "  {} ({}) levels={} commands={} painted={} sha256={}",
            layer.id, layer.name, layer.levels, layer.commands, layer.painted, layer.digest
        );
    }
    Ok(())
}
