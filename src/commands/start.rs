//! Headless session.
//!
//! Reads JSON commands from stdin as if they came from the canvas GUI and,
//! unless `--offline`, links the session to a relay. Redraw and status
//! notifications go to the log. The session ends at stdin EOF.
//!
//! ```bash
//! echo '{"func":"clear","layer":"…"}' | canvas-sync start --offline
//! ```

use anyhow::Result;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::command::Command;
use crate::config::Config;
use crate::framing::{BracketDecoder, FramingMode};
use crate::input::CanvasInput;
use crate::picture::Picture;
use crate::runner::{listener, ToolRunner};
use crate::session::{Session, SessionEvent};
use crate::transport;

/// Commands after which the canvas must be redrawn.
const REDRAW_FUNCS: &[&str] = &[
    "tool_down",
    "tool_up",
    "tool_move",
    "undo",
    "clear",
    "reorder_layers",
    "remove_layer",
];

/// Commands reported on the status line.
const STATUS_FUNCS: &[&str] = &[
    "tool_down",
    "tool_up",
    "tool_move",
    "undo",
    "clear",
    "reorder_layers",
    "remove_layer",
    "create_layer",
];

/// Attach the redraw and status listeners a canvas front-end needs.
pub fn install_listeners(runner: &mut ToolRunner) {
    runner.add_function_listener(
        REDRAW_FUNCS,
        listener(|ev| {
            log::debug!(
                "[Canvas] Redraw after {} by {} ({} layer(s))",
                ev.func,
                ev.runner.user(),
                ev.picture.len()
            );
        }),
    );
    runner.add_function_listener(
        STATUS_FUNCS,
        listener(|ev| log::info!("[Canvas] last action: {} ({})", ev.func, ev.runner.user())),
    );
}

/// Run a headless session until stdin closes.
pub async fn run(config: Config, offline: bool) -> Result<()> {
    let mut session = Session::new(Picture::new(config.width, config.height));
    session.on_user_joined(install_listeners);
    session.create_local_user();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();
    if offline {
        println!("Running offline");
    } else {
        let (handle, outcome) =
            transport::connect(&config.host, config.port, config.framing, events_tx.clone());
        match outcome.await {
            Ok(Ok(addr)) => {
                println!("Connected to {}", addr);
                session.attach_transport(Box::new(handle));
            }
            Ok(Err(e)) => println!("Connection failed, running offline: {e}"),
            Err(_) => println!("Connection task ended early, running offline"),
        }
    }
    // Only the transport keeps the event queue open from here on.
    drop(events_tx);

    // The first layer is created locally, like a fresh canvas window.
    let mut input = CanvasInput::new();
    if let Err(e) = session.gui_input(input.create_layer()) {
        log::error!("[Canvas] Could not create the initial layer: {e}");
    }
    if let Some(layer) = input.selected_layer() {
        println!("Initial layer: {}", layer);
    }

    let (gui_tx, mut gui_rx) = mpsc::unbounded_channel::<Command>();
    tokio::spawn(read_stdin(gui_tx));

    let mut events_open = true;
    loop {
        tokio::select! {
            command = gui_rx.recv() => match command {
                Some(command) => {
                    if let Err(e) = session.gui_input(command) {
                        log::warn!("[Canvas] Local command rejected: {e}");
                        println!("rejected: {e}");
                    }
                }
                None => break,
            },
            event = events_rx.recv(), if events_open => match event {
                Some(event) => session.handle_event(event),
                None => events_open = false,
            },
        }
    }
    session.drain(&mut events_rx);

    println!("{} user(s), {} layer(s)", session.user_count(), session.picture().len());
    for layer in session.picture().layers() {
        println!("  {} ({}) sha256={}", layer.id(), layer.name, layer.raster.digest());
    }
    Ok(())
}

/// Cut stdin into commands. Local input is always framed string-aware.
async fn read_stdin(gui_tx: mpsc::UnboundedSender<Command>) {
    let mut stdin = tokio::io::stdin();
    let mut decoder = BracketDecoder::with_mode(FramingMode::StringAware);
    let mut buf = [0u8; 4096];

    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for decoded in decoder.feed(&buf[..n]) {
                    match decoded {
                        Ok(command) => {
                            if gui_tx.send(command).is_err() {
                                return;
                            }
                        }
                        Err(e) => println!("ignored: {e}"),
                    }
                }
            }
            Err(e) => {
                log::error!("[Canvas] stdin read error: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listeners_cover_redraw_and_status() {
        let mut runner = ToolRunner::new("u");
        install_listeners(&mut runner);
        assert_eq!(runner.listener_count("tool_move"), 2);
        assert_eq!(runner.listener_count("create_layer"), 1);
        assert_eq!(runner.listener_count("rename_layer"), 0);

        let mut picture = Picture::new(4, 4);
        let create = Command::try_from(json!({"func": "create_layer", "layer": "L"})).unwrap();
        runner.execute(&mut picture, &create).unwrap();
    }
}
