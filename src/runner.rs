//! Per-participant command interpreter.
//!
//! Every participant, local or remote, gets one [`ToolRunner`]. It holds the
//! participant's stroke state and applies commands to the shared
//! [`Picture`]. After a command is applied, listeners registered for its
//! `func` are called in registration order; this is how redraw and status
//! updates are driven.
//!
//! # Stroke state machine
//!
//! ```text
//!            tool_down                 tool_up
//!   Idle ───────────────► StrokeActive ───────► Idle
//!                          │    ▲
//!                          └────┘ tool_move
//! ```
//!
//! `tool_move`/`tool_up` while idle are accepted and do nothing. A
//! `tool_down` that fails (unknown tool or layer) changes nothing, so a
//! stroke already open stays open; a successful one abandons it.
//!
//! # Undo
//!
//! Undo never inverts a command. It clears the layer, drops the newest undo
//! level, and replays what remains through [`ToolRunner::execute`] with
//! events switched off. Replay cost is linear in the layer's history.
//!
//! An undo on the layer of this runner's own open stroke ends that stroke.
//! Its remaining `tool_move`/`tool_up` are then ignored, so nothing gets
//! painted or stored without the `tool_down` that replay needs.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::rc::Rc;

use crate::command::{Command, CommandKind, LayerId, UserId};
use crate::error::CommandError;
use crate::picture::Picture;
use crate::tools::{ActiveTool, StrokePoint, Tool, ToolKind, ToolOptions};

/// Notification passed to function listeners.
#[derive(Debug)]
pub struct FunctionEvent<'a> {
    /// Interpreter that applied the command.
    pub runner: &'a ToolRunner,
    /// Picture after the command was applied.
    pub picture: &'a Picture,
    /// Wire name of the command kind.
    pub func: &'a str,
    /// The command as received.
    pub command: &'a Command,
}

/// Callback invoked after a matching command is applied.
///
/// Shared by reference: registering one listener for several names stores
/// the same closure under each.
pub type FunctionListener = Rc<dyn Fn(&FunctionEvent<'_>)>;

/// Wrap a closure as a [`FunctionListener`].
pub fn listener<F>(f: F) -> FunctionListener
where
    F: Fn(&FunctionEvent<'_>) + 'static,
{
    Rc::new(f)
}

/// Handle returned by [`ToolRunner::add_function_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Transient stroke state of one participant.
#[derive(Debug, Clone)]
pub enum StrokeState {
    /// No stroke in progress.
    Idle,
    /// A stroke is being drawn.
    StrokeActive {
        /// Layer fixed at `tool_down`.
        layer: LayerId,
        /// Tool instance for this stroke.
        tool: ActiveTool,
    },
}

/// Deterministic interpreter for one participant's commands.
pub struct ToolRunner {
    user: UserId,
    state: StrokeState,
    events_enabled: bool,
    listeners: HashMap<String, Vec<(ListenerId, FunctionListener)>>,
    next_listener: u64,
}

impl std::fmt::Debug for ToolRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRunner")
            .field("user", &self.user)
            .field("state", &self.state)
            .field("events_enabled", &self.events_enabled)
            .field("listened_funcs", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ToolRunner {
    /// Create an idle interpreter with events enabled.
    pub fn new(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            state: StrokeState::Idle,
            events_enabled: true,
            listeners: HashMap::new(),
            next_listener: 0,
        }
    }

    /// Participant this interpreter belongs to.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Current stroke state.
    pub fn state(&self) -> &StrokeState {
        &self.state
    }

    /// True while a stroke is in progress.
    pub fn is_stroking(&self) -> bool {
        matches!(self.state, StrokeState::StrokeActive { .. })
    }

    /// Layer and tool of the stroke in progress.
    pub fn active_stroke(&self) -> Option<(&str, ToolKind)> {
        match &self.state {
            StrokeState::Idle => None,
            StrokeState::StrokeActive { layer, tool } => Some((layer.as_str(), tool.kind())),
        }
    }

    /// Whether listeners are called after each command.
    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    /// Switch listener dispatch on or off.
    pub fn set_events_enabled(&mut self, enabled: bool) {
        self.events_enabled = enabled;
    }

    /// Register `listener` for every name in `funcs`.
    pub fn add_function_listener(
        &mut self,
        funcs: &[&str],
        listener: FunctionListener,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        for func in funcs {
            self.listeners
                .entry((*func).to_string())
                .or_default()
                .push((id, Rc::clone(&listener)));
        }
        id
    }

    /// Unregister a listener from the given names.
    ///
    /// Returns true if at least one registration was removed.
    pub fn remove_function_listener(&mut self, id: ListenerId, funcs: &[&str]) -> bool {
        let mut removed = false;
        for func in funcs {
            if let Some(list) = self.listeners.get_mut(*func) {
                let before = list.len();
                list.retain(|(lid, _)| *lid != id);
                removed |= list.len() != before;
                if list.is_empty() {
                    self.listeners.remove(*func);
                }
            }
        }
        removed
    }

    /// Number of listeners registered for `func`.
    pub fn listener_count(&self, func: &str) -> usize {
        self.listeners.get(func).map_or(0, Vec::len)
    }

    /// Apply one command, then notify listeners.
    ///
    /// Listeners are not called when the command fails.
    pub fn execute(&mut self, picture: &mut Picture, command: &Command) -> Result<(), CommandError> {
        self.apply(picture, command)?;
        if self.events_enabled {
            self.fire(picture, command);
        }
        Ok(())
    }

    /// Apply a batch in order, stopping at the first failure.
    pub fn execute_all(
        &mut self,
        picture: &mut Picture,
        commands: &[Command],
    ) -> Result<(), CommandError> {
        for command in commands {
            self.execute(picture, command)?;
        }
        Ok(())
    }

    fn apply(&mut self, picture: &mut Picture, command: &Command) -> Result<(), CommandError> {
        match &command.kind {
            CommandKind::ToolDown {
                x,
                y,
                pressure,
                layer,
                tool,
                options,
            } => {
                let point = StrokePoint::new(*x, *y, *pressure);
                self.tool_down(picture, command, point, layer, tool, options)
            }
            CommandKind::ToolMove { x, y, pressure, .. } => {
                self.tool_move(picture, command, StrokePoint::new(*x, *y, *pressure))
            }
            CommandKind::ToolUp { x, y, pressure, .. } => {
                self.tool_up(picture, command, StrokePoint::new(*x, *y, *pressure))
            }
            CommandKind::Clear { layer } => {
                picture.clear(layer)?;
                picture.layer_mut(layer)?.history.store_undo_data(command.clone());
                Ok(())
            }
            CommandKind::Undo { layer } => self.undo(picture, layer),
            CommandKind::CreateLayer { layer } => picture.add_layer(layer),
            CommandKind::RemoveLayer { layer } => picture.remove_layer(layer).map(drop),
            CommandKind::ReorderLayers { order } => picture.reorder_layers(order),
            CommandKind::RenameLayer { layer, name } => picture.rename_layer(layer, name),
            CommandKind::Credentials { .. }
            | CommandKind::UserJoin { .. }
            | CommandKind::UserQuit { .. }
            | CommandKind::Other { .. } => {
                log::trace!("[Runner] {} ignores '{}'", self.user, command.func());
                Ok(())
            }
        }
    }

    fn tool_down(
        &mut self,
        picture: &mut Picture,
        command: &Command,
        point: StrokePoint,
        layer_id: &str,
        tool_name: &str,
        options: &serde_json::Value,
    ) -> Result<(), CommandError> {
        let kind = ToolKind::from_name(tool_name)?;
        let layer = picture.layer_mut(layer_id)?;

        if let Some((old_layer, _)) = self.active_stroke() {
            log::debug!(
                "[Runner] {} started a stroke while one was open on {}, abandoning it",
                self.user,
                old_layer
            );
        }

        let mut tool = kind.instantiate();
        tool.down(layer, point, &ToolOptions::from_value(options));
        layer.history.begin_new_undo_level();
        layer.history.store_undo_data(command.clone());

        self.state = StrokeState::StrokeActive {
            layer: layer_id.to_string(),
            tool,
        };
        Ok(())
    }

    fn tool_move(
        &mut self,
        picture: &mut Picture,
        command: &Command,
        point: StrokePoint,
    ) -> Result<(), CommandError> {
        let StrokeState::StrokeActive { layer, tool } = &mut self.state else {
            return Ok(());
        };
        let result = picture.layer_mut(layer).map(|layer| {
            tool.move_to(layer, point);
            layer.history.store_undo_data(command.clone());
        });
        if result.is_err() {
            // The stroke's layer was removed underneath it.
            self.state = StrokeState::Idle;
        }
        result
    }

    fn tool_up(
        &mut self,
        picture: &mut Picture,
        command: &Command,
        point: StrokePoint,
    ) -> Result<(), CommandError> {
        let StrokeState::StrokeActive { layer, mut tool } =
            std::mem::replace(&mut self.state, StrokeState::Idle)
        else {
            return Ok(());
        };
        let layer = picture.layer_mut(&layer)?;
        tool.up(layer, point);
        layer.history.store_undo_data(command.clone());
        Ok(())
    }

    fn undo(&mut self, picture: &mut Picture, layer_id: &str) -> Result<(), CommandError> {
        let layer = picture.layer_mut(layer_id)?;
        layer.raster.clear();
        layer.history.pop_undo_level();
        let remaining = layer.history.flatten();
        layer.history.clear();

        // Replay starts from a clean slate; our own stroke (maybe on another
        // layer) resumes afterwards.
        let saved_state = std::mem::replace(&mut self.state, StrokeState::Idle);
        let saved_events = self.events_enabled;
        self.events_enabled = false;

        for command in &remaining {
            if let Err(e) = self.execute(picture, command) {
                log::warn!(
                    "[Runner] Replay of '{}' on {} failed: {e}",
                    command.func(),
                    layer_id
                );
            }
        }

        self.events_enabled = saved_events;
        self.state = match saved_state {
            StrokeState::StrokeActive { layer, .. } if layer == layer_id => {
                log::debug!(
                    "[Runner] {} undid on {} with its own stroke open there, ending the stroke",
                    self.user,
                    layer_id
                );
                StrokeState::Idle
            }
            other => other,
        };
        log::debug!(
            "[Runner] {} undid on {}, replayed {} command(s)",
            self.user,
            layer_id,
            remaining.len()
        );
        Ok(())
    }

    fn fire(&self, picture: &Picture, command: &Command) {
        let func = command.func();
        let Some(listeners) = self.listeners.get(func) else {
            return;
        };
        let event = FunctionEvent {
            runner: self,
            picture,
            func,
            command,
        };
        for (_, listener) in listeners {
            listener(&event);
        }
    }
}
