//! Builders turning local pointer and layer-panel actions into commands.
//!
//! [`CanvasInput`] holds the bits of GUI state a command needs: the
//! selected layer, the view magnification and the current tool. Pointer
//! coordinates arrive in view pixels and are scaled back to picture pixels
//! (truncating toward zero) before they go on the wire.
//!
//! Builders only produce commands. Feeding them to
//! [`Session::gui_input`](crate::session::Session::gui_input) is the caller's job.

use serde_json::Value;
use uuid::Uuid;

use crate::command::{Command, CommandKind, LayerId};
use crate::tools::{ToolKind, ToolOptions};

/// GUI-side state used to build local commands.
#[derive(Debug, Clone)]
pub struct CanvasInput {
    selected_layer: Option<LayerId>,
    magnification: f32,
    tool: ToolKind,
    options: ToolOptions,
}

impl Default for CanvasInput {
    fn default() -> Self {
        Self {
            selected_layer: None,
            magnification: 1.0,
            tool: ToolKind::Pen,
            options: ToolOptions::default(),
        }
    }
}

impl CanvasInput {
    /// Pen tool, default options, 1:1 view, nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer strokes, undo and clear go to.
    pub fn selected_layer(&self) -> Option<&str> {
        self.selected_layer.as_deref()
    }

    /// Select the layer strokes, undo and clear go to.
    pub fn select_layer(&mut self, layer: impl Into<LayerId>) {
        self.selected_layer = Some(layer.into());
    }

    /// Current view magnification.
    pub fn magnification(&self) -> f32 {
        self.magnification
    }

    /// Set the view magnification. Non-positive or non-finite values are ignored.
    pub fn set_magnification(&mut self, magnification: f32) {
        if magnification.is_finite() && magnification > 0.0 {
            self.magnification = magnification;
        } else {
            log::warn!("[Input] Ignoring invalid magnification {}", magnification);
        }
    }

    /// Tool used by the next `pointer_down`.
    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Switch tool.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    /// Options sent with the next `pointer_down`.
    pub fn options(&self) -> &ToolOptions {
        &self.options
    }

    /// Replace the tool options.
    pub fn set_options(&mut self, options: ToolOptions) {
        self.options = options;
    }

    /// `tool_down` on the selected layer, or `None` with no selection.
    pub fn pointer_down(&self, x: i32, y: i32, pressure: f32) -> Option<Command> {
        let layer = self.selection("tool_down")?;
        let (x, y) = self.to_picture(x, y);
        let options = match self.tool {
            ToolKind::Pointer => Value::String(String::new()),
            ToolKind::Brush | ToolKind::Pen => self.options.to_value(),
        };
        Some(Command::new(CommandKind::ToolDown {
            x,
            y,
            pressure,
            layer,
            tool: self.tool.name().to_string(),
            options,
        }))
    }

    /// `tool_move`. Carries no layer; the stroke's layer was fixed at `tool_down`.
    pub fn pointer_move(&self, x: i32, y: i32, pressure: f32) -> Command {
        let (x, y) = self.to_picture(x, y);
        Command::new(CommandKind::ToolMove {
            x,
            y,
            pressure,
            layer: None,
        })
    }

    /// `tool_up`, tagged with the selected layer when there is one.
    pub fn pointer_up(&self, x: i32, y: i32, pressure: f32) -> Command {
        let (x, y) = self.to_picture(x, y);
        Command::new(CommandKind::ToolUp {
            x,
            y,
            pressure,
            layer: self.selected_layer.clone(),
        })
    }

    /// `undo` on the selected layer.
    pub fn undo(&self) -> Option<Command> {
        let layer = self.selection("undo")?;
        Some(Command::new(CommandKind::Undo { layer }))
    }

    /// `clear` on the selected layer.
    pub fn clear(&self) -> Option<Command> {
        let layer = self.selection("clear")?;
        Some(Command::new(CommandKind::Clear { layer }))
    }

    /// `create_layer` with a fresh UUID v4 id, which becomes the selection.
    pub fn create_layer(&mut self) -> Command {
        let layer = Uuid::new_v4().to_string();
        self.selected_layer = Some(layer.clone());
        Command::new(CommandKind::CreateLayer { layer })
    }

    /// `remove_layer`. Removing the selected layer drops the selection.
    pub fn remove_layer(&mut self, layer: &str) -> Command {
        if self.selected_layer.as_deref() == Some(layer) {
            self.selected_layer = None;
        }
        Command::new(CommandKind::RemoveLayer {
            layer: layer.to_string(),
        })
    }

    /// `rename_layer`.
    pub fn rename_layer(&self, layer: &str, name: &str) -> Command {
        Command::new(CommandKind::RenameLayer {
            layer: layer.to_string(),
            name: name.to_string(),
        })
    }

    /// `reorder_layers`, bottom layer first.
    pub fn reorder_layers(&self, order: &[LayerId]) -> Command {
        Command::new(CommandKind::ReorderLayers {
            order: order.to_vec(),
        })
    }

    fn selection(&self, func: &str) -> Option<LayerId> {
        if self.selected_layer.is_none() {
            log::debug!("[Input] No layer selected, skipping {}", func);
        }
        self.selected_layer.clone()
    }

    fn to_picture(&self, x: i32, y: i32) -> (i32, i32) {
        (
            (x as f32 / self.magnification) as i32,
            (y as f32 / self.magnification) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_layer_selects_fresh_uuid() {
        let mut input = CanvasInput::new();
        let first = input.create_layer();
        let second = input.create_layer();

        let (Some(a), Some(b)) = (first.layer(), second.layer()) else {
            panic!("create_layer must carry a layer id");
        };
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a).is_ok());
        assert_eq!(input.selected_layer(), Some(b));
    }

    #[test]
    fn test_pointer_coordinates_are_scaled_and_truncated() {
        let mut input = CanvasInput::new();
        input.select_layer("L");
        input.set_magnification(2.0);

        let down = input.pointer_down(21, 9, 0.5).unwrap();
        match down.kind {
            CommandKind::ToolDown {
                x,
                y,
                pressure,
                layer,
                tool,
                ..
            } => {
                assert_eq!((x, y), (10, 4));
                assert!((pressure - 0.5).abs() < f32::EPSILON);
                assert_eq!(layer, "L");
                assert_eq!(tool, "pen");
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        let moved = input.pointer_move(-3, 3, 1.0);
        assert_eq!(
            moved.kind,
            CommandKind::ToolMove {
                x: -1,
                y: 1,
                pressure: 1.0,
                layer: None
            }
        );
    }

    #[test]
    fn test_invalid_magnification_is_ignored() {
        let mut input = CanvasInput::new();
        input.set_magnification(0.0);
        input.set_magnification(f32::NAN);
        assert!((input.magnification() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_no_selection_yields_no_layer_commands() {
        let input = CanvasInput::new();
        assert!(input.pointer_down(1, 1, 1.0).is_none());
        assert!(input.undo().is_none());
        assert!(input.clear().is_none());
        assert_eq!(input.pointer_up(1, 1, 1.0).layer(), None);
    }

    #[test]
    fn test_options_follow_tool() {
        let mut input = CanvasInput::new();
        input.select_layer("L");
        input.set_options(ToolOptions {
            color: 0xFF12_3456,
            size: 6.0,
        });

        let Some(Command {
            kind: CommandKind::ToolDown { options, .. },
            ..
        }) = input.pointer_down(0, 0, 1.0)
        else {
            panic!("expected tool_down");
        };
        assert_eq!(ToolOptions::from_value(&options), *input.options());

        input.set_tool(ToolKind::Pointer);
        let Some(Command {
            kind: CommandKind::ToolDown { options, tool, .. },
            ..
        }) = input.pointer_down(0, 0, 1.0)
        else {
            panic!("expected tool_down");
        };
        assert_eq!(tool, "pointer");
        assert_eq!(options, Value::String(String::new()));
    }

    #[test]
    fn test_removing_selected_layer_drops_selection() {
        let mut input = CanvasInput::new();
        input.select_layer("L");
        input.remove_layer("other");
        assert_eq!(input.selected_layer(), Some("L"));
        input.remove_layer("L");
        assert_eq!(input.selected_layer(), None);
    }
}
