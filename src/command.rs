//! Canonical command type exchanged between peers.
//!
//! Every stroke, layer edit and session signal travels as one JSON object
//! with a mandatory `func` discriminator:
//!
//! ```text
//! {"func":"tool_down","x":10,"y":20,"pressure":1.0,"layer":"…","tool":"pen","options":{…},"user":"bob"}
//! ```
//!
//! Known kinds are validated into typed variants at decode time. Anything
//! else is kept as [`CommandKind::Other`] so newer peers can add kinds
//! without breaking older ones.
//!
//! Older GUI encoders stringify every scalar (`"x":"10"`), so the numeric
//! stroke fields accept both numbers and decimal strings.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::FramingError;

/// Globally unique layer identifier.
pub type LayerId = String;

/// Participant identifier as assigned by the relay.
pub type UserId = String;

/// Command kinds with a typed field set, in wire spelling.
const KNOWN_FUNCS: &[&str] = &[
    "tool_down",
    "tool_move",
    "tool_up",
    "clear",
    "undo",
    "create_layer",
    "remove_layer",
    "reorder_layers",
    "rename_layer",
    "credentials",
    "user_join",
    "user_quit",
];

fn full_pressure() -> f32 {
    1.0
}

/// The typed body of a command, tagged by `func`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "func", rename_all = "snake_case")]
pub enum CommandKind {
    /// Start a stroke on `layer` with the named tool.
    ToolDown {
        /// Horizontal position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        x: i32,
        /// Vertical position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        y: i32,
        /// Normalised pen pressure.
        #[serde(default = "full_pressure", deserialize_with = "lenient::float")]
        pressure: f32,
        /// Target layer.
        layer: LayerId,
        /// Tool name, resolved through the tool table.
        tool: String,
        /// Opaque tool options (object, or `""` for option-less tools).
        #[serde(default)]
        options: Value,
    },
    /// Continue the active stroke.
    ToolMove {
        /// Horizontal position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        x: i32,
        /// Vertical position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        y: i32,
        /// Normalised pen pressure.
        #[serde(default = "full_pressure", deserialize_with = "lenient::float")]
        pressure: f32,
        /// Informational; the stroke layer fixed at `tool_down` is used.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<LayerId>,
    },
    /// Finish the active stroke.
    ToolUp {
        /// Horizontal position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        x: i32,
        /// Vertical position in picture pixels.
        #[serde(deserialize_with = "lenient::int")]
        y: i32,
        /// Normalised pen pressure.
        #[serde(default = "full_pressure", deserialize_with = "lenient::float")]
        pressure: f32,
        /// Informational; the stroke layer fixed at `tool_down` is used.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<LayerId>,
    },
    /// Wipe a layer's raster.
    Clear {
        /// Target layer.
        layer: LayerId,
    },
    /// Drop the last undo level of a layer and rebuild it.
    Undo {
        /// Target layer.
        layer: LayerId,
    },
    /// Append a new layer.
    CreateLayer {
        /// Id of the new layer.
        layer: LayerId,
    },
    /// Delete a layer together with its history.
    RemoveLayer {
        /// Target layer.
        layer: LayerId,
    },
    /// Replace the whole z-order.
    ReorderLayers {
        /// Every current layer id, bottom first.
        order: Vec<LayerId>,
    },
    /// Change a layer's display name.
    RenameLayer {
        /// Target layer.
        layer: LayerId,
        /// New display name.
        name: String,
    },
    /// Identity assigned to this process by the relay.
    Credentials {
        /// Room joined.
        room: String,
        /// Display name assigned to us.
        user: UserId,
    },
    /// A remote participant arrived.
    UserJoin {
        /// The new participant.
        user: UserId,
    },
    /// A remote participant left.
    UserQuit {
        /// The departing participant.
        user: UserId,
    },
    /// Unrecognised kind, carried verbatim.
    #[serde(skip)]
    Other {
        /// Wire name of the kind.
        func: String,
        /// Every field except `func`.
        fields: Map<String, Value>,
    },
}

/// A single immutable command plus its optional sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Sender as stamped by the relay; absent for locally built commands.
    pub user: Option<UserId>,
    /// Typed body.
    pub kind: CommandKind,
}

impl Command {
    /// Wrap a kind without a sender.
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self { user: None, kind }
    }

    /// Stamp the command with a sender.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<UserId>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Wire name of this command's kind.
    pub fn func(&self) -> &str {
        match &self.kind {
            CommandKind::ToolDown { .. } => "tool_down",
            CommandKind::ToolMove { .. } => "tool_move",
            CommandKind::ToolUp { .. } => "tool_up",
            CommandKind::Clear { .. } => "clear",
            CommandKind::Undo { .. } => "undo",
            CommandKind::CreateLayer { .. } => "create_layer",
            CommandKind::RemoveLayer { .. } => "remove_layer",
            CommandKind::ReorderLayers { .. } => "reorder_layers",
            CommandKind::RenameLayer { .. } => "rename_layer",
            CommandKind::Credentials { .. } => "credentials",
            CommandKind::UserJoin { .. } => "user_join",
            CommandKind::UserQuit { .. } => "user_quit",
            CommandKind::Other { func, .. } => func,
        }
    }

    /// Layer named by the command, if any.
    pub fn layer(&self) -> Option<&str> {
        match &self.kind {
            CommandKind::ToolDown { layer, .. }
            | CommandKind::Clear { layer }
            | CommandKind::Undo { layer }
            | CommandKind::CreateLayer { layer }
            | CommandKind::RemoveLayer { layer }
            | CommandKind::RenameLayer { layer, .. } => Some(layer),
            CommandKind::ToolMove { layer, .. } | CommandKind::ToolUp { layer, .. } => {
                layer.as_deref()
            }
            _ => None,
        }
    }

    /// Build the JSON object form.
    pub fn to_value(&self) -> Value {
        let mut map = match &self.kind {
            CommandKind::Other { func, fields } => {
                let mut map = fields.clone();
                map.insert("func".to_string(), Value::String(func.clone()));
                map
            }
            kind => match serde_json::to_value(kind) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    let mut map = Map::new();
                    map.insert("func".to_string(), Value::String(self.func().to_string()));
                    map
                }
            },
        };
        if let Some(user) = &self.user {
            map.insert("user".to_string(), Value::String(user.clone()));
        }
        Value::Object(map)
    }

    /// Encode for the wire. Consecutive encodings need no separator.
    pub fn encode(&self) -> Vec<u8> {
        self.to_value().to_string().into_bytes()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        Self::new(kind)
    }
}

impl TryFrom<Value> for Command {
    type Error = FramingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err(FramingError::InvalidCommand(format!(
                "expected an object, got {value}"
            )));
        };
        let func = match map.get("func") {
            Some(Value::String(func)) => func.clone(),
            Some(other) => {
                return Err(FramingError::InvalidCommand(format!(
                    "func must be a string, got {other}"
                )))
            }
            None => return Err(FramingError::InvalidCommand("missing func".to_string())),
        };
        let user = map.get("user").and_then(Value::as_str).map(str::to_string);

        let kind = if KNOWN_FUNCS.contains(&func.as_str()) {
            serde_json::from_value(Value::Object(map))
                .map_err(|e| FramingError::InvalidCommand(format!("{func}: {e}")))?
        } else {
            map.remove("func");
            CommandKind::Other { func, fields: map }
        };

        Ok(Self { user, kind })
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(D::Error::custom)
    }
}

/// Numeric fields that may arrive as JSON numbers or decimal strings.
mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| D::Error::custom(format!("invalid number {s:?}: {e}"))),
        }
    }

    pub(super) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        number(deserializer).map(|n| n as i32)
    }

    pub(super) fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        number(deserializer).map(|n| n as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> Result<Command, FramingError> {
        Command::try_from(value)
    }

    #[test]
    fn test_decodes_stringified_stroke_fields() {
        let cmd = decode(json!({
            "func": "tool_down",
            "pressure": "0.5",
            "x": "12",
            "y": "7",
            "layer": "L1",
            "tool": "pen",
            "options": ""
        }))
        .unwrap();

        assert_eq!(
            cmd.kind,
            CommandKind::ToolDown {
                x: 12,
                y: 7,
                pressure: 0.5,
                layer: "L1".to_string(),
                tool: "pen".to_string(),
                options: json!(""),
            }
        );
        assert_eq!(cmd.func(), "tool_down");
        assert_eq!(cmd.layer(), Some("L1"));
    }

    #[test]
    fn test_pressure_defaults_to_full() {
        let cmd = decode(json!({"func": "tool_move", "x": 1, "y": 2})).unwrap();
        assert_eq!(
            cmd.kind,
            CommandKind::ToolMove { x: 1, y: 2, pressure: 1.0, layer: None }
        );
    }

    #[test]
    fn test_user_field_is_captured() {
        let cmd = decode(json!({"func": "undo", "layer": "L", "user": "bob"})).unwrap();
        assert_eq!(cmd.user.as_deref(), Some("bob"));
        assert_eq!(cmd.kind, CommandKind::Undo { layer: "L".to_string() });
    }

    #[test]
    fn test_unknown_func_is_kept_as_other() {
        let cmd = decode(json!({"func": "wave", "at": 3})).unwrap();
        assert_eq!(cmd.func(), "wave");
        match &cmd.kind {
            CommandKind::Other { fields, .. } => assert_eq!(fields.get("at"), Some(&json!(3))),
            other => panic!("expected Other, got {other:?}"),
        }
        assert_eq!(cmd.to_value(), json!({"func": "wave", "at": 3}));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let err = decode(json!({"func": "tool_down", "x": 1, "y": 1, "tool": "pen"})).unwrap_err();
        assert!(matches!(err, FramingError::InvalidCommand(msg) if msg.contains("layer")));
    }

    #[test]
    fn test_missing_func_is_rejected() {
        assert!(decode(json!({"layer": "L"})).is_err());
        assert!(decode(json!({"func": 3})).is_err());
        assert!(decode(json!([1, 2])).is_err());
    }

    #[test]
    fn test_garbage_number_string_is_rejected() {
        let err = decode(json!({"func": "tool_up", "x": "left", "y": 0})).unwrap_err();
        assert!(matches!(err, FramingError::InvalidCommand(_)));
    }

    #[test]
    fn test_encoded_reorder_reads_back() {
        let cmd = Command::new(CommandKind::ReorderLayers {
            order: vec!["b".to_string(), "a".to_string()],
        })
        .with_user("alice");
        let decoded: Command = serde_json::from_slice(&cmd.encode()).unwrap();
        assert_eq!(decoded, cmd);
    }
}
