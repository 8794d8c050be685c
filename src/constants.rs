//! Application-wide constants for canvas-sync.
//!
//! # Categories
//!
//! - **Session**: reserved ids
//! - **Network**: default endpoint and buffer sizes
//! - **Canvas**: default picture and tool parameters

// ============================================================================
// Session
// ============================================================================

/// Reserved user id of the participant sitting at this process.
///
/// Remote peers are keyed by the name the server assigns; this id never
/// goes on the wire.
pub const LOCAL_USER: &str = "local_user";

// ============================================================================
// Network
// ============================================================================

/// Default relay host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default relay port.
pub const DEFAULT_PORT: u16 = 9150;

/// Size of the socket read buffer used by the transport reader task.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Longest bracket-balanced token the decoder buffers before discarding it.
pub const MAX_TOKEN_SIZE: usize = 4 * 1024 * 1024;

// ============================================================================
// Canvas
// ============================================================================

/// Default picture width in pixels.
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;

/// Default picture height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Colour used when a stroke does not specify one (opaque black, ARGB).
pub const DEFAULT_TOOL_COLOR: u32 = 0xFF00_0000;

/// Tool size used when a stroke does not specify one.
pub const DEFAULT_TOOL_SIZE: f32 = 4.0;

/// Largest brush diameter honoured; bigger requested sizes are clamped.
pub const MAX_TOOL_SIZE: f32 = 256.0;
