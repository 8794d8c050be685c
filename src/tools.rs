//! Drawing tools behind the `Down/Move/Up` capability.
//!
//! Tools are a closed set resolved by name at `tool_down` through
//! [`ToolKind::from_name`]. A fresh tool is built for every stroke, so a
//! stroke's pixels depend only on the layer content and the stroke's own
//! commands. Undo relies on this to rebuild a layer by replay.
//!
//! The algorithms here are reference implementations, free of any clock or
//! randomness. Peer-supplied geometry is bounded before it is walked:
//! segments are clipped to the raster and brush sizes are capped at
//! [`MAX_TOOL_SIZE`], so one command costs at most a few raster passes.

use serde_json::Value;

use crate::constants::{DEFAULT_TOOL_COLOR, DEFAULT_TOOL_SIZE, MAX_TOOL_SIZE};
use crate::error::CommandError;
use crate::picture::Layer;

/// A sampled pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePoint {
    /// Horizontal position in picture pixels.
    pub x: i32,
    /// Vertical position in picture pixels.
    pub y: i32,
    /// Normalised pressure, nominally `0.0..=1.0`.
    pub pressure: f32,
}

impl StrokePoint {
    /// Build a point.
    pub fn new(x: i32, y: i32, pressure: f32) -> Self {
        Self { x, y, pressure }
    }
}

/// Options a stroke starts with, read from the opaque `options` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolOptions {
    /// ARGB colour.
    pub color: u32,
    /// Nominal diameter in pixels.
    pub size: f32,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            color: DEFAULT_TOOL_COLOR,
            size: DEFAULT_TOOL_SIZE,
        }
    }
}

impl ToolOptions {
    /// Read options leniently. Missing or unreadable entries fall back to
    /// the defaults; a non-object value (such as `""`) yields all defaults.
    pub fn from_value(value: &Value) -> Self {
        let mut options = Self::default();
        let Some(map) = value.as_object() else {
            return options;
        };
        if let Some(color) = map.get("color").and_then(parse_color) {
            options.color = color;
        }
        let size = match map.get("size") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(size) = size.filter(|s| s.is_finite() && *s > 0.0) {
            options.size = (size as f32).min(MAX_TOOL_SIZE);
        }
        options
    }

    /// Wire form read back by [`ToolOptions::from_value`].
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "color": format!("#{:08x}", self.color),
            "size": self.size,
        })
    }
}

/// `"#rrggbb"`, `"#aarrggbb"` or an integer ARGB value.
fn parse_color(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let hex = s.trim().trim_start_matches('#');
            let raw = u32::from_str_radix(hex, 16).ok()?;
            match hex.len() {
                6 => Some(0xFF00_0000 | raw),
                8 => Some(raw),
                _ => None,
            }
        }
        _ => None,
    }
}

/// The `Down/Move/Up` capability every tool exposes.
pub trait Tool: std::fmt::Debug {
    /// Start a stroke on `layer`.
    fn down(&mut self, layer: &mut Layer, point: StrokePoint, options: &ToolOptions);
    /// Extend the stroke to `point`.
    fn move_to(&mut self, layer: &mut Layer, point: StrokePoint);
    /// Finish the stroke at `point`.
    fn up(&mut self, layer: &mut Layer, point: StrokePoint);
}

/// Known tool kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Pressure-sized round brush.
    Brush,
    /// One-pixel hard line.
    Pen,
    /// Selection pointer; never paints.
    Pointer,
}

/// Wire name to tool kind.
const TOOL_TABLE: &[(&str, ToolKind)] = &[
    ("brush", ToolKind::Brush),
    ("pen", ToolKind::Pen),
    ("pointer", ToolKind::Pointer),
];

impl ToolKind {
    /// Resolve a wire name.
    pub fn from_name(name: &str) -> Result<Self, CommandError> {
        TOOL_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| CommandError::UnknownTool(name.to_string()))
    }

    /// Wire name of this kind.
    pub fn name(self) -> &'static str {
        TOOL_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("unknown", |(n, _)| n)
    }

    /// Build a fresh tool for one stroke.
    pub fn instantiate(self) -> ActiveTool {
        match self {
            Self::Brush => ActiveTool::Brush(BrushTool::default()),
            Self::Pen => ActiveTool::Pen(PenTool::default()),
            Self::Pointer => ActiveTool::Pointer(PointerTool),
        }
    }
}

/// A tool in the middle of a stroke.
#[derive(Debug, Clone)]
pub enum ActiveTool {
    /// See [`BrushTool`].
    Brush(BrushTool),
    /// See [`PenTool`].
    Pen(PenTool),
    /// See [`PointerTool`].
    Pointer(PointerTool),
}

impl ActiveTool {
    /// Kind this tool was built from.
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Brush(_) => ToolKind::Brush,
            Self::Pen(_) => ToolKind::Pen,
            Self::Pointer(_) => ToolKind::Pointer,
        }
    }

    fn as_tool(&mut self) -> &mut dyn Tool {
        match self {
            Self::Brush(t) => t,
            Self::Pen(t) => t,
            Self::Pointer(t) => t,
        }
    }
}

impl Tool for ActiveTool {
    fn down(&mut self, layer: &mut Layer, point: StrokePoint, options: &ToolOptions) {
        self.as_tool().down(layer, point, options);
    }

    fn move_to(&mut self, layer: &mut Layer, point: StrokePoint) {
        self.as_tool().move_to(layer, point);
    }

    fn up(&mut self, layer: &mut Layer, point: StrokePoint) {
        self.as_tool().up(layer, point);
    }
}

/// Hard one-pixel line.
#[derive(Debug, Clone, Default)]
pub struct PenTool {
    color: u32,
    last: Option<(i32, i32)>,
}

impl Tool for PenTool {
    fn down(&mut self, layer: &mut Layer, point: StrokePoint, options: &ToolOptions) {
        self.color = options.color;
        layer.raster.put_pixel(point.x, point.y, self.color);
        self.last = Some((point.x, point.y));
    }

    fn move_to(&mut self, layer: &mut Layer, point: StrokePoint) {
        let from = self.last.unwrap_or((point.x, point.y));
        let color = self.color;
        let bounds = Bounds::around(layer, 0);
        for_each_line_pixel(from, (point.x, point.y), bounds, |x, y| {
            layer.raster.put_pixel(x, y, color);
        });
        self.last = Some((point.x, point.y));
    }

    fn up(&mut self, layer: &mut Layer, point: StrokePoint) {
        self.move_to(layer, point);
        self.last = None;
    }
}

/// Round brush whose radius follows pressure.
#[derive(Debug, Clone, Default)]
pub struct BrushTool {
    color: u32,
    size: f32,
    last: Option<(i32, i32)>,
}

impl BrushTool {
    /// At least 1, at most half of [`MAX_TOOL_SIZE`].
    fn radius(&self, pressure: f32) -> i32 {
        let size = self.size.min(MAX_TOOL_SIZE);
        ((size * pressure.clamp(0.0, 1.0)) / 2.0).round().max(1.0) as i32
    }

    /// Filled disc, visiting only the rows and columns inside the raster.
    fn stamp(&self, layer: &mut Layer, cx: i32, cy: i32, radius: i32) {
        let (cx, cy, r) = (i64::from(cx), i64::from(cy), i64::from(radius));
        let max_x = i64::from(layer.raster.width()) - 1;
        let max_y = i64::from(layer.raster.height()) - 1;
        let r2 = r * r;
        for y in (cy - r).max(0)..=(cy + r).min(max_y) {
            for x in (cx - r).max(0)..=(cx + r).min(max_x) {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= r2 {
                    layer.raster.put_pixel(x as i32, y as i32, self.color);
                }
            }
        }
    }
}

impl Tool for BrushTool {
    fn down(&mut self, layer: &mut Layer, point: StrokePoint, options: &ToolOptions) {
        self.color = options.color;
        self.size = options.size;
        self.stamp(layer, point.x, point.y, self.radius(point.pressure));
        self.last = Some((point.x, point.y));
    }

    fn move_to(&mut self, layer: &mut Layer, point: StrokePoint) {
        let from = self.last.unwrap_or((point.x, point.y));
        let radius = self.radius(point.pressure);
        let bounds = Bounds::around(layer, i64::from(radius));
        let mut centres = Vec::new();
        for_each_line_pixel(from, (point.x, point.y), bounds, |x, y| centres.push((x, y)));
        for (x, y) in centres {
            self.stamp(layer, x, y, radius);
        }
        self.last = Some((point.x, point.y));
    }

    fn up(&mut self, layer: &mut Layer, point: StrokePoint) {
        self.move_to(layer, point);
        self.last = None;
    }
}

/// Pointer: tracks the stroke but never paints.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTool;

impl Tool for PointerTool {
    fn down(&mut self, _layer: &mut Layer, _point: StrokePoint, _options: &ToolOptions) {}

    fn move_to(&mut self, _layer: &mut Layer, _point: StrokePoint) {}

    fn up(&mut self, _layer: &mut Layer, _point: StrokePoint) {}
}

/// Inclusive pixel rectangle a segment is walked in.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

impl Bounds {
    /// The layer's raster grown by `margin` on every side.
    fn around(layer: &Layer, margin: i64) -> Self {
        Self {
            min_x: -margin,
            min_y: -margin,
            max_x: i64::from(layer.raster.width()) - 1 + margin,
            max_y: i64::from(layer.raster.height()) - 1 + margin,
        }
    }

    fn contains(&self, (x, y): (i64, i64)) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Liang-Barsky clip of `from..=to`. Segments already inside come back
    /// unchanged so on-canvas lines keep their exact Bresenham pixels.
    fn clip(&self, from: (i64, i64), to: (i64, i64)) -> Option<((i64, i64), (i64, i64))> {
        if self.contains(from) && self.contains(to) {
            return Some((from, to));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return None;
        }

        let (x0, y0) = (from.0 as f64, from.1 as f64);
        let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        let edges = [
            (-dx, x0 - self.min_x as f64),
            (dx, self.max_x as f64 - x0),
            (-dy, y0 - self.min_y as f64),
            (dy, self.max_y as f64 - y0),
        ];
        for (p, q) in edges {
            if p.abs() < f64::EPSILON {
                // Parallel to this edge: fully outside or irrelevant.
                if q < 0.0 {
                    return None;
                }
            } else if p < 0.0 {
                t0 = t0.max(q / p);
            } else {
                t1 = t1.min(q / p);
            }
            if t0 > t1 {
                return None;
            }
        }

        let at = |t: f64| {
            (
                ((x0 + t * dx).round() as i64).clamp(self.min_x, self.max_x),
                ((y0 + t * dy).round() as i64).clamp(self.min_y, self.max_y),
            )
        };
        Some((at(t0), at(t1)))
    }
}

/// Bresenham walk from `from` to `to`, both ends included, limited to
/// `bounds`. Far-off endpoints are clipped first, so the walk never leaves
/// the bounds and its arithmetic runs in `i64`.
fn for_each_line_pixel(
    from: (i32, i32),
    to: (i32, i32),
    bounds: Bounds,
    mut plot: impl FnMut(i32, i32),
) {
    let from = (i64::from(from.0), i64::from(from.1));
    let to = (i64::from(to.0), i64::from(to.1));
    let Some(((mut x, mut y), to)) = bounds.clip(from, to) else {
        return;
    };
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(x as i32, y as i32);
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer() -> Layer {
        Layer::new("L", "Layer 1", 16, 16)
    }

    #[test]
    fn test_lookup_table() {
        assert_eq!(ToolKind::from_name("brush").unwrap(), ToolKind::Brush);
        assert_eq!(ToolKind::from_name("pen").unwrap().name(), "pen");
        assert_eq!(
            ToolKind::from_name("airbrush"),
            Err(CommandError::UnknownTool("airbrush".to_string()))
        );
    }

    #[test]
    fn test_options_parsing() {
        let opts = ToolOptions::from_value(&json!({"color": "#ff0000", "size": "6"}));
        assert_eq!(opts.color, 0xFFFF_0000);
        assert!((opts.size - 6.0).abs() < f32::EPSILON);

        let opts = ToolOptions::from_value(&json!({"color": "#80112233"}));
        assert_eq!(opts.color, 0x8011_2233);

        assert_eq!(ToolOptions::from_value(&json!("")), ToolOptions::default());
        assert_eq!(
            ToolOptions::from_value(&json!({"color": "blue", "size": -1})),
            ToolOptions::default()
        );
    }

    #[test]
    fn test_pen_draws_connected_line() {
        let mut layer = layer();
        let mut pen = ToolKind::Pen.instantiate();
        let opts = ToolOptions::default();
        pen.down(&mut layer, StrokePoint::new(0, 0, 1.0), &opts);
        pen.move_to(&mut layer, StrokePoint::new(5, 0, 1.0));
        pen.up(&mut layer, StrokePoint::new(5, 3, 1.0));

        for x in 0..=5 {
            assert_eq!(layer.raster.pixel(x, 0), Some(opts.color));
        }
        assert_eq!(layer.raster.pixel(5, 3), Some(opts.color));
        assert_eq!(layer.raster.painted_pixels(), 9);
    }

    #[test]
    fn test_brush_radius_follows_pressure() {
        let opts = ToolOptions::from_value(&json!({"size": 8}));

        let mut light = layer();
        let mut brush = ToolKind::Brush.instantiate();
        brush.down(&mut light, StrokePoint::new(8, 8, 0.25), &opts);

        let mut heavy = layer();
        let mut brush = ToolKind::Brush.instantiate();
        brush.down(&mut heavy, StrokePoint::new(8, 8, 1.0), &opts);

        assert!(heavy.raster.painted_pixels() > light.raster.painted_pixels());
    }

    #[test]
    fn test_pointer_never_paints() {
        let mut layer = layer();
        let mut pointer = ToolKind::Pointer.instantiate();
        pointer.down(&mut layer, StrokePoint::new(1, 1, 1.0), &ToolOptions::default());
        pointer.up(&mut layer, StrokePoint::new(9, 9, 1.0));
        assert_eq!(layer.raster.painted_pixels(), 0);
        assert_eq!(pointer.kind(), ToolKind::Pointer);
    }

    #[test]
    fn test_same_stroke_is_bit_identical() {
        let run = || {
            let mut layer = layer();
            let mut brush = ToolKind::Brush.instantiate();
            brush.down(&mut layer, StrokePoint::new(2, 2, 0.7), &ToolOptions::default());
            brush.move_to(&mut layer, StrokePoint::new(12, 5, 0.4));
            brush.up(&mut layer, StrokePoint::new(3, 14, 1.0));
            layer.raster
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_saturated_coordinates_are_clipped_to_the_raster() {
        let mut layer = layer();
        let mut pen = ToolKind::Pen.instantiate();
        let opts = ToolOptions::default();
        pen.down(&mut layer, StrokePoint::new(i32::MIN, 5, 1.0), &opts);
        pen.move_to(&mut layer, StrokePoint::new(i32::MAX, 5, 1.0));
        assert_eq!(layer.raster.painted_pixels(), 16);

        // Entirely off the raster: nothing to walk.
        pen.up(&mut layer, StrokePoint::new(i32::MAX, i32::MIN, 1.0));
        assert_eq!(layer.raster.painted_pixels(), 16);

        let mut diagonal = self::layer();
        let mut pen = ToolKind::Pen.instantiate();
        pen.down(&mut diagonal, StrokePoint::new(i32::MIN, i32::MIN, 1.0), &opts);
        pen.up(&mut diagonal, StrokePoint::new(i32::MAX, i32::MAX, 1.0));
        assert_eq!(diagonal.raster.pixel(0, 0), Some(opts.color));
        assert_eq!(diagonal.raster.pixel(7, 7), Some(opts.color));
        assert_eq!(diagonal.raster.pixel(15, 15), Some(opts.color));
    }

    #[test]
    fn test_brush_with_saturated_coordinates_stays_bounded() {
        let mut layer = layer();
        let mut brush = ToolKind::Brush.instantiate();
        let opts = ToolOptions::from_value(&json!({"size": 6}));
        brush.down(&mut layer, StrokePoint::new(i32::MIN, i32::MIN, 1.0), &opts);
        brush.move_to(&mut layer, StrokePoint::new(i32::MAX, i32::MAX, 1.0));
        brush.up(&mut layer, StrokePoint::new(i32::MIN, i32::MAX, 1.0));
        assert!(layer.raster.painted_pixels() > 0);
        assert!(layer.raster.painted_pixels() <= 256);
    }

    #[test]
    fn test_oversized_brush_is_clamped() {
        let opts = ToolOptions::from_value(&json!({"size": 1e12}));
        assert!((opts.size - MAX_TOOL_SIZE).abs() < f32::EPSILON);

        // Fields are public, so the brush clamps again on its own.
        let huge = ToolOptions {
            size: f32::MAX,
            ..ToolOptions::default()
        };
        let mut layer = layer();
        let mut brush = ToolKind::Brush.instantiate();
        brush.down(&mut layer, StrokePoint::new(8, 8, 1.0), &huge);
        brush.up(&mut layer, StrokePoint::new(9, 9, 1.0));
        assert_eq!(layer.raster.painted_pixels(), 256);
    }

    #[test]
    fn test_pressure_outside_unit_range_is_clamped() {
        let opts = ToolOptions::from_value(&json!({"size": 8}));
        let dab = |pressure: f32| {
            let mut layer = layer();
            let mut brush = ToolKind::Brush.instantiate();
            brush.down(&mut layer, StrokePoint::new(8, 8, pressure), &opts);
            layer.raster
        };
        assert_eq!(dab(7.0), dab(1.0));
        assert_eq!(dab(-3.0), dab(0.0));
        assert_eq!(dab(f32::NAN).painted_pixels(), dab(0.0).painted_pixels());
    }
}
