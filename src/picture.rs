//! The shared document: an ordered stack of layers.
//!
//! Layer ids are never reused within a picture's lifetime, even after the
//! layer is removed, so a late command for a removed layer can never land on
//! a newer one.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::command::LayerId;
use crate::error::CommandError;
use crate::history::History;

/// Fully transparent ARGB pixel.
pub const TRANSPARENT: u32 = 0x0000_0000;

/// A fixed-size ARGB pixel surface.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Raster {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(TRANSPARENT);
    }

    /// Pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Set the pixel at `(x, y)`. Out-of-bounds writes are clipped.
    pub fn put_pixel(&mut self, x: i32, y: i32, color: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Number of non-transparent pixels.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != TRANSPARENT).count()
    }

    /// SHA-256 over the dimensions and pixels, as lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        for pixel in &self.pixels {
            hasher.update(pixel.to_le_bytes());
        }
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("painted", &self.painted_pixels())
            .finish_non_exhaustive()
    }
}

/// One layer of the picture. Owns its raster and its undo history.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    /// Display name, changed by `rename_layer`.
    pub name: String,
    /// Pixel content.
    pub raster: Raster,
    /// Undo log for this layer.
    pub history: History,
}

impl Layer {
    /// Create an empty layer.
    pub fn new(id: impl Into<LayerId>, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            raster: Raster::new(width, height),
            history: History::new(),
        }
    }

    /// Immutable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// The layered document every participant draws into.
#[derive(Debug, Clone)]
pub struct Picture {
    width: u32,
    height: u32,
    layers: HashMap<LayerId, Layer>,
    order: Vec<LayerId>,
    /// Every id ever added, including removed ones.
    used_ids: HashSet<LayerId>,
}

impl Picture {
    /// Create an empty picture of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: HashMap::new(),
            order: Vec::new(),
            used_ids: HashSet::new(),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Append a layer on top of the stack.
    pub fn add_layer(&mut self, id: &str) -> Result<(), CommandError> {
        if !self.used_ids.insert(id.to_string()) {
            return Err(CommandError::DuplicateLayer(id.to_string()));
        }
        let name = format!("Layer {}", self.used_ids.len());
        self.layers
            .insert(id.to_string(), Layer::new(id, name, self.width, self.height));
        self.order.push(id.to_string());
        Ok(())
    }

    /// Remove a layer and its history.
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer, CommandError> {
        let layer = self
            .layers
            .remove(id)
            .ok_or_else(|| CommandError::UnknownLayer(id.to_string()))?;
        self.order.retain(|l| l != id);
        Ok(layer)
    }

    /// Replace the z-order. `order` must be a permutation of the current ids.
    pub fn reorder_layers(&mut self, order: &[LayerId]) -> Result<(), CommandError> {
        let wanted: HashSet<&str> = order.iter().map(String::as_str).collect();
        let is_permutation = order.len() == self.order.len()
            && wanted.len() == order.len()
            && wanted.iter().all(|id| self.layers.contains_key(*id));
        if !is_permutation {
            return Err(CommandError::InvalidReorder(format!(
                "expected a permutation of {:?}, got {:?}",
                self.order, order
            )));
        }
        self.order = order.to_vec();
        Ok(())
    }

    /// Set a layer's display name.
    pub fn rename_layer(&mut self, id: &str, name: &str) -> Result<(), CommandError> {
        self.layer_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Wipe a layer's raster (history is untouched).
    pub fn clear(&mut self, id: &str) -> Result<(), CommandError> {
        self.layer_mut(id)?.raster.clear();
        Ok(())
    }

    /// Look up a layer.
    pub fn layer(&self, id: &str) -> Result<&Layer, CommandError> {
        self.layers
            .get(id)
            .ok_or_else(|| CommandError::UnknownLayer(id.to_string()))
    }

    /// Look up a layer mutably.
    pub fn layer_mut(&mut self, id: &str) -> Result<&mut Layer, CommandError> {
        self.layers
            .get_mut(id)
            .ok_or_else(|| CommandError::UnknownLayer(id.to_string()))
    }

    /// True if a live layer has this id.
    pub fn contains(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    /// Layer ids bottom to top.
    pub fn order(&self) -> &[LayerId] {
        &self.order
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Number of live layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if the picture has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
