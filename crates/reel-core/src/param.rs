//! FX parameter system
//!
//! Every FX declares its controls as a static list of [`Param`]s: a spec
//! (id, description, kind and bounds) plus a live value slot. Control
//! surfaces enumerate the list through [`crate::fx::RenderCommand::params`]
//! and write values from their own thread; the render thread reads them on
//! the next cycle. The slot is a single `AtomicU64` holding f64 bits, so a
//! scalar can never tear and no lock is taken on either side.
//!
//! Out-of-range writes are clamped, not rejected: a slider dragged past the
//! end of its range must keep working without glitching the stream.

use std::sync::atomic::{AtomicU64, Ordering};

/// Kind and bounds of a parameter
#[derive(Debug, Clone)]
pub enum ParamKind {
    /// Continuous value in `[min, max]`
    Range { min: f64, max: f64, default: f64 },
    /// Ordered item list; the value is the selected index
    Items { items: Vec<String>, default: usize },
}

/// Static description of one parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Stable identifier (e.g. "gain")
    pub id: &'static str,
    /// Human-readable description for control surfaces
    pub description: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn range(id: &'static str, description: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        debug_assert!(min <= max, "parameter range must not be inverted");
        Self {
            id,
            description: description.into(),
            kind: ParamKind::Range { min, max, default },
        }
    }

    pub fn items(id: &'static str, description: impl Into<String>, items: Vec<String>, default: usize) -> Self {
        debug_assert!(default < items.len().max(1));
        Self {
            id,
            description: description.into(),
            kind: ParamKind::Items { items, default },
        }
    }

    /// Default value as stored in the live slot
    fn default_value(&self) -> f64 {
        match &self.kind {
            ParamKind::Range { default, .. } => *default,
            ParamKind::Items { default, .. } => *default as f64,
        }
    }

    /// Clamp a candidate value into this parameter's valid range
    fn clamp(&self, value: f64) -> f64 {
        match &self.kind {
            ParamKind::Range { min, max, .. } => value.clamp(*min, *max),
            ParamKind::Items { items, .. } => {
                let hi = items.len().saturating_sub(1) as f64;
                value.round().clamp(0.0, hi)
            }
        }
    }
}

/// A declared parameter with its live value
///
/// `set` clamps and publishes; `get` is wait-free. Both sides see a whole
/// f64 or nothing - the bits travel through one atomic word.
#[derive(Debug)]
pub struct Param {
    spec: ParamSpec,
    value: AtomicU64,
}

impl Param {
    pub fn new(spec: ParamSpec) -> Self {
        let value = AtomicU64::new(spec.default_value().to_bits());
        Self { spec, value }
    }

    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    pub fn id(&self) -> &'static str {
        self.spec.id
    }

    /// Current value (item index for ITEMS parameters)
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Current value as an item index
    pub fn get_index(&self) -> usize {
        self.get().max(0.0) as usize
    }

    /// Write a value, clamping into the declared bounds
    pub fn set(&self, value: f64) {
        let clamped = self.spec.clamp(value);
        self.value.store(clamped.to_bits(), Ordering::Release);
    }

    /// Reset to the declared default
    pub fn reset(&self) {
        self.value
            .store(self.spec.default_value().to_bits(), Ordering::Release);
    }
}

/// Find a parameter by id in a declared list
pub fn find_param<'a>(params: &'a [Param], id: &str) -> Option<&'a Param> {
    params.iter().find(|p| p.id() == id)
}
