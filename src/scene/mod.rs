//! Caller-facing composition model: layers, targets and call-global parameters.

/// Layers and render targets.
pub mod layer;
/// Per-call parameters.
pub mod params;
