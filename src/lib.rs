//! Multi-layer video compositor for media-kernel render engines.
//!
//! A [`Compositor`] takes up to 17 source [`Layer`]s and one or two [`RenderTarget`]s and turns
//! them into device command streams:
//!
//! - Split the layers into kernel-compatible phases, chaining intermediates between them
//! - Resolve each phase to a linked kernel from the embedder's [`FragmentArena`]
//! - Record the block dispatch into pooled batch buffers and submit with status tracking
//!
//! Surfaces, the device queue, hardware capabilities and color matrices are supplied by the
//! embedder through [`SurfaceProvider`], [`CommandDevice`], [`HwCaps`] and [`ColorMatrices`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod batch;
pub(crate) mod coeff;
pub(crate) mod hw;
pub(crate) mod kernel;
/// Caller-facing composition model.
pub mod scene;
pub(crate) mod schedule;
pub(crate) mod session;
/// Device command stream encoding and the device boundary.
pub mod submit;
/// Surface allocator boundary.
pub mod surface;

pub use crate::foundation::core::{
    ChromaSiting, ColorSpace, FeedbackId, GpuContextId, HorizontalSiting, Rect, Rotation,
    ScalingMode, SurfaceFormat, SurfaceId, VerticalSiting,
};
pub use crate::foundation::error::{CompositeError, CompositeResult};

pub use crate::hw::caps::{GenericCaps, HwCaps, HwGeneration, PhaseBudget};
pub use crate::kernel::csc::{ColorMatrices, ColorMatrix, IDENTITY_MATRIX};
pub use crate::kernel::descriptor::{Process, SamplerKind};
pub use crate::kernel::library::{
    Fragment, FragmentArena, FragmentId, FragmentKey, FormatClass, FormatKey,
};
pub use crate::scene::layer::{
    Blend, BlendKind, Deinterlace, Layer, LayerRole, LumaKey, Procamp, RenderTarget,
};
pub use crate::scene::params::{ColorFill, CompositeParams, Nlas};
pub use crate::session::compositor::{
    CompositeStats, CompositeStatus, Compositor, CompositorCaches, CompositorOpts, MAX_SOURCES,
    MAX_TARGETS,
};
pub use crate::submit::device::{CommandBuffer, CommandDevice};
pub use crate::submit::status::QueryStatus;
pub use crate::surface::{SurfaceDesc, SurfaceInfo, SurfaceProvider, Tiling};
