//! Boundary contract with the surface allocator.

use crate::foundation::core::{SurfaceFormat, SurfaceId};
use crate::foundation::error::CompositeResult;

/// Memory tiling of a surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Tiling {
    /// Row-major linear layout.
    Linear,
    /// X-major tiles.
    TileX,
    /// Y-major tiles.
    #[default]
    TileY,
}

/// Geometry and layout of an allocated surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row pitch in bytes.
    pub pitch: u32,
    /// Memory tiling.
    pub tiling: Tiling,
    /// Pixel format.
    pub format: SurfaceFormat,
}

/// Allocation request for a scratch surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SurfaceDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: SurfaceFormat,
    /// Requested tiling.
    pub tiling: Tiling,
}

/// Surface allocator and resource registry owned by the embedding driver.
pub trait SurfaceProvider {
    /// Describe an existing surface.
    fn surface_info(&self, surface: SurfaceId) -> CompositeResult<SurfaceInfo>;

    /// Allocate a new surface.
    fn allocate_surface(&mut self, desc: &SurfaceDesc) -> CompositeResult<SurfaceId>;

    /// Release a surface previously returned by [`SurfaceProvider::allocate_surface`].
    fn free_surface(&mut self, surface: SurfaceId);

    /// Declare that the next submitted command stream reads (or writes) `surface`.
    fn register_resource(&mut self, surface: SurfaceId, write: bool) -> CompositeResult<()>;
}
