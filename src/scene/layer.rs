use crate::foundation::core::{ChromaSiting, ColorSpace, Rect, Rotation, ScalingMode, SurfaceId};

/// Role of a layer within the composition, derived from the kind of surface it carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LayerRole {
    /// Background plane.
    Background,
    /// Primary video stream.
    #[default]
    MainVideo,
    /// Secondary video stream (picture in picture).
    SubVideo,
    /// Graphics overlay.
    Graphics,
    /// Subtitle / subpicture plane.
    Subpicture,
    /// Output of a previous phase fed back as input.
    Intermediate,
    /// Output of a single-layer rotation phase.
    RotatedIntermediate,
}

/// How a layer is blended over what is already composited below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendKind {
    /// Straight source alpha.
    Source,
    /// Premultiplied ("partial") alpha.
    Partial,
    /// Constant alpha only.
    Constant,
    /// Constant alpha multiplied with source alpha.
    ConstantSource,
    /// Constant alpha multiplied with premultiplied alpha.
    ConstantPartial,
}

/// Blending parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Blend {
    /// Blend equation.
    pub kind: BlendKind,
    /// Constant alpha in `[0, 1]`, used by the constant variants.
    pub alpha: f32,
}

/// Luma key range. Pixels whose luma falls in `[low, high]` become transparent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LumaKey {
    /// Lower bound (inclusive).
    pub low: u8,
    /// Upper bound (inclusive).
    pub high: u8,
}

/// Brightness / contrast / hue / saturation adjustment.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Procamp {
    /// Additive brightness, nominal range `[-100, 100]`.
    pub brightness: f32,
    /// Contrast multiplier, `1.0` is neutral.
    pub contrast: f32,
    /// Hue rotation in degrees.
    pub hue: f32,
    /// Saturation multiplier, `1.0` is neutral.
    pub saturation: f32,
}

impl Default for Procamp {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            hue: 0.0,
            saturation: 1.0,
        }
    }
}

/// Deinterlacing applied while sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Deinterlace {
    /// Line doubling of one field. Incompatible with the adaptive scaler.
    Bob,
}

/// One input surface plus its compositing parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    /// Source surface.
    pub surface: SurfaceId,
    /// Role of the layer.
    pub role: LayerRole,
    /// Region of the source surface to sample.
    pub src_rect: Rect,
    /// Region of the target the layer is composited into.
    pub dst_rect: Rect,
    /// Rotation and mirroring.
    pub rotation: Rotation,
    /// Requested scaling mode. The scheduler may rewrite the effective mode.
    pub scaling_mode: ScalingMode,
    /// Color space of the source data.
    pub color_space: ColorSpace,
    /// Optional blending; `None` composites opaquely.
    pub blend: Option<Blend>,
    /// Optional luma key.
    pub luma_key: Option<LumaKey>,
    /// Optional procamp adjustment.
    pub procamp: Option<Procamp>,
    /// Optional deinterlacing.
    pub deinterlace: Option<Deinterlace>,
    /// Chroma siting of subsampled formats; `None` when unspecified.
    pub chroma_siting: Option<ChromaSiting>,
}

impl Layer {
    /// Opaque layer with identity rotation and bilinear scaling.
    pub fn new(
        surface: SurfaceId,
        src_rect: Rect,
        dst_rect: Rect,
        color_space: ColorSpace,
    ) -> Self {
        Self {
            surface,
            role: LayerRole::MainVideo,
            src_rect,
            dst_rect,
            rotation: Rotation::Identity,
            scaling_mode: ScalingMode::Bilinear,
            color_space,
            blend: None,
            luma_key: None,
            procamp: None,
            deinterlace: None,
            chroma_siting: None,
        }
    }

    /// Builder-style role override.
    pub fn with_role(mut self, role: LayerRole) -> Self {
        self.role = role;
        self
    }

    /// Builder-style scaling override.
    pub fn with_scaling(mut self, mode: ScalingMode) -> Self {
        self.scaling_mode = mode;
        self
    }

    /// Builder-style rotation override.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder-style blend override.
    pub fn with_blend(mut self, blend: Blend) -> Self {
        self.blend = Some(blend);
        self
    }
}

/// One output surface.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderTarget {
    /// Target surface.
    pub surface: SurfaceId,
    /// Region of the target that receives the composition.
    pub dst_rect: Rect,
    /// Color space the target expects.
    pub color_space: ColorSpace,
    /// Optional procamp applied on output.
    pub procamp: Option<Procamp>,
}

impl RenderTarget {
    /// Target covering `dst_rect` with no output procamp.
    pub fn new(surface: SurfaceId, dst_rect: Rect, color_space: ColorSpace) -> Self {
        Self {
            surface,
            dst_rect,
            color_space,
            procamp: None,
        }
    }
}
