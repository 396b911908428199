use crate::foundation::error::{CompositeError, CompositeResult};

/// Opaque handle to a surface owned by the [`crate::SurfaceProvider`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SurfaceId(pub u32);

/// Caller-chosen id used to report and poll the status of a composite call.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FeedbackId(pub u32);

/// Device queue (GPU context) a submission is routed to.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct GpuContextId(pub u32);

/// Integer rectangle with exclusive `right`/`bottom` edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Inclusive left edge.
    pub left: i32,
    /// Inclusive top edge.
    pub top: i32,
    /// Exclusive right edge.
    pub right: i32,
    /// Exclusive bottom edge.
    pub bottom: i32,
}

impl Rect {
    /// Build a rectangle from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rectangle at the origin with the given size.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_i32(width), clamp_i32(height))
    }

    /// Width in pixels, zero for inverted rectangles.
    pub fn width(self) -> u32 {
        self.right.saturating_sub(self.left).max(0) as u32
    }

    /// Height in pixels, zero for inverted rectangles.
    pub fn height(self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0) as u32
    }

    /// Return `true` when the rectangle covers no pixel.
    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Reject inverted or empty rectangles.
    pub fn validate(self, what: &str) -> CompositeResult<Self> {
        if self.right <= self.left || self.bottom <= self.top {
            return Err(CompositeError::validation(format!(
                "{what} rect must be non-empty, got {self:?}"
            )));
        }
        Ok(self)
    }

    /// Return `true` when `other` lies fully inside `self`.
    pub fn contains(self, other: Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Intersection of two rectangles, empty (at `self` origin) when disjoint.
    pub fn intersect(self, other: Rect) -> Rect {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.right <= r.left || r.bottom <= r.top {
            Rect::new(self.left, self.top, self.left, self.top)
        } else {
            r
        }
    }
}

fn clamp_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Pixel layout of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SurfaceFormat {
    /// 32-bit BGRA with alpha.
    Argb,
    /// 32-bit BGRA, alpha ignored.
    Xrgb,
    /// 32-bit RGBA with alpha.
    Abgr,
    /// 32-bit RGBA, alpha ignored.
    Xbgr,
    /// 16-bit 5:6:5 RGB.
    Rgb565,
    /// Packed 8-bit 4:4:4 YUV with alpha.
    Ayuv,
    /// Packed 10-bit 4:4:4 YUV.
    Y410,
    /// Packed 16-bit 4:4:4 YUV.
    Y416,
    /// Packed 4:2:2 YUV.
    Yuy2,
    /// Packed 4:2:2 YUV, UYVY order.
    Uyvy,
    /// Semi-planar 8-bit 4:2:0 YUV.
    Nv12,
    /// Semi-planar 10-bit 4:2:0 YUV.
    P010,
    /// Three-plane 8-bit 4:2:0 YUV.
    Yv12,
    /// 4-bit alpha + 4-bit palette index.
    Ai44,
    /// 4-bit palette index + 4-bit alpha.
    Ia44,
}

impl SurfaceFormat {
    /// Any 32-bit RGB variant.
    pub fn is_rgb32(self) -> bool {
        matches!(self, Self::Argb | Self::Xrgb | Self::Abgr | Self::Xbgr)
    }

    /// RGB formats (32-bit or 16-bit).
    pub fn is_rgb(self) -> bool {
        self.is_rgb32() || self == Self::Rgb565
    }

    /// YUV formats.
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::Ayuv
                | Self::Y410
                | Self::Y416
                | Self::Yuy2
                | Self::Uyvy
                | Self::Nv12
                | Self::P010
                | Self::Yv12
        )
    }

    /// Palettized formats.
    pub fn is_palette(self) -> bool {
        matches!(self, Self::Ai44 | Self::Ia44)
    }

    /// Palettized formats carrying a 4-bit alpha channel.
    pub fn is_alpha4(self) -> bool {
        self.is_palette()
    }

    /// Formats with three separate planes.
    pub fn is_planar3(self) -> bool {
        self == Self::Yv12
    }

    /// Formats whose chroma is subsampled and needs upsampling when read.
    pub fn has_subsampled_chroma(self) -> bool {
        matches!(
            self,
            Self::Yuy2 | Self::Uyvy | Self::Nv12 | Self::P010 | Self::Yv12
        )
    }

    /// Formats the AVS sampler filters with 4 luma taps unless 8-tap filtering is forced.
    pub fn prefers_4tap_luma(self) -> bool {
        self.is_rgb32() || matches!(self, Self::Y410 | Self::Ayuv | Self::Y416)
    }

    /// Bytes per pixel of the first plane.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Argb | Self::Xrgb | Self::Abgr | Self::Xbgr | Self::Ayuv | Self::Y410 => 4,
            Self::Y416 => 8,
            Self::Rgb565 | Self::Yuy2 | Self::Uyvy | Self::P010 => 2,
            Self::Nv12 | Self::Yv12 | Self::Ai44 | Self::Ia44 => 1,
        }
    }
}

/// Color space of a surface or of the composite intermediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ColorSpace {
    /// Unspecified (palette data, or no preference).
    Any,
    /// Full range sRGB.
    Srgb,
    /// Studio range RGB.
    StudioRgb,
    /// BT.601 limited range YUV.
    Bt601,
    /// BT.601 full range YUV.
    Bt601Full,
    /// BT.709 limited range YUV.
    Bt709,
    /// BT.709 full range YUV.
    Bt709Full,
    /// Extended gamut BT.601.
    XvYcc601,
    /// Extended gamut BT.709.
    XvYcc709,
    /// BT.2020 YUV.
    Bt2020,
    /// BT.2020 RGB.
    Bt2020Rgb,
}

impl ColorSpace {
    /// RGB color spaces.
    pub fn is_rgb(self) -> bool {
        matches!(self, Self::Srgb | Self::StudioRgb | Self::Bt2020Rgb)
    }

    /// BT.2020 color spaces.
    pub fn is_bt2020(self) -> bool {
        matches!(self, Self::Bt2020 | Self::Bt2020Rgb)
    }

    /// Extended gamut YUV color spaces.
    pub fn is_xvycc(self) -> bool {
        matches!(self, Self::XvYcc601 | Self::XvYcc709)
    }
}

/// Rotation and mirroring applied to a layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Rotation {
    /// No rotation.
    #[default]
    Identity,
    /// 90 degrees clockwise.
    Rotate90,
    /// 180 degrees.
    Rotate180,
    /// 270 degrees clockwise.
    Rotate270,
    /// Horizontal mirror.
    MirrorHorizontal,
    /// Vertical mirror.
    MirrorVertical,
    /// 90 degrees then horizontal mirror.
    Rotate90MirrorHorizontal,
    /// 90 degrees then vertical mirror.
    Rotate90MirrorVertical,
}

impl Rotation {
    /// Rotations that exchange the horizontal and vertical axes.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Rotate90
                | Self::Rotate270
                | Self::Rotate90MirrorHorizontal
                | Self::Rotate90MirrorVertical
        )
    }
}

/// Sampling mode of a layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ScalingMode {
    /// Point sampling.
    Nearest,
    /// Bilinear sampling.
    #[default]
    Bilinear,
    /// Adaptive video scaling with polyphase coefficient tables.
    Avs,
}

/// Horizontal chroma sample position.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum HorizontalSiting {
    /// Co-sited with the left luma sample.
    #[default]
    Left,
    /// Between two luma samples.
    Center,
    /// Co-sited with the right luma sample.
    Right,
}

/// Vertical chroma sample position.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum VerticalSiting {
    /// Co-sited with the top luma sample.
    #[default]
    Top,
    /// Between two luma rows.
    Center,
    /// Co-sited with the bottom luma sample.
    Bottom,
}

/// Chroma siting of a subsampled surface.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ChromaSiting {
    /// Horizontal position.
    pub horizontal: HorizontalSiting,
    /// Vertical position.
    pub vertical: VerticalSiting,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
