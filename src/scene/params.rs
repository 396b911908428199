use crate::foundation::core::{ColorSpace, FeedbackId, Rect};
use crate::foundation::error::{CompositeError, CompositeResult};

/// Solid fill written under all layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColorFill {
    /// Fill color as `0xAARRGGBB` (or `0xAAYYUUVV` for YUV color spaces).
    pub color: u32,
    /// Color space `color` is expressed in.
    pub color_space: ColorSpace,
}

/// Non-linear anamorphic scaling: the center of the frame scales linearly, the sides stretch
/// progressively to fill a wider target.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Nlas {
    /// Fraction of the source height cropped before stretching.
    pub vertical_crop: f32,
    /// Fraction of the target width that scales linearly.
    pub horizontal_linear_region: f32,
    /// Fraction of the source width cropped from the stretched sides.
    pub nonlinear_crop: f32,
}

impl Nlas {
    /// Reject values outside `[0, 1)`.
    pub fn validate(self) -> CompositeResult<Self> {
        for (name, v) in [
            ("vertical_crop", self.vertical_crop),
            ("horizontal_linear_region", self.horizontal_linear_region),
            ("nonlinear_crop", self.nonlinear_crop),
        ] {
            if !(0.0..1.0).contains(&v) {
                return Err(CompositeError::validation(format!(
                    "nlas {name} must be in [0, 1), got {v}"
                )));
            }
        }
        Ok(self)
    }
}

/// Call-global parameters of one composite request.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompositeParams {
    /// Background fill; `None` leaves uncovered target pixels untouched.
    pub colorfill: Option<ColorFill>,
    /// Render at reduced size into an intermediate, then scale up into the targets.
    pub constriction: Option<Rect>,
    /// Id under which the call's completion is reported to [`crate::Compositor::query_status`].
    pub feedback_id: Option<FeedbackId>,
    /// Stream index recorded next to the status entry.
    pub stream_index: Option<u32>,
    /// Constant alpha written to targets that carry an alpha channel.
    pub fill_alpha: Option<u8>,
    /// Enable output dithering.
    pub dither: bool,
    /// Force polyphase coefficient tables even for exact 1:1 scaling.
    pub force_polyphase: bool,
    /// Anamorphic stretch of a single adaptively scaled layer in the final phase.
    pub nlas: Option<Nlas>,
}
