use crate::foundation::core::ColorSpace;
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::scene::layer::Procamp;

/// Number of procamp parameter sets tracked across calls.
pub(crate) const PROCAMP_SLOTS: usize = 4;

/// Row-major 3x4 affine color matrix: three rows of `[c0, c1, c2, offset]`.
pub type ColorMatrix = [f32; 12];

/// Identity [`ColorMatrix`].
pub const IDENTITY_MATRIX: ColorMatrix = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0,
];

/// Source of base color-space conversion matrices, supplied by the embedder.
///
/// Matrices operate on normalized `[0, 1]` channel values. Conversions between equal color
/// spaces never reach the provider.
pub trait ColorMatrices {
    /// Matrix converting `src` to `dst`, or `None` when the pair is unsupported.
    fn matrix(&self, src: ColorSpace, dst: ColorSpace) -> Option<ColorMatrix>;
}

#[derive(Clone, Copy, Debug)]
struct ProcampSlot {
    params: Procamp,
    version: u32,
}

/// Procamp parameter sets with change versions.
///
/// A slot's version only moves when its parameters change, which is what lets cached kernels
/// keep their procamp matrix across calls.
#[derive(Debug, Default)]
pub(crate) struct ProcampTable {
    slots: [Option<ProcampSlot>; PROCAMP_SLOTS],
}

impl ProcampTable {
    pub(crate) fn update(&mut self, slot: u8, params: Procamp) -> CompositeResult<u32> {
        let entry = self
            .slots
            .get_mut(usize::from(slot))
            .ok_or_else(|| {
                CompositeError::validation(format!("procamp slot {slot} out of range"))
            })?;
        match entry {
            Some(s) if s.params == params => Ok(s.version),
            Some(s) => {
                s.params = params;
                s.version = s.version.wrapping_add(1);
                tracing::trace!(slot, version = s.version, "procamp changed");
                Ok(s.version)
            }
            None => {
                *entry = Some(ProcampSlot { params, version: 1 });
                Ok(1)
            }
        }
    }

    pub(crate) fn version(&self, slot: u8) -> Option<u32> {
        self.slots
            .get(usize::from(slot))
            .copied()
            .flatten()
            .map(|s| s.version)
    }

    pub(crate) fn params(&self, slot: u8) -> Option<Procamp> {
        self.slots
            .get(usize::from(slot))
            .copied()
            .flatten()
            .map(|s| s.params)
    }
}

/// `a ∘ b`: apply `b`, then `a`.
pub(crate) fn compose(a: &ColorMatrix, b: &ColorMatrix) -> ColorMatrix {
    let mut out = [0.0f32; 12];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 4 + c] = (0..3).map(|k| a[r * 4 + k] * b[k * 4 + c]).sum();
        }
        out[r * 4 + 3] = (0..3).map(|k| a[r * 4 + k] * b[k * 4 + 3]).sum::<f32>() + a[r * 4 + 3];
    }
    out
}

/// Procamp as a matrix on normalized limited-range YUV.
pub(crate) fn procamp_matrix(p: &Procamp) -> ColorMatrix {
    let black = 16.0 / 255.0;
    let mid = 128.0 / 255.0;
    let (sin, cos) = p.hue.to_radians().sin_cos();
    let c = p.contrast;
    let cs = p.contrast * p.saturation;
    let brightness = p.brightness / 255.0;
    [
        c, 0.0, 0.0, black - c * black + brightness, //
        0.0, cs * cos, cs * sin, mid - cs * (cos + sin) * mid, //
        0.0, -cs * sin, cs * cos, mid - cs * (cos - sin) * mid,
    ]
}

fn base(
    matrices: &dyn ColorMatrices,
    src: ColorSpace,
    dst: ColorSpace,
) -> CompositeResult<ColorMatrix> {
    if src == dst || src == ColorSpace::Any || dst == ColorSpace::Any {
        return Ok(IDENTITY_MATRIX);
    }
    matrices.matrix(src, dst).ok_or_else(|| {
        CompositeError::kernel(format!("no color matrix from {src:?} to {dst:?}"))
    })
}

/// Convert a packed `0xAACCCCCC` fill color from `src` to `dst`. Alpha passes through.
pub(crate) fn convert_fill(
    matrices: &dyn ColorMatrices,
    color: u32,
    src: ColorSpace,
    dst: ColorSpace,
) -> CompositeResult<u32> {
    if src == dst || src == ColorSpace::Any || dst == ColorSpace::Any {
        return Ok(color);
    }
    let m = base(matrices, src, dst)?;
    let ch = [color >> 16, color >> 8, color].map(|c| (c & 0xff) as f32 / 255.0);
    let mut out = color & 0xff00_0000;
    for (r, shift) in [16u32, 8, 0].into_iter().enumerate() {
        let row = &m[r * 4..r * 4 + 4];
        let v = row[0] * ch[0] + row[1] * ch[1] + row[2] * ch[2] + row[3];
        out |= ((v.clamp(0.0, 1.0) * 255.0).round() as u32) << shift;
    }
    Ok(out)
}

/// Matrix for one kernel CSC slot.
///
/// Procamp runs in YUV: in `src` when it is YUV, otherwise in `dst`, falling back to BT.709.
pub(crate) fn slot_matrix(
    matrices: &dyn ColorMatrices,
    src: ColorSpace,
    dst: ColorSpace,
    procamp: Option<&Procamp>,
) -> CompositeResult<ColorMatrix> {
    let Some(p) = procamp else {
        return base(matrices, src, dst);
    };
    let pivot = if !src.is_rgb() && src != ColorSpace::Any {
        src
    } else if !dst.is_rgb() && dst != ColorSpace::Any {
        dst
    } else {
        ColorSpace::Bt709
    };
    let into = base(matrices, src, pivot)?;
    let out = base(matrices, pivot, dst)?;
    Ok(compose(&out, &compose(&procamp_matrix(p), &into)))
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/csc.rs"]
mod tests;
