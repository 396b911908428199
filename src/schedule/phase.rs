use crate::foundation::core::{
    ChromaSiting, ColorSpace, Rect, Rotation, ScalingMode, SurfaceFormat, SurfaceId,
};
use crate::hw::caps::PhaseBudget;
use crate::scene::layer::{Blend, Deinterlace, Layer, LayerRole, LumaKey};
use crate::scene::params::ColorFill;
use crate::surface::SurfaceInfo;
use smallvec::SmallVec;

/// Sampler class bits a phase may still use.
pub(crate) const SAMPLER_NEAREST: u8 = 1;
pub(crate) const SAMPLER_BILINEAR: u8 = 2;
pub(crate) const SAMPLER_LUMAKEY: u8 = 4;
pub(crate) const SAMPLER_ALL: u8 = SAMPLER_NEAREST | SAMPLER_BILINEAR | SAMPLER_LUMAKEY;

/// A layer as placed into one phase. Input layers, intermediates and rotated intermediates all
/// take this shape.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PhaseLayer {
    pub(crate) surface: SurfaceId,
    pub(crate) role: LayerRole,
    pub(crate) format: SurfaceFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) src_rect: Rect,
    pub(crate) dst_rect: Rect,
    pub(crate) rotation: Rotation,
    /// Effective scaling mode; rewritten by the scaling pre-pass and by `try_add_layer`.
    pub(crate) scaling: ScalingMode,
    pub(crate) color_space: ColorSpace,
    pub(crate) blend: Option<Blend>,
    pub(crate) luma_key: Option<LumaKey>,
    pub(crate) procamp_slot: Option<u8>,
    pub(crate) deinterlace: Option<Deinterlace>,
    pub(crate) chroma_siting: Option<ChromaSiting>,
    /// Index into the caller's layer list, `None` for intermediates.
    pub(crate) source_index: Option<usize>,
}

impl PhaseLayer {
    pub(crate) fn from_layer(
        layer: &Layer,
        info: &SurfaceInfo,
        procamp_slot: Option<u8>,
        source_index: usize,
    ) -> Self {
        Self {
            surface: layer.surface,
            role: layer.role,
            format: info.format,
            width: info.width,
            height: info.height,
            src_rect: layer.src_rect,
            dst_rect: layer.dst_rect,
            rotation: layer.rotation,
            scaling: layer.scaling_mode,
            color_space: layer.color_space,
            blend: layer.blend,
            luma_key: layer.luma_key,
            procamp_slot,
            deinterlace: layer.deinterlace,
            chroma_siting: layer.chroma_siting,
            source_index: Some(source_index),
        }
    }

    /// Output of a previous phase read back as an opaque input.
    pub(crate) fn intermediate(
        target: &PhaseTarget,
        role: LayerRole,
        src_rect: Rect,
        dst_rect: Rect,
    ) -> Self {
        Self {
            surface: target.surface,
            role,
            format: target.format,
            width: target.width,
            height: target.height,
            src_rect,
            dst_rect,
            rotation: Rotation::Identity,
            scaling: ScalingMode::Bilinear,
            color_space: target.color_space,
            blend: None,
            luma_key: None,
            procamp_slot: None,
            deinterlace: None,
            chroma_siting: None,
            source_index: None,
        }
    }

    /// Horizontal and vertical scale factors, in output orientation.
    pub(crate) fn scale_factors(&self) -> (f32, f32) {
        let (sw, sh) = if self.rotation.swaps_axes() {
            (self.src_rect.height(), self.src_rect.width())
        } else {
            (self.src_rect.width(), self.src_rect.height())
        };
        let sx = self.dst_rect.width() as f32 / sw.max(1) as f32;
        let sy = self.dst_rect.height() as f32 / sh.max(1) as f32;
        (sx, sy)
    }

    /// Source and destination rectangles have the same size.
    pub(crate) fn is_one_to_one(&self) -> bool {
        self.dst_rect.width() == self.src_rect.width()
            && self.dst_rect.height() == self.src_rect.height()
    }
}

/// One render target of a phase: a real target or an intermediate.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PhaseTarget {
    pub(crate) surface: SurfaceId,
    pub(crate) format: SurfaceFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) dst_rect: Rect,
    pub(crate) color_space: ColorSpace,
    pub(crate) procamp_slot: Option<u8>,
}

/// Remaining kernel resources of a phase under construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ResourceCounters {
    pub(crate) layers: i32,
    pub(crate) palettes: i32,
    pub(crate) procamp: i32,
    pub(crate) luma_keys: i32,
    pub(crate) avs: i32,
    pub(crate) sampler: u8,
}

impl ResourceCounters {
    pub(crate) fn from_budget(b: PhaseBudget) -> Self {
        Self {
            layers: b.layers,
            palettes: b.palettes,
            procamp: b.procamp,
            luma_keys: b.luma_keys,
            avs: b.avs,
            sampler: SAMPLER_ALL,
        }
    }

    fn exhausted(&self) -> bool {
        self.layers < 0
            || self.palettes < 0
            || self.procamp < 0
            || self.luma_keys < 0
            || self.avs < 0
            || self.sampler == 0
    }
}

/// One kernel-compatible unit of a composition.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PhaseRequest {
    pub(crate) layers: SmallVec<[PhaseLayer; 8]>,
    pub(crate) targets: SmallVec<[PhaseTarget; 2]>,
    pub(crate) counters: ResourceCounters,
    /// Shared rotation of the phase when the sampler cannot rotate per layer.
    pub(crate) rotation: Rotation,
    pub(crate) sampler_rotation: bool,
    pub(crate) skip_blocks: bool,
    pub(crate) force_skip_colorfill: bool,
    pub(crate) colorfill: Option<ColorFill>,
    pub(crate) fill_alpha: Option<u8>,
    pub(crate) dither: bool,
    /// Set while rendering into the reduced-size constriction intermediate.
    pub(crate) constriction: Option<Rect>,
    /// Output region the block walk covers.
    pub(crate) output_rect: Rect,
    /// The phase writes the caller's real target(s).
    pub(crate) writes_final_target: bool,
}

impl PhaseRequest {
    pub(crate) fn new(budget: PhaseBudget, sampler_rotation: bool) -> Self {
        Self {
            layers: SmallVec::new(),
            targets: SmallVec::new(),
            counters: ResourceCounters::from_budget(budget),
            rotation: Rotation::Identity,
            sampler_rotation,
            skip_blocks: true,
            force_skip_colorfill: false,
            colorfill: None,
            fill_alpha: None,
            dither: false,
            constriction: None,
            output_rect: Rect::default(),
            writes_final_target: false,
        }
    }

    /// Try to place `layer` in the next slot.
    ///
    /// Counters, the effective scaling mode and the phase rotation are only committed when the
    /// layer fits; on failure the phase is left exactly as it was.
    pub(crate) fn try_add_layer(&mut self, mut layer: PhaseLayer) -> Result<(), PhaseLayer> {
        let n = self.layers.len();

        let rotation_ok = self.sampler_rotation
            || match n {
                0 => true,
                1 => layer.rotation == Rotation::Identity || layer.rotation == self.rotation,
                _ => self.layers.last().is_some_and(|prev| prev.rotation == layer.rotation),
            };

        let mut c = self.counters;
        let mut force_first_avs = false;
        c.layers -= 1;
        if layer.format.is_palette() {
            c.palettes -= 1;
        }
        if layer.procamp_slot.is_some() {
            c.procamp -= 1;
        }

        if layer.luma_key.is_some() {
            c.luma_keys -= 1;
            if c.luma_keys < 0 || n > 1 {
                return Err(layer);
            }
            if n == 1 {
                // The keyed layer takes the 3D sampler, so the bottom layer moves to AVS.
                if self.layers[0].scaling != ScalingMode::Avs {
                    force_first_avs = true;
                    c.avs -= 1;
                }
                c.sampler = SAMPLER_ALL;
            }
        }

        let keyed_above = layer.luma_key.is_some() && n > 0;
        let mut scaling = layer.scaling;
        if layer.scaling == ScalingMode::Avs
            && layer.luma_key.is_none()
            && layer.deinterlace.is_none()
        {
            c.avs -= 1;
        } else if !layer.format.is_planar3() {
            let (mode, bit) = if layer.is_one_to_one() {
                (ScalingMode::Nearest, SAMPLER_NEAREST)
            } else {
                (ScalingMode::Bilinear, SAMPLER_BILINEAR)
            };
            if keyed_above {
                scaling = mode;
                c.sampler &= SAMPLER_LUMAKEY;
            } else if c.sampler & bit != 0 {
                scaling = mode;
                c.sampler &= bit;
            } else {
                scaling = ScalingMode::Avs;
                c.avs -= 1;
            }
        }

        if c.exhausted() || !rotation_ok {
            return Err(layer);
        }

        if n == 0 && !self.sampler_rotation {
            self.rotation = layer.rotation;
        }
        if force_first_avs {
            self.layers[0].scaling = ScalingMode::Avs;
        }
        layer.scaling = scaling;
        self.counters = c;
        self.layers.push(layer);
        Ok(())
    }

    /// Set the phase's primary target. Returns `false` when its procamp does not fit, in which
    /// case the target is added without procamp.
    pub(crate) fn add_target(&mut self, mut target: PhaseTarget) -> bool {
        let fits = if target.procamp_slot.is_some() {
            self.counters.procamp -= 1;
            if self.counters.procamp < 0 {
                self.counters.procamp += 1;
                target.procamp_slot = None;
                false
            } else {
                true
            }
        } else {
            true
        };
        self.targets.clear();
        self.targets.push(target);
        fits
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/phase.rs"]
mod tests;
