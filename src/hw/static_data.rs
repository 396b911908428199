//! Per-generation kernel static data (CURBE).
//!
//! Values are kept typed per generation and only packed into the hardware dword layout when the
//! command stream is emitted.

use crate::foundation::core::{ChromaSiting, HorizontalSiting, Rotation, VerticalSiting};
use crate::hw::caps::HwGeneration;
use crate::kernel::csc::{ColorMatrix, IDENTITY_MATRIX};
use crate::kernel::descriptor::rotation_code;
use crate::scene::params::Nlas;
use crate::schedule::phase::{PhaseLayer, PhaseRequest};
use smallvec::SmallVec;

/// Sampling parameters of one layer slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LayerStatic {
    /// Normalized source step per destination pixel.
    pub(crate) step_x: f32,
    pub(crate) step_y: f32,
    /// Normalized source coordinate of destination pixel 0.
    pub(crate) origin_x: f32,
    pub(crate) origin_y: f32,
    pub(crate) const_alpha: u8,
    pub(crate) rotation: Rotation,
    pub(crate) chroma_siting: Option<ChromaSiting>,
    /// CSC matrix slot the layer is converted with.
    pub(crate) csc_slot: Option<u8>,
}

impl LayerStatic {
    pub(crate) fn from_layer(layer: &PhaseLayer) -> Self {
        let w = layer.width.max(1) as f32;
        let h = layer.height.max(1) as f32;
        let (src_w, src_h) = if layer.rotation.swaps_axes() {
            (layer.src_rect.height(), layer.src_rect.width())
        } else {
            (layer.src_rect.width(), layer.src_rect.height())
        };
        let step_x = src_w as f32 / layer.dst_rect.width().max(1) as f32 / w;
        let step_y = src_h as f32 / layer.dst_rect.height().max(1) as f32 / h;
        Self {
            step_x,
            step_y,
            origin_x: layer.src_rect.left as f32 / w - layer.dst_rect.left as f32 * step_x,
            origin_y: layer.src_rect.top as f32 / h - layer.dst_rect.top as f32 * step_y,
            const_alpha: layer
                .blend
                .map_or(u8::MAX, |b| (b.alpha.clamp(0.0, 1.0) * 255.0).round() as u8),
            rotation: layer.rotation,
            chroma_siting: layer.chroma_siting,
            csc_slot: None,
        }
    }
}

/// Static data of one phase, tagged by generation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum StaticData {
    /// One rotation shared by the whole phase.
    Gen8 {
        colorfill: u32,
        rotation: Rotation,
        dual_output: bool,
        dither: bool,
        luma_low: u8,
        luma_high: u8,
        csc: SmallVec<[ColorMatrix; 4]>,
        layers: SmallVec<[LayerStatic; 8]>,
        nlas: Option<Nlas>,
    },
    /// Per-layer rotation and chroma siting, explicit fill alpha.
    Gen9 {
        colorfill: u32,
        dual_output: bool,
        dither: bool,
        luma_low: u8,
        luma_high: u8,
        fill_alpha: u8,
        csc: SmallVec<[ColorMatrix; 4]>,
        layers: SmallVec<[LayerStatic; 8]>,
        nlas: Option<Nlas>,
    },
}

impl StaticData {
    /// Static data of `phase`.
    ///
    /// `csc` holds the kernel's matrices in slot order and `layer_matrix` the slot each layer
    /// entry converts with. `colorfill` must already be in the kernel's blend color space.
    pub(crate) fn for_phase(
        generation: HwGeneration,
        phase: &PhaseRequest,
        csc: &[ColorMatrix],
        layer_matrix: &[Option<u8>],
        colorfill: u32,
        nlas: Option<Nlas>,
    ) -> Self {
        let (luma_low, luma_high) = phase
            .layers
            .iter()
            .find_map(|l| l.luma_key)
            .map_or((0, 0), |k| (k.low, k.high));
        let layers = phase
            .layers
            .iter()
            .enumerate()
            .map(|(i, l)| LayerStatic {
                csc_slot: layer_matrix.get(i).copied().flatten(),
                ..LayerStatic::from_layer(l)
            })
            .collect();
        let csc = if csc.is_empty() {
            SmallVec::from_slice(&[IDENTITY_MATRIX])
        } else {
            SmallVec::from_slice(csc)
        };
        let dual_output = phase.targets.len() == 2;

        match generation {
            HwGeneration::Gen8 => Self::Gen8 {
                colorfill,
                rotation: phase.rotation,
                dual_output,
                dither: phase.dither,
                luma_low,
                luma_high,
                csc,
                layers,
                nlas,
            },
            HwGeneration::Gen9 | HwGeneration::Gen11 => Self::Gen9 {
                colorfill,
                dual_output,
                dither: phase.dither,
                luma_low,
                luma_high,
                fill_alpha: phase.fill_alpha.unwrap_or(u8::MAX),
                csc,
                layers,
                nlas,
            },
        }
    }

    pub(crate) fn layers(&self) -> &[LayerStatic] {
        match self {
            Self::Gen8 { layers, .. } | Self::Gen9 { layers, .. } => layers,
        }
    }

    /// Pack into the generation's dword layout.
    pub(crate) fn write_wire(&self, out: &mut Vec<u32>) {
        match self {
            Self::Gen8 {
                colorfill,
                rotation,
                dual_output,
                dither,
                luma_low,
                luma_high,
                csc,
                layers,
                nlas,
            } => {
                out.push(*colorfill);
                out.push(
                    u32::from(rotation_code(*rotation))
                        | u32::from(*dual_output) << 3
                        | u32::from(*dither) << 4
                        | u32::from(nlas.is_some()) << 5
                        | u32::from(*luma_low) << 8
                        | u32::from(*luma_high) << 16
                        | counts(layers, csc),
                );
                push_alphas(out, layers);
                push_csc(out, layers, csc);
                push_layers(out, layers);
                push_nlas(out, nlas.as_ref());
            }
            Self::Gen9 {
                colorfill,
                dual_output,
                dither,
                luma_low,
                luma_high,
                fill_alpha,
                csc,
                layers,
                nlas,
            } => {
                out.push(*colorfill);
                out.push(
                    u32::from(*dual_output)
                        | u32::from(*dither) << 1
                        | u32::from(nlas.is_some()) << 2
                        | u32::from(*luma_low) << 8
                        | u32::from(*luma_high) << 16
                        | counts(layers, csc),
                );
                let mut rotations = 0u32;
                let mut sitings = 0u32;
                for (i, l) in layers.iter().enumerate().take(8) {
                    rotations |= u32::from(rotation_code(l.rotation)) << (3 * i);
                    sitings |= u32::from(siting_code(l.chroma_siting)) << (4 * i);
                }
                out.push(rotations);
                out.push(sitings);
                push_alphas(out, layers);
                out.push(u32::from(*fill_alpha));
                push_csc(out, layers, csc);
                push_layers(out, layers);
                push_nlas(out, nlas.as_ref());
            }
        }
    }
}

/// Layer count in bits 24-27, matrix count in bits 28-31.
fn counts(layers: &[LayerStatic], csc: &[ColorMatrix]) -> u32 {
    (layers.len().min(0xf) as u32) << 24 | (csc.len().min(0xf) as u32) << 28
}

/// Slot map (one nibble per layer, `0xf` for none), then every matrix in slot order.
fn push_csc(out: &mut Vec<u32>, layers: &[LayerStatic], csc: &[ColorMatrix]) {
    let mut map = u32::MAX;
    for (i, l) in layers.iter().enumerate().take(8) {
        if let Some(slot) = l.csc_slot {
            map &= !(0xf << (4 * i));
            map |= u32::from(slot & 0xf) << (4 * i);
        }
    }
    out.push(map);
    for m in csc {
        out.extend(m.iter().map(|c| c.to_bits()));
    }
}

fn push_nlas(out: &mut Vec<u32>, nlas: Option<&Nlas>) {
    if let Some(n) = nlas {
        out.extend([
            n.vertical_crop.to_bits(),
            n.horizontal_linear_region.to_bits(),
            n.nonlinear_crop.to_bits(),
        ]);
    }
}

fn push_alphas(out: &mut Vec<u32>, layers: &[LayerStatic]) {
    let mut words = [0u32; 2];
    for (i, l) in layers.iter().enumerate().take(8) {
        words[i / 4] |= u32::from(l.const_alpha) << (8 * (i % 4));
    }
    out.extend_from_slice(&words);
}

fn push_layers(out: &mut Vec<u32>, layers: &[LayerStatic]) {
    for l in layers {
        out.extend([
            l.step_x.to_bits(),
            l.step_y.to_bits(),
            l.origin_x.to_bits(),
            l.origin_y.to_bits(),
        ]);
    }
}

/// 4-bit siting code: horizontal in bits 0-1, vertical in bits 2-3, zero when unspecified.
fn siting_code(siting: Option<ChromaSiting>) -> u8 {
    let Some(s) = siting else {
        return 0;
    };
    let h = match s.horizontal {
        HorizontalSiting::Left => 1,
        HorizontalSiting::Center => 2,
        HorizontalSiting::Right => 3,
    };
    let v = match s.vertical {
        VerticalSiting::Top => 1,
        VerticalSiting::Center => 2,
        VerticalSiting::Bottom => 3,
    };
    h | v << 2
}

#[cfg(test)]
#[path = "../../tests/unit/hw/static_data.rs"]
mod tests;
