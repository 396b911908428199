use crate::foundation::core::{ChromaSiting, HorizontalSiting, SurfaceFormat, VerticalSiting};
use crate::foundation::math::{lanczos, sinc};
use std::f32::consts::PI;

/// Fixed-point unit of one coefficient (6 fractional bits).
pub(crate) const COEF_UNIT: i32 = 1 << 6;
/// Taps of the luma (or G channel) filter.
pub(crate) const Y_TAPS: usize = 8;
/// Taps of the chroma (or R/B channel) filter.
pub(crate) const UV_TAPS: usize = 4;
/// Sub-pixel positions the polyphase math is defined over.
pub(crate) const NUM_POLYPHASE_TABLES: usize = 32;
/// Phases of the chroma tables, independent of the generation.
pub(crate) const UV_PHASES: usize = 32;

/// Which channel group a table feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Plane {
    /// Luma or the G channel of RGB.
    Y,
    /// Chroma or the R/B channels of RGB.
    Uv,
}

/// Nearest-mode table: a single full-weight tap per phase.
///
/// Balanced tables move the tap one position right for the upper half of the phases.
pub(crate) fn nearest_table(plane: Plane, phases: usize, balanced: bool) -> Vec<i32> {
    let (taps, offset) = match plane {
        Plane::Y => (Y_TAPS, 3),
        Plane::Uv => (UV_TAPS, 1),
    };
    let mut out = vec![0; phases * taps];
    let half = NUM_POLYPHASE_TABLES / 2;
    for i in 0..=half.min(phases.saturating_sub(1)) {
        out[i * taps + offset] = COEF_UNIT;
    }
    if balanced {
        for i in (half + 1)..phases.min(NUM_POLYPHASE_TABLES) {
            out[i * taps + offset + 1] = COEF_UNIT;
        }
    }
    out
}

/// Lanczos polyphase table for luma-style planes.
///
/// `plane` picks the window: 8 taps with a Lanczos T of 4 (downscale) or 8 for luma of YUV and
/// wide RGB/YUV 4:4:4 formats, 4 taps with T = 2 otherwise. `hp_strength` blends in a 3-tap
/// sharpening kernel (0 disables it).
pub(crate) fn polyphase_y(
    scale: f32,
    plane: Plane,
    format: SurfaceFormat,
    hp_strength: f32,
    phases: usize,
) -> Vec<i32> {
    let taps = match plane {
        Plane::Y => Y_TAPS,
        Plane::Uv => UV_TAPS,
    };
    let center = (taps / 2 - 1) as i32;
    let start = -(center as f32);
    let wide = plane == Plane::Y && (format.is_yuv() || format.is_rgb32());
    let t = if !wide {
        2.0
    } else if scale < 1.0 {
        4.0
    } else {
        8.0
    };

    let mut out = vec![0; phases * taps];
    let mut coefs = [0f32; Y_TAPS];
    let mut raw = [0f32; Y_TAPS];
    for i in 0..phases {
        let base = start - i as f32 / NUM_POLYPHASE_TABLES as f32;
        let mut sum = 0.0f32;
        for j in 0..taps {
            let pos = base + j as f32;
            raw[j] = lanczos(pos * scale, taps as u32, t);
            coefs[j] = raw[j];
            sum += raw[j];
        }

        if plane == Plane::Y {
            let half_phase = if i <= NUM_POLYPHASE_TABLES / 2 {
                i as f32 / NUM_POLYPHASE_TABLES as f32
            } else {
                (NUM_POLYPHASE_TABLES - i) as f32 / NUM_POLYPHASE_TABLES as f32
            };
            let edge = -hp_strength * sinc(half_phase * PI);
            let hp = [edge, 1.0 + 2.0 * hp_strength, edge];
            for j in 0..taps {
                let mut acc = 0.0f32;
                for (k, w) in hp.iter().enumerate() {
                    let idx = j as i64 + k as i64 - 1;
                    if idx >= 0 && (idx as usize) < taps {
                        acc += raw[idx as usize] * w;
                    }
                }
                coefs[j] = acc;
            }
        }

        let row = &mut out[i * taps..(i + 1) * taps];
        quantize_row(row, &coefs[..taps], sum);
        let fix = if i <= NUM_POLYPHASE_TABLES / 2 {
            center as usize
        } else {
            center as usize + 1
        };
        let total: i32 = row.iter().sum();
        row[fix] -= total - COEF_UNIT;
    }
    out
}

/// Balanced 4-tap chroma table with an optional siting offset.
///
/// `phase_offset` is in 1/16 pixel units relative to [`UV_PHASES`]. Non-zero offsets use a
/// 6-entry Lanczos window and switch to T = 3 when downscaling.
pub(crate) fn polyphase_uv(lanczos_t: f32, inverse_scale: f32, phase_offset: i32) -> Vec<i32> {
    let phases = UV_PHASES as i32;
    let center = (UV_TAPS / 2 - 1) as i32;
    let start = -(center as f64) + f64::from(phase_offset) / f64::from(phases);
    let sf = inverse_scale.min(1.0) as f64;
    let (window, t) = if phase_offset == 0 {
        (UV_TAPS as u32, lanczos_t)
    } else if sf < 1.0 {
        (6, 3.0)
    } else {
        (6, lanczos_t)
    };

    let mut out = vec![0; UV_PHASES * UV_TAPS];
    for i in 0..phases {
        let base = start - f64::from(i) / f64::from(phases);
        let mut coefs = [0f32; UV_TAPS];
        let mut sum = 0.0f32;
        for (j, c) in coefs.iter_mut().enumerate() {
            let pos = base + j as f64;
            *c = lanczos((pos * sf) as f32, window, t);
            sum += *c;
        }
        let row = &mut out[i as usize * UV_TAPS..(i as usize + 1) * UV_TAPS];
        quantize_row(row, &coefs, sum);
        let total: i32 = row.iter().sum();
        let fix = if i - phase_offset <= phases / 2 {
            center as usize
        } else {
            center as usize + 1
        };
        row[fix] -= total - COEF_UNIT;
    }
    out
}

fn quantize_row(row: &mut [i32], coefs: &[f32], sum: f32) {
    for (dst, c) in row.iter_mut().zip(coefs) {
        *dst = (0.5 + COEF_UNIT as f32 * c / sum).floor() as i32;
    }
}

/// Chroma phase offset (1/16 pixel) for the siting along one axis, `None` for co-sited chroma.
pub(crate) fn siting_offset(siting: Option<ChromaSiting>, vertical: bool) -> Option<i32> {
    let s = siting?;
    let cosited = if vertical {
        s.vertical == VerticalSiting::Top
    } else {
        s.horizontal == HorizontalSiting::Left
    };
    if cosited {
        return None;
    }
    let centered = if vertical {
        s.vertical == VerticalSiting::Center
    } else {
        s.horizontal == HorizontalSiting::Center
    };
    Some(if centered { 8 } else { 16 })
}

#[cfg(test)]
#[path = "../../tests/unit/coeff/polyphase.rs"]
mod tests;
