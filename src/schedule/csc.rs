use crate::foundation::core::{ColorSpace, SurfaceFormat};
use crate::scene::layer::LayerRole;
use crate::schedule::phase::PhaseLayer;

/// Map extended-gamut spaces onto the base space the kernels convert from.
pub(crate) fn translate(cs: ColorSpace) -> ColorSpace {
    match cs {
        ColorSpace::XvYcc601 => ColorSpace::Bt601,
        ColorSpace::XvYcc709 => ColorSpace::Bt709,
        other => other,
    }
}

/// Choose the color space intermediates are composited in.
///
/// Picks the space needing the fewest per-layer conversions (procamp counts as one), breaking
/// ties toward the first main-video layer. Extended-gamut input is passed through untouched when
/// the target is YUV.
pub(crate) fn choose_intermediate_space(
    layers: &[PhaseLayer],
    target_format: SurfaceFormat,
) -> ColorSpace {
    let yuv_target = !target_format.is_rgb();
    let main = layers
        .iter()
        .find(|l| l.role == LayerRole::MainVideo)
        .map(|l| l.color_space);

    if yuv_target && let Some(l) = layers.iter().find(|l| l.color_space.is_xvycc()) {
        return l.color_space;
    }

    let counted = |l: &&PhaseLayer| !l.format.is_palette() && l.color_space != ColorSpace::Any;
    let mut candidates: Vec<ColorSpace> = Vec::new();
    for l in layers.iter().filter(counted) {
        let cs = translate(l.color_space);
        if !candidates.contains(&cs) {
            candidates.push(cs);
        }
    }

    let mut best: Option<(ColorSpace, usize)> = None;
    for cs in candidates {
        let conversions = layers
            .iter()
            .filter(counted)
            .filter(|l| translate(l.color_space) != cs || l.procamp_slot.is_some())
            .count();
        best = match best {
            None => Some((cs, conversions)),
            Some((_, min)) if conversions < min => Some((cs, conversions)),
            Some((_, min)) if conversions == min && Some(cs) == main => Some((cs, conversions)),
            keep => keep,
        };
    }

    match best {
        Some((cs, conversions)) => {
            tracing::trace!(?cs, conversions, "intermediate color space");
            cs
        }
        None => layers.first().map_or(ColorSpace::Any, |l| l.color_space),
    }
}

/// Intermediate surface format for `cs`.
pub(crate) fn intermediate_format(cs: ColorSpace) -> SurfaceFormat {
    if cs.is_rgb() {
        SurfaceFormat::Argb
    } else {
        SurfaceFormat::Ayuv
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/csc.rs"]
mod tests;
