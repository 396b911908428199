use crate::foundation::core::{ScalingMode, SurfaceFormat};
use crate::schedule::phase::{PhaseLayer, PhaseRequest, PhaseTarget};

/// Smallest scale factor (exclusive) the adaptive scaler handles.
pub(crate) const AVS_MIN_SCALE: f32 = 0.0625;

/// Settle the sampling mode of every layer of `phase` before its kernel is resolved.
///
/// Phases rendering into a constriction intermediate sample everything bilinearly.
pub(crate) fn realize_scaling(phase: &mut PhaseRequest) {
    let constricted = phase.constriction.is_some();
    let count = phase.layers.len();
    let Some(target) = phase.targets.first().cloned() else {
        return;
    };
    for layer in &mut phase.layers {
        if constricted {
            layer.scaling = ScalingMode::Bilinear;
        } else {
            layer.scaling = scaling_mode(layer, count, &target);
        }
    }
}

/// Effective scaling mode of `layer` in a phase of `count` layers.
pub(crate) fn scaling_mode(
    layer: &PhaseLayer,
    count: usize,
    target: &PhaseTarget,
) -> ScalingMode {
    if layer.scaling != ScalingMode::Avs {
        return layer.scaling;
    }
    let (sx, sy) = layer.scale_factors();

    let mode = if sx <= AVS_MIN_SCALE || sy <= AVS_MIN_SCALE {
        tracing::debug!(sx, sy, "scale below adaptive scaler range, using bilinear");
        ScalingMode::Bilinear
    } else if layer.deinterlace.is_some() {
        tracing::debug!("bob deinterlacing samples bilinearly");
        ScalingMode::Bilinear
    } else if sx == 1.0 && sy == 1.0 && count == 1 && !needs_chroma_upsampling(layer, target) {
        ScalingMode::Bilinear
    } else {
        ScalingMode::Avs
    };

    if mode == ScalingMode::Avs && count > 1 && layer.format == SurfaceFormat::P010 {
        tracing::debug!("P010 in a multi-layer phase falls back to bilinear");
        return ScalingMode::Bilinear;
    }
    mode
}

fn needs_chroma_upsampling(layer: &PhaseLayer, target: &PhaseTarget) -> bool {
    layer.format.has_subsampled_chroma() && !target.format.has_subsampled_chroma()
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scaling.rs"]
mod tests;
