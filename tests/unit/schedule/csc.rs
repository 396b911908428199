use super::*;
use crate::foundation::core::{Rect, Rotation, ScalingMode, SurfaceId};

fn layer(role: LayerRole, format: SurfaceFormat, color_space: ColorSpace) -> PhaseLayer {
    PhaseLayer {
        surface: SurfaceId(1),
        role,
        format,
        width: 64,
        height: 64,
        src_rect: Rect::new(0, 0, 64, 64),
        dst_rect: Rect::new(0, 0, 64, 64),
        rotation: Rotation::Identity,
        scaling: ScalingMode::Bilinear,
        color_space,
        blend: None,
        luma_key: None,
        procamp_slot: None,
        deinterlace: None,
        chroma_siting: None,
        source_index: Some(0),
    }
}

#[test]
fn majority_space_wins() {
    let layers = [
        layer(LayerRole::MainVideo, SurfaceFormat::Nv12, ColorSpace::Bt709),
        layer(LayerRole::Graphics, SurfaceFormat::Argb, ColorSpace::Srgb),
        layer(LayerRole::Graphics, SurfaceFormat::Argb, ColorSpace::Srgb),
    ];
    assert_eq!(choose_intermediate_space(&layers, SurfaceFormat::Argb), ColorSpace::Srgb);
}

#[test]
fn ties_go_to_main_video() {
    let layers = [
        layer(LayerRole::Graphics, SurfaceFormat::Argb, ColorSpace::Srgb),
        layer(LayerRole::MainVideo, SurfaceFormat::Nv12, ColorSpace::Bt601),
    ];
    assert_eq!(choose_intermediate_space(&layers, SurfaceFormat::Argb), ColorSpace::Bt601);
}

#[test]
fn procamp_counts_as_a_conversion() {
    let mut adjusted = layer(LayerRole::MainVideo, SurfaceFormat::Nv12, ColorSpace::Bt709);
    adjusted.procamp_slot = Some(0);
    let layers = [
        adjusted,
        layer(LayerRole::Graphics, SurfaceFormat::Argb, ColorSpace::Srgb),
    ];
    assert_eq!(choose_intermediate_space(&layers, SurfaceFormat::Argb), ColorSpace::Srgb);
}

#[test]
fn xvycc_passes_through_to_yuv_targets() {
    let layers = [
        layer(LayerRole::Graphics, SurfaceFormat::Argb, ColorSpace::Srgb),
        layer(LayerRole::MainVideo, SurfaceFormat::Nv12, ColorSpace::XvYcc709),
    ];
    assert_eq!(choose_intermediate_space(&layers, SurfaceFormat::Nv12), ColorSpace::XvYcc709);
    assert_eq!(translate(ColorSpace::XvYcc709), ColorSpace::Bt709);
    assert_eq!(translate(ColorSpace::XvYcc601), ColorSpace::Bt601);
}

#[test]
fn palettes_do_not_vote() {
    let layers = [
        layer(LayerRole::Subpicture, SurfaceFormat::Ai44, ColorSpace::Srgb),
        layer(LayerRole::Subpicture, SurfaceFormat::Ia44, ColorSpace::Srgb),
        layer(LayerRole::MainVideo, SurfaceFormat::Nv12, ColorSpace::Bt709),
    ];
    assert_eq!(choose_intermediate_space(&layers, SurfaceFormat::Argb), ColorSpace::Bt709);
}

#[test]
fn intermediate_format_by_space() {
    assert_eq!(intermediate_format(ColorSpace::Srgb), SurfaceFormat::Argb);
    assert_eq!(intermediate_format(ColorSpace::Bt709), SurfaceFormat::Ayuv);
}
