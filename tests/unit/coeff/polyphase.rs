use super::*;

fn rows_sum_to_unit(table: &[i32], taps: usize) -> bool {
    table.chunks(taps).all(|row| row.iter().sum::<i32>() == COEF_UNIT)
}

#[test]
fn nearest_table_places_single_full_weight_tap() {
    let t = nearest_table(Plane::Y, 32, false);
    assert_eq!(t.len(), 32 * Y_TAPS);
    assert_eq!(t[3], COEF_UNIT);
    assert_eq!(t[16 * Y_TAPS + 3], COEF_UNIT);
    // Upper phases stay empty without balancing.
    assert!(t[17 * Y_TAPS..].iter().all(|c| *c == 0));

    let b = nearest_table(Plane::Uv, 32, true);
    assert_eq!(b[17 * UV_TAPS + 2], COEF_UNIT);
    assert!(rows_sum_to_unit(&b, UV_TAPS));
}

#[test]
fn nearest_table_respects_short_phase_counts() {
    let t = nearest_table(Plane::Y, 17, true);
    assert_eq!(t.len(), 17 * Y_TAPS);
    assert!(rows_sum_to_unit(&t, Y_TAPS));
}

#[test]
fn polyphase_rows_are_normalized() {
    for scale in [0.25f32, 0.5, 0.9, 1.0] {
        let y = polyphase_y(scale, Plane::Y, SurfaceFormat::Nv12, 0.0, 32);
        assert!(rows_sum_to_unit(&y, Y_TAPS), "scale {scale}");
        let uv = polyphase_y(scale, Plane::Uv, SurfaceFormat::Nv12, 0.0, 17);
        assert!(rows_sum_to_unit(&uv, UV_TAPS), "scale {scale}");
    }
}

#[test]
fn polyphase_phase_zero_is_centered() {
    let y = polyphase_y(1.0, Plane::Y, SurfaceFormat::Nv12, 0.0, 32);
    let row0 = &y[..Y_TAPS];
    let max = row0.iter().copied().max().unwrap_or_default();
    assert_eq!(row0[3], max);
}

#[test]
fn chroma_offsets_follow_siting() {
    let centered = ChromaSiting {
        horizontal: HorizontalSiting::Center,
        vertical: VerticalSiting::Bottom,
    };
    assert_eq!(siting_offset(Some(centered), false), Some(8));
    assert_eq!(siting_offset(Some(centered), true), Some(16));
    assert_eq!(siting_offset(Some(ChromaSiting::default()), false), None);
    assert_eq!(siting_offset(None, true), None);

    let uv = polyphase_uv(3.0, 0.5, 8);
    assert!(rows_sum_to_unit(&uv, UV_TAPS));
    let plain = polyphase_uv(2.0, 1.0, 0);
    assert!(rows_sum_to_unit(&plain, UV_TAPS));
    assert_ne!(uv, plain);
}
