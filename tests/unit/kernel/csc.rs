use super::*;

/// Scales every channel by 0.5 for any supported pair.
struct Halving;

impl ColorMatrices for Halving {
    fn matrix(&self, src: ColorSpace, dst: ColorSpace) -> Option<ColorMatrix> {
        if src == ColorSpace::Bt2020 || dst == ColorSpace::Bt2020 {
            return None;
        }
        Some([
            0.5, 0.0, 0.0, 0.0, //
            0.0, 0.5, 0.0, 0.0, //
            0.0, 0.0, 0.5, 0.0,
        ])
    }
}

fn close(a: &ColorMatrix, b: &ColorMatrix) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
}

#[test]
fn neutral_procamp_is_identity() {
    assert!(close(&procamp_matrix(&Procamp::default()), &IDENTITY_MATRIX));
}

#[test]
fn compose_applies_right_then_left() {
    let shift: ColorMatrix = [
        1.0, 0.0, 0.0, 0.25, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ];
    let half: ColorMatrix = [
        0.5, 0.0, 0.0, 0.0, //
        0.0, 0.5, 0.0, 0.0, //
        0.0, 0.0, 0.5, 0.0,
    ];
    // shift, then halve: offset is halved too.
    let m = compose(&half, &shift);
    assert!((m[0] - 0.5).abs() < 1e-6);
    assert!((m[3] - 0.125).abs() < 1e-6);
    assert!(close(&compose(&IDENTITY_MATRIX, &shift), &shift));
}

#[test]
fn same_space_without_procamp_never_asks_the_provider() {
    let m = slot_matrix(&Halving, ColorSpace::Bt2020, ColorSpace::Bt2020, None).unwrap();
    assert_eq!(m, IDENTITY_MATRIX);
    let any = slot_matrix(&Halving, ColorSpace::Any, ColorSpace::Srgb, None).unwrap();
    assert_eq!(any, IDENTITY_MATRIX);
}

#[test]
fn missing_matrix_is_a_kernel_error() {
    let err = slot_matrix(&Halving, ColorSpace::Bt709, ColorSpace::Bt2020, None).unwrap_err();
    assert!(matches!(err, CompositeError::KernelResolution(_)));
}

#[test]
fn procamp_pivots_through_yuv() {
    let p = Procamp {
        brightness: 10.0,
        ..Procamp::default()
    };
    // YUV source: procamp applied first, then the base conversion.
    let m = slot_matrix(&Halving, ColorSpace::Bt709, ColorSpace::Srgb, Some(&p)).unwrap();
    let expect = compose(
        &Halving
            .matrix(ColorSpace::Bt709, ColorSpace::Srgb)
            .unwrap(),
        &procamp_matrix(&p),
    );
    assert!(close(&m, &expect));

    // RGB to RGB goes through BT.709 and back.
    let rgb = slot_matrix(&Halving, ColorSpace::Srgb, ColorSpace::Srgb, Some(&p)).unwrap();
    assert!(!close(&rgb, &IDENTITY_MATRIX));
}

#[test]
fn procamp_version_moves_only_on_change() {
    let mut t = ProcampTable::default();
    assert_eq!(t.version(0), None);
    assert_eq!(t.update(0, Procamp::default()).unwrap(), 1);
    assert_eq!(t.update(0, Procamp::default()).unwrap(), 1);
    let brighter = Procamp {
        brightness: 5.0,
        ..Procamp::default()
    };
    assert_eq!(t.update(0, brighter).unwrap(), 2);
    assert_eq!(t.params(0), Some(brighter));
    assert!(t.update(PROCAMP_SLOTS as u8, brighter).is_err());
}

#[test]
fn fill_color_is_converted_with_alpha_kept() {
    let out = convert_fill(&Halving, 0x8080_4020, ColorSpace::Srgb, ColorSpace::Bt709).unwrap();
    assert_eq!(out, 0x8040_2010);
    assert_eq!(
        convert_fill(&Halving, 0xff12_3456, ColorSpace::Srgb, ColorSpace::Srgb).unwrap(),
        0xff12_3456
    );
    assert!(convert_fill(&Halving, 0, ColorSpace::Srgb, ColorSpace::Bt2020).is_err());
}
