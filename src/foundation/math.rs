use std::f32::consts::PI;

pub(crate) fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-9 { 1.0 } else { x.sin() / x }
}

/// Lanczos kernel windowed to `num_entries / 2` taps on each side.
///
/// `t` is raised to at least half the window so short filters do not over-sharpen.
pub(crate) fn lanczos(x: f32, num_entries: u32, t: f32) -> f32 {
    let half = (num_entries >> 1) as f32;
    let t = t.max(half);
    if x.abs() >= half {
        return 0.0;
    }
    let x = x * PI;
    sinc(x) * sinc(x / t)
}

/// Round `v` up to the next multiple of `align` (`align` must be a power of two).
pub(crate) fn align_up(v: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (v + align - 1) & !(align - 1)
}

pub(crate) fn align_up_u32(v: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    v.saturating_add(align - 1) & !(align - 1)
}

/// Wrapping comparison of two monotonically increasing 32-bit tags.
///
/// Returns `true` when `a` was issued before `b`, tolerating one wraparound.
pub(crate) fn tag_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Return `true` once the device has reported `tag` complete.
pub(crate) fn tag_reached(reported: u32, tag: u32) -> bool {
    (reported.wrapping_sub(tag) as i32) >= 0
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
