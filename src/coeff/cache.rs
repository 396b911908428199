use crate::coeff::polyphase::{
    NUM_POLYPHASE_TABLES, Plane, nearest_table, polyphase_uv, polyphase_y, siting_offset,
};
use crate::foundation::core::{ChromaSiting, SurfaceFormat};
use std::sync::Arc;

/// Scale factors closer than this are treated as equal.
pub(crate) const SCALE_EPSILON: f32 = 1e-6;

/// Default number of ring slots.
pub(crate) const DEFAULT_COEFF_SLOTS: usize = 4;

/// Inputs that fully determine an AVS coefficient table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CoeffTag {
    pub(crate) format: SurfaceFormat,
    pub(crate) eight_tap: bool,
    pub(crate) balanced: bool,
    pub(crate) force_polyphase: bool,
    pub(crate) chroma_siting: Option<ChromaSiting>,
    pub(crate) scale_x: f32,
    pub(crate) scale_y: f32,
}

impl CoeffTag {
    pub(crate) fn matches(&self, other: &CoeffTag) -> bool {
        self.same_filter(other)
            && (self.scale_x - other.scale_x).abs() < SCALE_EPSILON
            && (self.scale_y - other.scale_y).abs() < SCALE_EPSILON
    }

    /// Every field but the scale factors is equal.
    pub(crate) fn same_filter(&self, other: &CoeffTag) -> bool {
        self.format == other.format
            && self.eight_tap == other.eight_tap
            && self.balanced == other.balanced
            && self.force_polyphase == other.force_polyphase
            && self.chroma_siting == other.chroma_siting
    }
}

/// Coefficients for one filtering direction.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DirectionTable {
    /// Luma (G) coefficients, `phases * taps`.
    pub(crate) y: Vec<i32>,
    /// Chroma (R/B) coefficients. Empty when the 8-tap filter covers all channels.
    pub(crate) uv: Vec<i32>,
    /// Scale factor the table was computed for.
    pub(crate) scale: f32,
}

/// Horizontal and vertical tables for one layer configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct CoeffTable {
    pub(crate) horizontal: DirectionTable,
    pub(crate) vertical: DirectionTable,
    /// G/Y filter runs with 4 taps.
    pub(crate) four_tap_y: bool,
    /// R/B/UV filter runs with 4 taps.
    pub(crate) four_tap_uv: bool,
}

/// Compute the table for one direction.
pub(crate) fn compute_direction(
    tag: &CoeffTag,
    scale: f32,
    vertical: bool,
    phases: usize,
) -> DirectionTable {
    let y_plane = if tag.format.prefers_4tap_luma() && !tag.eight_tap {
        Plane::Uv
    } else {
        Plane::Y
    };

    let (y, uv) = if scale == 1.0 && !tag.force_polyphase {
        let y = nearest_table(y_plane, phases, tag.balanced);
        let uv = if tag.eight_tap {
            Vec::new()
        } else {
            nearest_table(Plane::Uv, NUM_POLYPHASE_TABLES, tag.balanced)
        };
        (y, uv)
    } else {
        let clamped = scale.min(1.0);
        let y = polyphase_y(clamped, y_plane, tag.format, 0.0, phases);
        let uv = if tag.eight_tap {
            Vec::new()
        } else if !tag.balanced {
            polyphase_y(clamped, Plane::Uv, tag.format, 0.0, phases)
        } else {
            match siting_offset(tag.chroma_siting, vertical) {
                None => polyphase_uv(2.0, clamped, 0),
                Some(offset) => polyphase_uv(3.0, clamped, offset),
            }
        };
        (y, uv)
    };

    DirectionTable { y, uv, scale }
}

/// Compute both directions for `tag`.
pub(crate) fn compute_table(tag: &CoeffTag, phases: usize) -> CoeffTable {
    CoeffTable {
        horizontal: compute_direction(tag, tag.scale_x, false, phases),
        vertical: compute_direction(tag, tag.scale_y, true, phases),
        four_tap_y: tag.format.prefers_4tap_luma() && !tag.eight_tap,
        four_tap_uv: !tag.eight_tap,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CoeffCacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    /// Directions actually recomputed (0, 1 or 2 per miss).
    pub(crate) computed_directions: u64,
}

struct Slot {
    tag: CoeffTag,
    table: Arc<CoeffTable>,
}

/// Fixed-capacity ring of coefficient tables keyed by [`CoeffTag`].
///
/// Eviction is strict round-robin: a hit does not protect a slot.
pub(crate) struct CoeffCache {
    slots: Vec<Option<Slot>>,
    evict: usize,
    stats: CoeffCacheStats,
}

impl CoeffCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            evict: 0,
            stats: CoeffCacheStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> CoeffCacheStats {
        self.stats
    }

    pub(crate) fn find(&self, tag: &CoeffTag) -> Option<Arc<CoeffTable>> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.tag.matches(tag))
            .map(|s| Arc::clone(&s.table))
    }

    pub(crate) fn insert(&mut self, tag: CoeffTag, table: Arc<CoeffTable>) {
        self.slots[self.evict] = Some(Slot { tag, table });
        self.evict = (self.evict + 1) % self.slots.len();
    }

    /// Look `tag` up, computing and inserting it on a miss. Directions marked in `reuse` are
    /// copied from its table instead of being recomputed.
    ///
    /// Returns the table and whether it was found in the ring.
    pub(crate) fn get_or_compute(
        &mut self,
        tag: &CoeffTag,
        phases: usize,
        reuse: Option<Reuse<'_>>,
    ) -> (Arc<CoeffTable>, bool) {
        if let Some(t) = self.find(tag) {
            self.stats.hits = self.stats.hits.saturating_add(1);
            return (t, true);
        }
        self.stats.misses = self.stats.misses.saturating_add(1);

        let (table, computed) = match reuse {
            Some(r) => {
                let table = CoeffTable {
                    horizontal: if r.horizontal {
                        DirectionTable {
                            scale: tag.scale_x,
                            ..r.table.horizontal.clone()
                        }
                    } else {
                        compute_direction(tag, tag.scale_x, false, phases)
                    },
                    vertical: if r.vertical {
                        DirectionTable {
                            scale: tag.scale_y,
                            ..r.table.vertical.clone()
                        }
                    } else {
                        compute_direction(tag, tag.scale_y, true, phases)
                    },
                    four_tap_y: tag.format.prefers_4tap_luma() && !tag.eight_tap,
                    four_tap_uv: !tag.eight_tap,
                };
                (table, u64::from(!r.horizontal) + u64::from(!r.vertical))
            }
            None => (compute_table(tag, phases), 2),
        };
        self.stats.computed_directions = self.stats.computed_directions.saturating_add(computed);

        let table = Arc::new(table);
        self.insert(*tag, Arc::clone(&table));
        (table, false)
    }
}

/// Directions of a previous table that stay valid for a new tag.
#[derive(Clone, Copy)]
pub(crate) struct Reuse<'a> {
    pub(crate) table: &'a CoeffTable,
    pub(crate) horizontal: bool,
    pub(crate) vertical: bool,
}

/// Outcome of [`AvsState::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AvsUpdate {
    /// Same format and scales as the previous phase, nothing looked up.
    Unchanged,
    /// Table found in the ring.
    Cached,
    /// Table (partly) recomputed and inserted.
    Computed,
}

/// AVS sampler parameters currently programmed, reused across phases and calls.
#[derive(Default)]
pub(crate) struct AvsState {
    programmed: Option<(CoeffTag, Arc<CoeffTable>)>,
}

impl AvsState {
    /// Bring the programmed table in line with `tag`, going through `cache`.
    ///
    /// While both the old and new scale of a direction are upscales, that direction keeps its
    /// coefficients: the filter is clamped to 1x for every upscale ratio. This only holds when
    /// every other tag field is unchanged.
    pub(crate) fn update(
        &mut self,
        cache: &mut CoeffCache,
        tag: CoeffTag,
        phases: usize,
    ) -> (Arc<CoeffTable>, AvsUpdate) {
        let reuse = match &self.programmed {
            Some((prev, t)) if prev.same_filter(&tag) => {
                if prev.scale_x == tag.scale_x && prev.scale_y == tag.scale_y {
                    return (Arc::clone(t), AvsUpdate::Unchanged);
                }
                let horizontal = tag.scale_x > 1.0 && prev.scale_x > 1.0;
                let vertical = tag.scale_y > 1.0 && prev.scale_y > 1.0;
                Some((Arc::clone(t), horizontal, vertical))
            }
            _ => None,
        };

        let (table, hit) = cache.get_or_compute(
            &tag,
            phases,
            reuse.as_ref().map(|(t, horizontal, vertical)| Reuse {
                table: t,
                horizontal: *horizontal,
                vertical: *vertical,
            }),
        );
        self.programmed = Some((tag, Arc::clone(&table)));
        let how = if hit {
            AvsUpdate::Cached
        } else {
            AvsUpdate::Computed
        };
        (table, how)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/coeff/cache.rs"]
mod tests;
