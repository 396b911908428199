use crate::foundation::core::{Rect, Rotation};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::hw::caps::PhaseBudget;
use crate::scene::layer::LayerRole;
use crate::scene::params::ColorFill;
use crate::schedule::phase::{PhaseLayer, PhaseRequest, PhaseTarget};
use smallvec::SmallVec;

/// Call-wide inputs of the phase scheduler.
#[derive(Clone, Debug)]
pub(crate) struct ScheduleParams {
    pub(crate) budget: PhaseBudget,
    pub(crate) sampler_rotation: bool,
    pub(crate) colorfill: Option<ColorFill>,
    pub(crate) constriction: Option<Rect>,
    pub(crate) fill_alpha: Option<u8>,
    pub(crate) dither: bool,
}

/// Return `true` when `sources` and `target` cannot be composited in a single phase.
pub(crate) fn requires_multiple_phases(
    sources: &[PhaseLayer],
    target: &PhaseTarget,
    params: &ScheduleParams,
) -> bool {
    if params.constriction.is_some() {
        return true;
    }
    let mut trial = PhaseRequest::new(params.budget, params.sampler_rotation);
    for layer in sources {
        if trial.try_add_layer(layer.clone()).is_err() {
            return true;
        }
    }
    !trial.add_target(target.clone())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Regular,
    /// The layer at the cursor is rotated alone into the second intermediate.
    Rotation,
    /// Scale the constriction intermediate into the real targets.
    Constriction,
    Done,
}

/// Splits one composition into kernel-compatible phases, handed out one at a time.
///
/// Layers are placed greedily in input order. The output of every phase feeds slot 0 of the next
/// one, so each phase can be realised and submitted before the next is built.
pub(crate) struct PhaseScheduler<'a> {
    sources: &'a [PhaseLayer],
    targets: SmallVec<[PhaseTarget; 2]>,
    /// Output of non-final phases. `None` when the call fits one phase.
    intermediate: Option<PhaseTarget>,
    /// Output of rotation phases.
    rotated: Option<PhaseTarget>,
    params: ScheduleParams,

    index: usize,
    regular_phases: usize,
    pending_rotated: Option<PhaseLayer>,
    stage: Stage,
}

impl<'a> PhaseScheduler<'a> {
    pub(crate) fn new(
        sources: &'a [PhaseLayer],
        targets: SmallVec<[PhaseTarget; 2]>,
        intermediate: Option<PhaseTarget>,
        rotated: Option<PhaseTarget>,
        params: ScheduleParams,
    ) -> Self {
        let intermediate = intermediate.map(|mut t| {
            if let Some(c) = params.constriction {
                t.dst_rect = c;
            } else if let Some(rt) = targets.first() {
                t.dst_rect = rt.dst_rect;
            }
            t
        });
        Self {
            sources,
            targets,
            intermediate,
            rotated,
            params,
            index: 0,
            regular_phases: 0,
            pending_rotated: None,
            stage: Stage::Regular,
        }
    }

    /// Number of source layers already placed in a phase.
    pub(crate) fn consumed(&self) -> usize {
        self.index
    }

    pub(crate) fn next_phase(&mut self) -> CompositeResult<Option<PhaseRequest>> {
        match self.stage {
            Stage::Done => Ok(None),
            Stage::Rotation => self.rotation_phase().map(Some),
            Stage::Constriction => self.constriction_phase().map(Some),
            Stage::Regular => self.regular_phase().map(Some),
        }
    }

    fn new_request(&self) -> PhaseRequest {
        let mut req = PhaseRequest::new(self.params.budget, self.params.sampler_rotation);
        req.fill_alpha = self.params.fill_alpha;
        req.dither = self.params.dither;
        req
    }

    fn primary_target(&self) -> CompositeResult<&PhaseTarget> {
        self.targets
            .first()
            .ok_or_else(|| CompositeError::validation("composite needs a render target"))
    }

    fn intermediate(&self) -> CompositeResult<&PhaseTarget> {
        self.intermediate.as_ref().ok_or_else(|| {
            CompositeError::resource("composition needs several phases but has no intermediate")
        })
    }

    /// Source layer `i`, with its destination mapped into the constriction intermediate when one
    /// is in use.
    fn source(&self, i: usize) -> PhaseLayer {
        let mut layer = self.sources[i].clone();
        if let (Some(c), Some(t)) = (self.params.constriction, self.targets.first()) {
            layer.dst_rect = constrict(layer.dst_rect, t.dst_rect, c);
        }
        layer
    }

    fn regular_phase(&mut self) -> CompositeResult<PhaseRequest> {
        let mut req = self.new_request();
        req.constriction = self.params.constriction;
        if self.regular_phases == 0 {
            req.colorfill = self.params.colorfill;
            req.skip_blocks = false;
        }

        let start = self.index;
        let had_pending = self.pending_rotated.is_some();
        let mut last = true;
        let mut failed: Option<PhaseLayer> = None;

        let mut slot = 0usize;
        if self.regular_phases > 0 {
            let out = self.intermediate()?;
            let input =
                PhaseLayer::intermediate(out, LayerRole::Intermediate, out.dst_rect, out.dst_rect);
            if req.try_add_layer(input).is_err() {
                return Err(CompositeError::resource("intermediate does not fit an empty phase"));
            }
            slot = 1;
        }

        while self.index < self.sources.len() || self.pending_rotated.is_some() {
            let layer = if slot == 1
                && let Some(rotated) = self.pending_rotated.take()
            {
                rotated
            } else if self.index < self.sources.len() {
                self.index += 1;
                self.source(self.index - 1)
            } else {
                // A pending rotated layer only ever goes to slot 1.
                break;
            };

            if let Err(layer) = req.try_add_layer(layer) {
                last = false;
                if layer.role == LayerRole::RotatedIntermediate {
                    self.pending_rotated = Some(layer);
                } else if layer.source_index.is_some() {
                    self.index -= 1;
                    failed = Some(layer);
                }
                break;
            }
            slot += 1;
        }

        let rotation_follows = !self.params.sampler_rotation
            && failed
                .as_ref()
                .is_some_and(|l| l.rotation != Rotation::Identity);
        let progressed = self.index > start || (had_pending && self.pending_rotated.is_none());
        if !last && !progressed && !rotation_follows {
            return Err(CompositeError::resource(format!(
                "layer {} does not fit an empty phase",
                self.index
            )));
        }

        let mut writes_final = false;
        if last && self.params.constriction.is_none() {
            let target = self.primary_target()?.clone();
            if req.add_target(target.clone()) {
                req.targets.extend(self.targets.iter().skip(1).cloned());
                req.skip_blocks = false;
                req.output_rect = target.dst_rect;
                writes_final = true;
            } else {
                tracing::debug!("target procamp does not fit, adding a phase");
                last = false;
            }
        }
        if !writes_final {
            let out = self.intermediate()?.clone();
            req.output_rect = out.dst_rect;
            req.add_target(out);
        }
        req.writes_final_target = writes_final;
        self.regular_phases += 1;

        self.stage = if last {
            if self.params.constriction.is_some() {
                Stage::Constriction
            } else {
                Stage::Done
            }
        } else if rotation_follows {
            Stage::Rotation
        } else {
            Stage::Regular
        };

        tracing::debug!(
            phase = self.regular_phases - 1,
            layers = req.layers.len(),
            final_target = writes_final,
            "scheduled phase"
        );
        Ok(req)
    }

    fn rotation_phase(&mut self) -> CompositeResult<PhaseRequest> {
        if self.index >= self.sources.len() {
            return Err(CompositeError::resource("rotation phase without a pending layer"));
        }
        let layer = self.source(self.index);
        self.index += 1;

        let mut req = self.new_request();
        req.skip_blocks = true;
        req.force_skip_colorfill = true;
        let dst = layer.dst_rect;
        let blend = layer.blend;
        if req.try_add_layer(layer).is_err() {
            return Err(CompositeError::resource(format!(
                "rotated layer {} does not fit an empty phase",
                self.index - 1
            )));
        }

        let mut target = self
            .rotated
            .clone()
            .ok_or_else(|| CompositeError::resource("rotation phase without an intermediate"))?;
        target.dst_rect = dst;
        req.output_rect = dst;
        req.add_target(target.clone());

        let mut pending =
            PhaseLayer::intermediate(&target, LayerRole::RotatedIntermediate, dst, dst);
        pending.blend = blend;
        self.pending_rotated = Some(pending);
        self.stage = Stage::Regular;

        tracing::debug!(layer = self.index - 1, "scheduled rotation phase");
        Ok(req)
    }

    fn constriction_phase(&mut self) -> CompositeResult<PhaseRequest> {
        let constriction = self
            .params
            .constriction
            .ok_or_else(|| CompositeError::validation("constriction phase without constriction"))?;
        let target = self.primary_target()?.clone();
        let input = PhaseLayer::intermediate(
            self.intermediate()?,
            LayerRole::Intermediate,
            constriction,
            target.dst_rect,
        );

        let mut req = self.new_request();
        req.skip_blocks = false;
        if req.try_add_layer(input).is_err() {
            return Err(CompositeError::resource("constriction upscale does not fit a phase"));
        }
        req.add_target(target.clone());
        req.targets.extend(self.targets.iter().skip(1).cloned());
        req.output_rect = target.dst_rect;
        req.writes_final_target = true;
        self.stage = Stage::Done;

        tracing::debug!("scheduled constriction phase");
        Ok(req)
    }
}

/// Map `r` from target coordinates into a constriction intermediate of `constriction` size.
///
/// `r` is clipped to `target` first; the target rect spans the whole constriction extent.
fn constrict(r: Rect, target: Rect, constriction: Rect) -> Rect {
    let sx = target.width() as f32 / constriction.right.max(1) as f32;
    let sy = target.height() as f32 / constriction.bottom.max(1) as f32;
    let x = |v: i32| ((v.clamp(target.left, target.right) - target.left) as f32 / sx) as i32;
    let y = |v: i32| ((v.clamp(target.top, target.bottom) - target.top) as f32 / sy) as i32;
    Rect::new(x(r.left), y(r.top), x(r.right), y(r.bottom))
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
