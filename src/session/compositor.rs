use crate::batch::pool::{ArgSignature, BatchBufferPool, BatchPoolOpts, NlasSignature};
use crate::batch::recorder::{batch_size, record};
use crate::coeff::cache::{AvsState, CoeffCache, CoeffTag, DEFAULT_COEFF_SLOTS};
use crate::foundation::core::{
    ColorSpace, FeedbackId, GpuContextId, Rect, Rotation, ScalingMode, SurfaceFormat, SurfaceId,
};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::foundation::math::align_up_u32;
use crate::hw::caps::HwCaps;
use crate::hw::static_data::StaticData;
use crate::kernel::cache::{CacheOutcome, DEFAULT_KERNEL_CACHE_CAPACITY, KernelCache};
use crate::kernel::csc::{ColorMatrices, ColorMatrix, PROCAMP_SLOTS, ProcampTable, convert_fill};
use crate::kernel::descriptor::build_filter;
use crate::kernel::library::FragmentArena;
use crate::scene::layer::{Layer, Procamp, RenderTarget};
use crate::scene::params::CompositeParams;
use crate::schedule::csc::{choose_intermediate_space, intermediate_format};
use crate::schedule::phase::{PhaseLayer, PhaseRequest, PhaseTarget};
use crate::schedule::scaling::realize_scaling;
use crate::schedule::scheduler::{PhaseScheduler, ScheduleParams, requires_multiple_phases};
use crate::submit::device::CommandDevice;
use crate::submit::status::{QueryStatus, StatusEntry, StatusTable};
use crate::submit::stream::{PhaseSubmission, Submitter};
use crate::surface::{SurfaceDesc, SurfaceInfo, SurfaceProvider, Tiling};
use smallvec::SmallVec;

/// Largest number of source layers one call accepts.
pub const MAX_SOURCES: usize = 17;
/// Largest number of render targets one call writes.
pub const MAX_TARGETS: usize = 2;

/// Intermediate surfaces are sized in multiples of this many pixels.
const INTERMEDIATE_ALIGN: u32 = 128;

/// Options controlling a [`Compositor`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorOpts {
    /// Upper bound on pooled batch buffers.
    pub batch_max_buffers: usize,
    /// Batch buffer size granularity in bytes (power of two).
    pub batch_align: usize,
    /// Linked kernels kept before LRU eviction.
    pub kernel_cache_capacity: usize,
    /// Coefficient table ring slots.
    pub coeff_slots: usize,
    /// Status ring capacity (power of two).
    pub status_capacity: usize,
    /// Record a status entry per call that carries a feedback id.
    pub report_status: bool,
    /// Record the caller's stream index next to status entries.
    pub stream_tagging: bool,
    /// Ask the device to skip execution while still advancing tags.
    pub null_rendering: bool,
    /// Queue every submission goes to.
    pub gpu_context: GpuContextId,
    /// Record block walks into reusable batch buffers instead of emitting them inline.
    pub use_batch_buffers: bool,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        let pool = BatchPoolOpts::default();
        Self {
            batch_max_buffers: pool.max_buffers,
            batch_align: pool.align,
            kernel_cache_capacity: DEFAULT_KERNEL_CACHE_CAPACITY,
            coeff_slots: DEFAULT_COEFF_SLOTS,
            status_capacity: 64,
            report_status: true,
            stream_tagging: false,
            null_rendering: false,
            gpu_context: GpuContextId::default(),
            use_batch_buffers: true,
        }
    }
}

impl CompositorOpts {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> CompositeResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| CompositeError::validation(format!("compositor opts: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject option values the caches cannot be built with.
    pub fn validate(&self) -> CompositeResult<()> {
        if self.batch_max_buffers == 0 {
            return Err(CompositeError::validation("batch_max_buffers must be > 0"));
        }
        if !self.batch_align.is_power_of_two() {
            return Err(CompositeError::validation(format!(
                "batch_align must be a power of two, got {}",
                self.batch_align
            )));
        }
        if self.kernel_cache_capacity == 0 {
            return Err(CompositeError::validation("kernel_cache_capacity must be > 0"));
        }
        if self.coeff_slots == 0 {
            return Err(CompositeError::validation("coeff_slots must be > 0"));
        }
        if !self.status_capacity.is_power_of_two() {
            return Err(CompositeError::validation(format!(
                "status_capacity must be a power of two, got {}",
                self.status_capacity
            )));
        }
        Ok(())
    }
}

/// Caches owned by one [`Compositor`].
///
/// Built separately so an embedder can size them up front and hand them to
/// [`Compositor::with_caches`].
pub struct CompositorCaches {
    kernels: KernelCache,
    coeffs: CoeffCache,
    batches: BatchBufferPool,
    status: StatusTable,
}

impl CompositorCaches {
    /// Empty caches sized from `opts`.
    pub fn from_opts(opts: &CompositorOpts) -> CompositeResult<Self> {
        opts.validate()?;
        Ok(Self {
            kernels: KernelCache::new(opts.kernel_cache_capacity),
            coeffs: CoeffCache::new(opts.coeff_slots),
            batches: BatchBufferPool::new(BatchPoolOpts {
                max_buffers: opts.batch_max_buffers,
                align: opts.batch_align,
            }),
            status: StatusTable::new(opts.status_capacity)?,
        })
    }
}

/// Outcome of one successful [`Compositor::composite`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeStatus {
    /// Phases submitted.
    pub phases: u32,
    /// Phases whose kernel came straight from the cache.
    pub kernel_hits: u32,
    /// Phases that searched and linked a kernel.
    pub kernel_builds: u32,
    /// Phases that replayed an earlier batch buffer recording.
    pub batch_replays: u32,
    /// Completion tag the call's status entry waits for.
    pub completion_tag: Option<u32>,
}

/// Cumulative counters across all calls of a [`Compositor`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Calls that passed validation.
    pub calls: u64,
    /// Calls that failed after validation.
    pub failed_calls: u64,
    /// Phases submitted.
    pub phases: u64,
    /// Kernel cache hits.
    pub kernel_hits: u64,
    /// Kernel cache misses.
    pub kernel_misses: u64,
    /// Kernels linked.
    pub kernel_builds: u64,
    /// Kernels evicted by LRU.
    pub kernel_evictions: u64,
    /// Kernels released for an outdated procamp.
    pub kernel_stale_releases: u64,
    /// Coefficient cache hits.
    pub coeff_hits: u64,
    /// Coefficient cache misses.
    pub coeff_misses: u64,
    /// Batch buffers replayed without recording.
    pub batch_reused: u64,
    /// Batch buffers recorded.
    pub batch_recorded: u64,
    /// Batch buffers allocated.
    pub batch_allocated: u64,
    /// Batch buffers evicted and regrown.
    pub batch_evicted: u64,
    /// Linked kernels currently cached.
    pub cached_kernels: usize,
    /// Batch buffers currently owned by the pool.
    pub batch_buffers: usize,
    /// Status entries currently tracked.
    pub status_entries: usize,
}

#[derive(Clone, Copy, Debug)]
struct Scratch {
    surface: SurfaceId,
    desc: SurfaceDesc,
}

/// Layer compositor bound to one device context.
///
/// A call is validated, split into kernel-compatible phases, and each phase is resolved to a
/// kernel, recorded and submitted before the next one is built. All caches survive across calls.
pub struct Compositor<D: CommandDevice, S: SurfaceProvider> {
    device: D,
    surfaces: S,
    caps: Box<dyn HwCaps>,
    arena: FragmentArena,
    matrices: Box<dyn ColorMatrices>,
    opts: CompositorOpts,

    caches: CompositorCaches,
    avs: AvsState,
    procamps: ProcampTable,
    submitter: Submitter,
    intermediates: [Option<Scratch>; 2],

    call_id: u64,
    calls: u64,
    failed_calls: u64,
    phases: u64,
}

impl<D: CommandDevice, S: SurfaceProvider> Compositor<D, S> {
    /// Build a compositor with caches sized from `opts`.
    pub fn new(
        device: D,
        surfaces: S,
        caps: Box<dyn HwCaps>,
        arena: FragmentArena,
        matrices: Box<dyn ColorMatrices>,
        opts: CompositorOpts,
    ) -> CompositeResult<Self> {
        let caches = CompositorCaches::from_opts(&opts)?;
        Ok(Self::with_caches(
            device, surfaces, caps, arena, matrices, opts, caches,
        ))
    }

    /// Build a compositor around caches supplied by the caller.
    pub fn with_caches(
        device: D,
        surfaces: S,
        caps: Box<dyn HwCaps>,
        arena: FragmentArena,
        matrices: Box<dyn ColorMatrices>,
        opts: CompositorOpts,
        caches: CompositorCaches,
    ) -> Self {
        Self {
            device,
            surfaces,
            caps,
            arena,
            matrices,
            opts,
            caches,
            avs: AvsState::default(),
            procamps: ProcampTable::default(),
            submitter: Submitter::default(),
            intermediates: [None, None],
            call_id: 0,
            calls: 0,
            failed_calls: 0,
            phases: 0,
        }
    }

    /// The command device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the command device, e.g. to advance reported tags.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The surface provider.
    pub fn surfaces(&self) -> &S {
        &self.surfaces
    }

    /// The fragment library kernels are linked from.
    pub fn arena_mut(&mut self) -> &mut FragmentArena {
        &mut self.arena
    }

    /// Options the compositor was built with.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Counters accumulated over every call so far.
    pub fn stats(&self) -> CompositeStats {
        let k = self.caches.kernels.stats();
        let c = self.caches.coeffs.stats();
        let b = self.caches.batches.stats();
        CompositeStats {
            calls: self.calls,
            failed_calls: self.failed_calls,
            phases: self.phases,
            kernel_hits: k.hits,
            kernel_misses: k.misses,
            kernel_builds: k.builds,
            kernel_evictions: k.evictions,
            kernel_stale_releases: k.stale_releases,
            coeff_hits: c.hits,
            coeff_misses: c.misses,
            batch_reused: b.reused,
            batch_recorded: b.recorded,
            batch_allocated: b.allocated,
            batch_evicted: b.evicted,
            cached_kernels: self.caches.kernels.len(),
            batch_buffers: self.caches.batches.len(),
            status_entries: self.caches.status.len(),
        }
    }

    /// Completion state of the call reported under `feedback_id`.
    pub fn query_status(&self, feedback_id: FeedbackId) -> QueryStatus {
        let device = &self.device;
        self.caches
            .status
            .query(feedback_id, |ctx| device.reported_completion_tag(ctx))
    }

    /// Composite `layers` (bottom to top) into one or two `targets`.
    #[tracing::instrument(
        skip_all,
        fields(layers = layers.len(), targets = targets.len(), call_id = self.call_id + 1)
    )]
    pub fn composite(
        &mut self,
        layers: &[Layer],
        targets: &[RenderTarget],
        params: &CompositeParams,
    ) -> CompositeResult<CompositeStatus> {
        self.call_id = self.call_id.wrapping_add(1);
        let (infos, target_infos) = self.validate(layers, targets, params)?;
        self.calls = self.calls.saturating_add(1);

        let result = self.run(layers, &infos, targets, &target_infos, params);
        match &result {
            Ok(status) => {
                if let Some(tag) = status.completion_tag {
                    self.report(params, tag, QueryStatus::NotReady);
                }
            }
            Err(e) => {
                self.failed_calls = self.failed_calls.saturating_add(1);
                tracing::debug!(error = %e, "composite failed");
                let tag = self.device.completion_tag(self.opts.gpu_context);
                self.report(params, tag.wrapping_sub(1), QueryStatus::Error);
            }
        }
        result
    }

    fn report(&mut self, params: &CompositeParams, tag: u32, status: QueryStatus) {
        if !self.opts.report_status {
            return;
        }
        let Some(feedback_id) = params.feedback_id else {
            return;
        };
        self.caches.status.report(StatusEntry {
            feedback_id,
            ctx: self.opts.gpu_context,
            tag,
            status,
            stream_index: if self.opts.stream_tagging {
                params.stream_index
            } else {
                None
            },
        });
    }

    fn validate(
        &self,
        layers: &[Layer],
        targets: &[RenderTarget],
        params: &CompositeParams,
    ) -> CompositeResult<(Vec<SurfaceInfo>, Vec<SurfaceInfo>)> {
        if layers.len() > MAX_SOURCES {
            return Err(CompositeError::validation(format!(
                "at most {MAX_SOURCES} layers per call, got {}",
                layers.len()
            )));
        }
        if targets.is_empty() || targets.len() > MAX_TARGETS {
            return Err(CompositeError::validation(format!(
                "1 or {MAX_TARGETS} render targets per call, got {}",
                targets.len()
            )));
        }
        if layers.is_empty() && params.colorfill.is_none() {
            return Err(CompositeError::validation(
                "nothing to composite: no layers and no colorfill",
            ));
        }
        if let Some(c) = params.constriction {
            c.validate("constriction")?;
        }
        if let Some(n) = params.nlas {
            n.validate()?;
        }

        let target_infos = targets
            .iter()
            .map(|t| {
                t.dst_rect.validate("target")?;
                let info = self.surfaces.surface_info(t.surface)?;
                if !self.caps.is_format_supported_as_output(info.format) {
                    return Err(CompositeError::validation(format!(
                        "{:?} is not supported as output",
                        info.format
                    )));
                }
                Ok(info)
            })
            .collect::<CompositeResult<Vec<_>>>()?;

        let target_bt2020 = targets[0].color_space.is_bt2020();
        let infos = layers
            .iter()
            .enumerate()
            .map(|(i, l)| {
                l.src_rect.validate("source")?;
                l.dst_rect.validate("destination")?;
                let info = self.surfaces.surface_info(l.surface)?;
                if !self.caps.is_format_supported_as_input(info.format) {
                    return Err(CompositeError::validation(format!(
                        "layer {i}: {:?} is not supported as input",
                        info.format
                    )));
                }
                if l.color_space.is_bt2020() != target_bt2020 {
                    return Err(CompositeError::validation(format!(
                        "layer {i}: cannot mix {:?} with a {:?} target",
                        l.color_space, targets[0].color_space
                    )));
                }
                Ok(info)
            })
            .collect::<CompositeResult<Vec<_>>>()?;

        Ok((infos, target_infos))
    }

    fn run(
        &mut self,
        layers: &[Layer],
        infos: &[SurfaceInfo],
        targets: &[RenderTarget],
        target_infos: &[SurfaceInfo],
        params: &CompositeParams,
    ) -> CompositeResult<CompositeStatus> {
        let mut next_slot = 0u8;
        let mut sources: Vec<PhaseLayer> = Vec::with_capacity(layers.len());
        for (i, (layer, info)) in layers.iter().zip(infos).enumerate() {
            let slot = match &layer.procamp {
                Some(p) => Some(procamp_slot(&mut self.procamps, &mut next_slot, p)?),
                None => None,
            };
            sources.push(PhaseLayer::from_layer(layer, info, slot, i));
        }

        let mut phase_targets: SmallVec<[PhaseTarget; 2]> = SmallVec::new();
        for (t, info) in targets.iter().zip(target_infos) {
            let slot = match (&t.procamp, phase_targets.is_empty()) {
                (Some(p), true) => Some(procamp_slot(&mut self.procamps, &mut next_slot, p)?),
                _ => None,
            };
            phase_targets.push(PhaseTarget {
                surface: t.surface,
                format: info.format,
                width: info.width,
                height: info.height,
                dst_rect: t.dst_rect,
                color_space: t.color_space,
                procamp_slot: slot,
            });
        }

        let sched = ScheduleParams {
            budget: self.caps.phase_budget(),
            sampler_rotation: self.caps.sampler_rotation(),
            colorfill: params.colorfill,
            constriction: params.constriction,
            fill_alpha: params.fill_alpha,
            dither: params.dither,
        };

        let primary = phase_targets[0].clone();
        let (intermediate, rotated) = if requires_multiple_phases(&sources, &primary, &sched) {
            let cs = choose_intermediate_space(&sources, primary.format);
            let format = intermediate_format(cs);
            if !self.caps.is_format_supported_as_output(format) {
                return Err(CompositeError::validation(format!(
                    "intermediate format {format:?} is not supported as output"
                )));
            }
            let mut extent = (primary.width, primary.height);
            if let Some(c) = params.constriction {
                extent.0 = extent.0.max(c.right.max(0) as u32);
                extent.1 = extent.1.max(c.bottom.max(0) as u32);
            }
            let intermediate = self.ensure_intermediate(0, extent, format, cs)?;
            let needs_rotation = !sched.sampler_rotation
                && sources
                    .iter()
                    .any(|l| l.rotation != Rotation::Identity);
            let rotated = if needs_rotation {
                Some(self.ensure_intermediate(1, extent, format, cs)?)
            } else {
                None
            };
            tracing::debug!(?cs, ?format, rotation = needs_rotation, "multi-phase composite");
            (Some(intermediate), rotated)
        } else {
            (None, None)
        };

        let mut scheduler =
            PhaseScheduler::new(&sources, phase_targets, intermediate, rotated, sched);
        let mut status = CompositeStatus::default();
        while let Some(mut phase) = scheduler.next_phase()? {
            self.submit(&mut phase, params, &mut status)?;
        }
        tracing::trace!(layers = scheduler.consumed(), phases = status.phases, "call scheduled");
        Ok(status)
    }

    /// Realise one scheduled phase and put it on the device queue.
    fn submit(
        &mut self,
        phase: &mut PhaseRequest,
        params: &CompositeParams,
        status: &mut CompositeStatus,
    ) -> CompositeResult<()> {
        realize_scaling(phase);
        for l in &phase.layers {
            self.surfaces.register_resource(l.surface, false)?;
        }
        for t in &phase.targets {
            self.surfaces.register_resource(t.surface, true)?;
        }

        let desc = build_filter(phase)?;
        let (entry, outcome) = self.caches.kernels.resolve(
            &desc,
            &self.arena,
            &self.procamps,
            self.matrices.as_ref(),
        )?;
        match outcome {
            CacheOutcome::Hit => status.kernel_hits += 1,
            CacheOutcome::Miss | CacheOutcome::Rebuilt => status.kernel_builds += 1,
        }

        let generation = self.caps.generation();
        let avs = match phase.layers.iter().find(|l| l.scaling == ScalingMode::Avs) {
            Some(l) => {
                let (scale_x, scale_y) = l.scale_factors();
                let tag = CoeffTag {
                    format: l.format,
                    eight_tap: self.caps.avs_8tap(),
                    balanced: generation.avs_balanced(),
                    force_polyphase: params.force_polyphase,
                    chroma_siting: l.chroma_siting,
                    scale_x,
                    scale_y,
                };
                let (table, how) =
                    self.avs
                        .update(&mut self.caches.coeffs, tag, generation.avs_phase_count());
                tracing::trace!(?how, "avs coefficients");
                Some(table)
            }
            None => None,
        };

        let colorfill = match phase.colorfill {
            Some(fill) => convert_fill(
                self.matrices.as_ref(),
                fill.color,
                fill.color_space,
                entry.processing,
            )?,
            None => 0,
        };
        let nlas = params.nlas.filter(|_| {
            phase.writes_final_target
                && phase.layers.len() == 1
                && phase.layers[0].scaling == ScalingMode::Avs
        });
        if params.nlas.is_some() && nlas.is_none() {
            tracing::trace!("nlas skipped: phase is not a single adaptively scaled layer");
        }
        let csc: SmallVec<[ColorMatrix; 4]> = entry.csc.iter().map(|m| m.coeffs).collect();
        let static_data = StaticData::for_phase(
            generation,
            phase,
            &csc,
            &entry.layer_matrix,
            colorfill,
            nlas,
        );
        let samplers: SmallVec<[ScalingMode; 8]> =
            phase.layers.iter().map(|l| l.scaling).collect();
        let bindings: SmallVec<[(SurfaceId, bool); 10]> = phase
            .layers
            .iter()
            .map(|l| (l.surface, false))
            .chain(phase.targets.iter().map(|t| (t.surface, true)))
            .collect();
        let signature = ArgSignature {
            media_id: entry.id,
            output_rect: phase.output_rect,
            dst_rects: phase.layers.iter().map(|l| l.dst_rect).collect(),
            rotations: phase.layers.iter().map(|l| l.rotation).collect(),
            step_x: static_data.layers().first().map_or(0, |l| l.step_x.to_bits()),
            skip_blocks: phase.skip_blocks,
            nlas: nlas.as_ref().map(NlasSignature::from_params),
        };

        let batch = if self.opts.use_batch_buffers {
            let allow_replay = !(phase.layers.len() == 1
                && matches!(phase.layers[0].format, SurfaceFormat::Ai44 | SurfaceFormat::Ia44));
            let (id, how) = self.caches.batches.acquire(
                batch_size(&signature),
                &signature,
                self.call_id,
                self.device.reported_sync_tag(),
                allow_replay,
            )?;
            if how.needs_recording() {
                record(&mut self.caches.batches, id, &signature)?;
            } else {
                status.batch_replays += 1;
            }
            Some(id)
        } else {
            None
        };

        let submission = PhaseSubmission {
            generation,
            ctx: self.opts.gpu_context,
            last: phase.writes_final_target,
            marker: params
                .stream_index
                .filter(|_| self.opts.stream_tagging)
                .unwrap_or(self.call_id as u32),
            static_data: &static_data,
            kernel: &entry,
            avs: avs.as_deref(),
            samplers: &samplers,
            bindings: &bindings,
            batch,
            signature: &signature,
            null_render: self.opts.null_rendering,
            call_id: self.call_id,
        };
        let receipt =
            self.submitter
                .submit_phase(&mut self.device, &mut self.caches.batches, &submission)?;

        status.phases += 1;
        self.phases = self.phases.saturating_add(1);
        if receipt.completion_tag.is_some() {
            status.completion_tag = receipt.completion_tag;
        }
        Ok(())
    }

    /// Scratch surface `index` of at least `extent` pixels in `format`, grown when too small.
    fn ensure_intermediate(
        &mut self,
        index: usize,
        extent: (u32, u32),
        format: SurfaceFormat,
        color_space: ColorSpace,
    ) -> CompositeResult<PhaseTarget> {
        let width = align_up_u32(extent.0.max(1), INTERMEDIATE_ALIGN);
        let height = align_up_u32(extent.1.max(1), INTERMEDIATE_ALIGN);

        let current = self.intermediates[index];
        let scratch = match current {
            Some(s)
                if s.desc.format == format && s.desc.width >= width && s.desc.height >= height =>
            {
                s
            }
            old => {
                let desc = SurfaceDesc {
                    width: old.map_or(width, |s| s.desc.width.max(width)),
                    height: old.map_or(height, |s| s.desc.height.max(height)),
                    format,
                    tiling: Tiling::TileY,
                };
                if let Some(s) = old {
                    self.surfaces.free_surface(s.surface);
                }
                let surface = self.surfaces.allocate_surface(&desc)?;
                tracing::debug!(
                    index,
                    width = desc.width,
                    height = desc.height,
                    ?format,
                    "intermediate allocated"
                );
                let s = Scratch { surface, desc };
                self.intermediates[index] = Some(s);
                s
            }
        };

        Ok(PhaseTarget {
            surface: scratch.surface,
            format,
            width: scratch.desc.width,
            height: scratch.desc.height,
            dst_rect: Rect::from_size(scratch.desc.width, scratch.desc.height),
            color_space,
            procamp_slot: None,
        })
    }
}

/// Assign the next per-call procamp slot to `params`.
fn procamp_slot(
    procamps: &mut ProcampTable,
    next: &mut u8,
    params: &Procamp,
) -> CompositeResult<u8> {
    if usize::from(*next) >= PROCAMP_SLOTS {
        return Err(CompositeError::resource(format!(
            "more than {PROCAMP_SLOTS} procamp adjustments in one call"
        )));
    }
    let slot = *next;
    procamps.update(slot, *params)?;
    *next += 1;
    Ok(slot)
}

#[cfg(test)]
#[path = "../../tests/unit/session/compositor.rs"]
mod tests;
