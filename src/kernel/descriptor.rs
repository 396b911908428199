use crate::foundation::core::{ColorSpace, Rotation, ScalingMode, SurfaceFormat};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::scene::layer::{BlendKind, LayerRole};
use crate::schedule::phase::PhaseRequest;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x3c6e_f372_fe94_f82b;

/// Layer entries a descriptor holds, one slot is kept for the render target.
pub(crate) const MAX_LAYER_ENTRIES: usize = 9;
/// Total descriptor capacity.
pub(crate) const MAX_FILTER_ENTRIES: usize = MAX_LAYER_ENTRIES + 1;

/// Role of one descriptor entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum EntryRole {
    Layer(LayerRole),
    RenderTarget,
}

/// Sampler class an entry is read with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Render target entries do not sample.
    None,
    /// 3D sampler (nearest or bilinear).
    Scaling,
    /// Adaptive video scaler.
    Avs,
}

/// Per-layer processing (blend) step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Process {
    /// Render target entries.
    None,
    /// Opaque copy.
    Composite,
    /// Source alpha blend.
    SourceBlend,
    /// Source alpha blend of a 4-bit alpha palette layer.
    SourceBlend4Bit,
    /// Premultiplied alpha blend.
    PartialBlend,
    /// Constant alpha blend.
    ConstantBlend,
    /// Constant times source alpha.
    ConstantSourceBlend,
    /// Constant times premultiplied alpha.
    ConstantPartialBlend,
}

impl Process {
    fn from_blend(kind: Option<BlendKind>, format: SurfaceFormat) -> Self {
        match kind {
            None => Self::Composite,
            Some(BlendKind::Source) if format.is_alpha4() => Self::SourceBlend4Bit,
            Some(BlendKind::Source) => Self::SourceBlend,
            Some(BlendKind::Partial) => Self::PartialBlend,
            Some(BlendKind::Constant) => Self::ConstantBlend,
            Some(BlendKind::ConstantSource) => Self::ConstantSourceBlend,
            Some(BlendKind::ConstantPartial) => Self::ConstantPartialBlend,
        }
    }

    /// Blends that read the destination and therefore need a defined background.
    fn reads_background(self) -> bool {
        matches!(
            self,
            Self::SourceBlend
                | Self::PartialBlend
                | Self::ConstantBlend
                | Self::ConstantSourceBlend
        )
    }
}

/// Declarative key of one layer (or the render target) in a kernel combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FilterEntry {
    pub(crate) role: EntryRole,
    pub(crate) format: SurfaceFormat,
    pub(crate) color_space: ColorSpace,
    pub(crate) sampler: SamplerKind,
    pub(crate) rotation: Rotation,
    pub(crate) process: Process,
    pub(crate) colorfill: bool,
    pub(crate) luma_key: bool,
    /// Index into the procamp table, `None` when disabled.
    pub(crate) procamp: Option<u8>,
    pub(crate) chroma_siting: bool,
    pub(crate) dual_output: bool,
    pub(crate) fill_alpha: bool,
    pub(crate) dither: bool,
}

impl FilterEntry {
    const EMPTY: Self = Self {
        role: EntryRole::RenderTarget,
        format: SurfaceFormat::Argb,
        color_space: ColorSpace::Any,
        sampler: SamplerKind::None,
        rotation: Rotation::Identity,
        process: Process::None,
        colorfill: false,
        luma_key: false,
        procamp: None,
        chroma_siting: false,
        dual_output: false,
        fill_alpha: false,
        dither: false,
    };
}

/// Fixed-capacity filter description of one phase: layer entries followed by one render-target
/// entry. Regenerated for every phase and never mutated once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FilterDescriptor {
    entries: [FilterEntry; MAX_FILTER_ENTRIES],
    len: u8,
}

impl FilterDescriptor {
    fn new() -> Self {
        Self {
            entries: [FilterEntry::EMPTY; MAX_FILTER_ENTRIES],
            len: 0,
        }
    }

    fn push(&mut self, e: FilterEntry) -> CompositeResult<()> {
        let i = usize::from(self.len);
        if i >= MAX_FILTER_ENTRIES {
            return Err(CompositeError::kernel("filter descriptor overflow"));
        }
        self.entries[i] = e;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn entries(&self) -> &[FilterEntry] {
        &self.entries[..usize::from(self.len)]
    }

    pub(crate) fn layers(&self) -> &[FilterEntry] {
        let n = usize::from(self.len);
        &self.entries[..n.saturating_sub(1)]
    }

    pub(crate) fn render_target(&self) -> Option<&FilterEntry> {
        self.entries().last()
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub(crate) fn hash(&self) -> DescriptorHash {
        let mut h = StableHasher::new();
        h.write_u8(self.len);
        for e in self.entries() {
            write_entry(&mut h, e);
        }
        h.finish()
    }
}

/// 128-bit content hash of a [`FilterDescriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DescriptorHash {
    pub(crate) hi: u64,
    pub(crate) lo: u64,
}

/// Build the descriptor for `phase`.
///
/// Fails for BT.2020 / non-BT.2020 mixes between a layer and the target (no kernel path) and for
/// phases that would neither sample a layer nor fill color.
pub(crate) fn build_filter(phase: &PhaseRequest) -> CompositeResult<FilterDescriptor> {
    let mut desc = FilterDescriptor::new();
    let target = phase
        .targets
        .first()
        .ok_or_else(|| CompositeError::kernel("phase has no render target"))?;
    let target_rect = target.dst_rect;

    for layer in phase.layers.iter().take(MAX_LAYER_ENTRIES) {
        if layer.color_space.is_bt2020() != target.color_space.is_bt2020() {
            return Err(CompositeError::kernel(format!(
                "no kernel path from {:?} to {:?}",
                layer.color_space, target.color_space
            )));
        }

        let format = if layer.format.is_rgb() {
            SurfaceFormat::Argb
        } else {
            layer.format
        };
        let sampler = if layer.scaling == ScalingMode::Avs && layer.deinterlace.is_none() {
            SamplerKind::Avs
        } else {
            SamplerKind::Scaling
        };
        let process = Process::from_blend(layer.blend.map(|b| b.kind), layer.format);
        let luma_key = layer.luma_key.is_some();
        let colorfill = desc.len() == 0
            && (luma_key
                || (phase.colorfill.is_some() && !layer.dst_rect.contains(target_rect))
                || (!phase.force_skip_colorfill && process.reads_background()));

        desc.push(FilterEntry {
            role: EntryRole::Layer(layer.role),
            format,
            color_space: if layer.format.is_palette() {
                ColorSpace::Any
            } else {
                layer.color_space
            },
            sampler,
            rotation: layer.rotation,
            process,
            colorfill,
            luma_key,
            procamp: layer.procamp_slot,
            chroma_siting: layer.chroma_siting.is_some(),
            dual_output: false,
            fill_alpha: false,
            dither: false,
        })?;
    }

    let first = phase.layers.first();
    let colorfill = if desc.len() == 0 {
        if phase.colorfill.is_none() {
            return Err(CompositeError::kernel("phase has neither layers nor colorfill"));
        }
        true
    } else {
        false
    };
    let dither = phase.dither
        && !(first.is_some_and(|l| l.format == SurfaceFormat::Rgb565)
            && target.format == SurfaceFormat::Rgb565);
    let target_has_alpha = matches!(
        target.format,
        SurfaceFormat::Argb | SurfaceFormat::Abgr | SurfaceFormat::Ayuv
    );
    let source_has_alpha = first.is_some_and(|l| {
        matches!(
            l.format,
            SurfaceFormat::Argb | SurfaceFormat::Abgr | SurfaceFormat::Ayuv
        ) || l.format.is_alpha4()
    });
    let fill_alpha = phase.fill_alpha.is_some() || !(target_has_alpha && source_has_alpha);

    desc.push(FilterEntry {
        role: EntryRole::RenderTarget,
        format: target.format,
        color_space: target.color_space,
        sampler: SamplerKind::None,
        rotation: if phase.sampler_rotation {
            Rotation::Identity
        } else {
            first.map(|l| l.rotation).unwrap_or_default()
        },
        process: Process::None,
        colorfill,
        luma_key: false,
        procamp: target.procamp_slot,
        chroma_siting: false,
        dual_output: phase.targets.len() == 2,
        fill_alpha,
        dither,
    })?;

    Ok(desc)
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_u8(&mut self, v: u8) {
        self.inner.update(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn finish(self) -> DescriptorHash {
        let v = self.inner.digest128();
        DescriptorHash {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

fn write_entry(h: &mut StableHasher, e: &FilterEntry) {
    match e.role {
        EntryRole::RenderTarget => h.write_u8(0xff),
        EntryRole::Layer(r) => h.write_u8(match r {
            LayerRole::Background => 0,
            LayerRole::MainVideo => 1,
            LayerRole::SubVideo => 2,
            LayerRole::Graphics => 3,
            LayerRole::Subpicture => 4,
            LayerRole::Intermediate => 5,
            LayerRole::RotatedIntermediate => 6,
        }),
    }
    h.write_u8(format_code(e.format));
    h.write_u8(color_space_code(e.color_space));
    h.write_u8(match e.sampler {
        SamplerKind::None => 0,
        SamplerKind::Scaling => 1,
        SamplerKind::Avs => 2,
    });
    h.write_u8(rotation_code(e.rotation));
    h.write_u8(match e.process {
        Process::None => 0,
        Process::Composite => 1,
        Process::SourceBlend => 2,
        Process::SourceBlend4Bit => 3,
        Process::PartialBlend => 4,
        Process::ConstantBlend => 5,
        Process::ConstantSourceBlend => 6,
        Process::ConstantPartialBlend => 7,
    });
    h.write_bool(e.colorfill);
    h.write_bool(e.luma_key);
    h.write_u8(e.procamp.map_or(0xff, |p| p));
    h.write_bool(e.chroma_siting);
    h.write_bool(e.dual_output);
    h.write_bool(e.fill_alpha);
    h.write_bool(e.dither);
}

pub(crate) fn format_code(f: SurfaceFormat) -> u8 {
    match f {
        SurfaceFormat::Argb => 0,
        SurfaceFormat::Xrgb => 1,
        SurfaceFormat::Abgr => 2,
        SurfaceFormat::Xbgr => 3,
        SurfaceFormat::Rgb565 => 4,
        SurfaceFormat::Ayuv => 5,
        SurfaceFormat::Y410 => 6,
        SurfaceFormat::Y416 => 7,
        SurfaceFormat::Yuy2 => 8,
        SurfaceFormat::Uyvy => 9,
        SurfaceFormat::Nv12 => 10,
        SurfaceFormat::P010 => 11,
        SurfaceFormat::Yv12 => 12,
        SurfaceFormat::Ai44 => 13,
        SurfaceFormat::Ia44 => 14,
    }
}

pub(crate) fn color_space_code(c: ColorSpace) -> u8 {
    match c {
        ColorSpace::Any => 0,
        ColorSpace::Srgb => 1,
        ColorSpace::StudioRgb => 2,
        ColorSpace::Bt601 => 3,
        ColorSpace::Bt601Full => 4,
        ColorSpace::Bt709 => 5,
        ColorSpace::Bt709Full => 6,
        ColorSpace::XvYcc601 => 7,
        ColorSpace::XvYcc709 => 8,
        ColorSpace::Bt2020 => 9,
        ColorSpace::Bt2020Rgb => 10,
    }
}

pub(crate) fn rotation_code(r: Rotation) -> u8 {
    match r {
        Rotation::Identity => 0,
        Rotation::Rotate90 => 1,
        Rotation::Rotate180 => 2,
        Rotation::Rotate270 => 3,
        Rotation::MirrorHorizontal => 4,
        Rotation::MirrorVertical => 5,
        Rotation::Rotate90MirrorHorizontal => 6,
        Rotation::Rotate90MirrorVertical => 7,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/descriptor.rs"]
mod tests;
