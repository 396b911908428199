use crate::foundation::core::SurfaceFormat;

/// Hardware generation of the render engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HwGeneration {
    /// Single shared rotation per phase, 17-phase AVS tables.
    Gen8,
    /// 32-phase balanced AVS tables, pipe control after dispatch.
    Gen9,
    /// Gen9 layout with per-layer sampler rotation.
    Gen11,
}

impl HwGeneration {
    /// Number of polyphase tables the AVS sampler consumes.
    pub fn avs_phase_count(self) -> usize {
        match self {
            Self::Gen8 => 17,
            Self::Gen9 | Self::Gen11 => 32,
        }
    }

    /// Balanced (symmetric) polyphase tables.
    pub fn avs_balanced(self) -> bool {
        !matches!(self, Self::Gen8)
    }

    /// A pipe-control flush follows the dispatch.
    pub fn needs_pipe_control(self) -> bool {
        !matches!(self, Self::Gen8)
    }

    /// A media-state flush must precede the dispatch.
    pub fn needs_media_state_flush(self) -> bool {
        matches!(self, Self::Gen8)
    }
}

/// Per-phase resource budget of the compositing kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PhaseBudget {
    /// Layers per phase.
    pub layers: i32,
    /// Palettized layers per phase.
    pub palettes: i32,
    /// Procamp adjustments per phase.
    pub procamp: i32,
    /// Luma-keyed layers per phase.
    pub luma_keys: i32,
    /// Layers sampled with the adaptive scaler per phase.
    pub avs: i32,
}

impl Default for PhaseBudget {
    fn default() -> Self {
        Self {
            layers: 8,
            palettes: 2,
            procamp: 1,
            luma_keys: 1,
            avs: 1,
        }
    }
}

/// Hardware capability queries. Pure lookups, never mutated by the compositor.
pub trait HwCaps {
    /// Generation of the render engine.
    fn generation(&self) -> HwGeneration;

    /// Whether the sampler rotates each layer independently.
    fn sampler_rotation(&self) -> bool {
        matches!(self.generation(), HwGeneration::Gen11)
    }

    /// Per-phase kernel resource budget.
    fn phase_budget(&self) -> PhaseBudget {
        PhaseBudget::default()
    }

    /// Whether the kernel may write `format`.
    fn is_format_supported_as_output(&self, format: SurfaceFormat) -> bool;

    /// Whether the kernel may sample `format`.
    fn is_format_supported_as_input(&self, format: SurfaceFormat) -> bool {
        let _ = format;
        true
    }

    /// Whether the AVS sampler runs its 8-tap luma filter for every format.
    fn avs_8tap(&self) -> bool {
        false
    }
}

/// Table-driven capability set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericCaps {
    /// Engine generation.
    pub generation: HwGeneration,
    /// Formats accepted as output.
    pub output_formats: Vec<SurfaceFormat>,
    /// Kernel budget.
    pub budget: PhaseBudget,
}

impl GenericCaps {
    /// Default output format table for `generation`.
    pub fn new(generation: HwGeneration) -> Self {
        let mut output_formats = vec![
            SurfaceFormat::Argb,
            SurfaceFormat::Xrgb,
            SurfaceFormat::Abgr,
            SurfaceFormat::Xbgr,
            SurfaceFormat::Rgb565,
            SurfaceFormat::Ayuv,
            SurfaceFormat::Yuy2,
            SurfaceFormat::Uyvy,
            SurfaceFormat::Nv12,
        ];
        if generation != HwGeneration::Gen8 {
            output_formats.extend([SurfaceFormat::P010, SurfaceFormat::Y410]);
        }
        Self {
            generation,
            output_formats,
            budget: PhaseBudget::default(),
        }
    }
}

impl HwCaps for GenericCaps {
    fn generation(&self) -> HwGeneration {
        self.generation
    }

    fn phase_budget(&self) -> PhaseBudget {
        self.budget
    }

    fn is_format_supported_as_output(&self, format: SurfaceFormat) -> bool {
        self.output_formats.contains(&format)
    }
}
