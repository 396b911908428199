#![allow(dead_code)]

use std::collections::HashMap;

use wavyte_compositor::submit::command::{OP_STORE_SYNC_TAG, decode};
use wavyte_compositor::{
    ColorMatrices, ColorMatrix, ColorSpace, CommandBuffer, CommandDevice, CompositeError,
    CompositeResult, Compositor, CompositorOpts, FormatClass, FormatKey, FragmentArena,
    FragmentKey, GenericCaps, GpuContextId, HwGeneration, IDENTITY_MATRIX, LayerRole, Process,
    Rotation, SamplerKind, SurfaceDesc, SurfaceFormat, SurfaceId, SurfaceInfo, SurfaceProvider,
    Tiling,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Surface registry with a fixed set of caller surfaces plus scratch allocations.
#[derive(Default)]
pub struct MockSurfaces {
    pub infos: HashMap<SurfaceId, SurfaceInfo>,
    pub next_id: u32,
    pub allocated: Vec<SurfaceDesc>,
    pub freed: Vec<SurfaceId>,
    pub registered: Vec<(SurfaceId, bool)>,
}

impl MockSurfaces {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            ..Self::default()
        }
    }

    pub fn with(mut self, id: u32, format: SurfaceFormat, width: u32, height: u32) -> Self {
        self.infos.insert(
            SurfaceId(id),
            SurfaceInfo {
                width,
                height,
                pitch: width * 4,
                tiling: Tiling::TileY,
                format,
            },
        );
        self
    }
}

impl SurfaceProvider for MockSurfaces {
    fn surface_info(&self, surface: SurfaceId) -> CompositeResult<SurfaceInfo> {
        self.infos
            .get(&surface)
            .copied()
            .ok_or_else(|| CompositeError::validation(format!("unknown surface {surface:?}")))
    }

    fn allocate_surface(&mut self, desc: &SurfaceDesc) -> CompositeResult<SurfaceId> {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.allocated.push(*desc);
        self.infos.insert(
            id,
            SurfaceInfo {
                width: desc.width,
                height: desc.height,
                pitch: desc.width * 4,
                tiling: desc.tiling,
                format: desc.format,
            },
        );
        Ok(id)
    }

    fn free_surface(&mut self, surface: SurfaceId) {
        self.infos.remove(&surface);
        self.freed.push(surface);
    }

    fn register_resource(&mut self, surface: SurfaceId, write: bool) -> CompositeResult<()> {
        self.registered.push((surface, write));
        Ok(())
    }
}

/// Device queue that keeps every submitted buffer and only reports completion on request.
pub struct MockDevice {
    pub capacity: usize,
    pub primary: Option<CommandBuffer>,
    pub submitted: Vec<CommandBuffer>,
    pub returned: usize,
    pub next_completion: u32,
    pub reported_completion: u32,
    pub reported_sync: u32,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_capacity(1 << 16)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            primary: None,
            submitted: Vec::new(),
            returned: 0,
            next_completion: 1,
            reported_completion: 0,
            reported_sync: 0,
        }
    }

    /// Pretend the GPU finished everything submitted so far.
    pub fn complete_all(&mut self) {
        self.reported_completion = self.next_completion.wrapping_sub(1);
        let last_sync = self
            .submitted
            .iter()
            .flat_map(|b| decode(b.dwords()))
            .filter(|(op, _)| *op == OP_STORE_SYNC_TAG)
            .filter_map(|(_, payload)| payload.first().copied())
            .last();
        if let Some(tag) = last_sync {
            self.reported_sync = tag;
        }
    }

    pub fn opcodes(&self, index: usize) -> Vec<u8> {
        decode(self.submitted[index].dwords())
            .map(|(op, _)| op)
            .collect()
    }
}

impl CommandDevice for MockDevice {
    fn get_command_buffer(&mut self) -> CompositeResult<CommandBuffer> {
        Ok(self
            .primary
            .take()
            .unwrap_or_else(|| CommandBuffer::with_capacity(self.capacity)))
    }

    fn return_command_buffer(&mut self, buf: CommandBuffer) {
        self.returned += 1;
        self.primary = Some(buf);
    }

    fn submit_command_buffer(
        &mut self,
        buf: CommandBuffer,
        _null_render: bool,
    ) -> CompositeResult<()> {
        self.submitted.push(buf);
        Ok(())
    }

    fn completion_tag(&self, _ctx: GpuContextId) -> u32 {
        self.next_completion
    }

    fn increment_completion_tag(&mut self, _ctx: GpuContextId) {
        self.next_completion = self.next_completion.wrapping_add(1);
    }

    fn reported_completion_tag(&self, _ctx: GpuContextId) -> u32 {
        self.reported_completion
    }

    fn reported_sync_tag(&self) -> u32 {
        self.reported_sync
    }
}

/// Identity conversions for every pair that does not cross the BT.2020 boundary.
pub struct IdentityMatrices;

impl ColorMatrices for IdentityMatrices {
    fn matrix(&self, src: ColorSpace, dst: ColorSpace) -> Option<ColorMatrix> {
        (src.is_bt2020() == dst.is_bt2020()).then_some(IDENTITY_MATRIX)
    }
}

const ROLES: [LayerRole; 7] = [
    LayerRole::Background,
    LayerRole::MainVideo,
    LayerRole::SubVideo,
    LayerRole::Graphics,
    LayerRole::Subpicture,
    LayerRole::Intermediate,
    LayerRole::RotatedIntermediate,
];

const PROCESSES: [Process; 7] = [
    Process::Composite,
    Process::SourceBlend,
    Process::SourceBlend4Bit,
    Process::PartialBlend,
    Process::ConstantBlend,
    Process::ConstantSourceBlend,
    Process::ConstantPartialBlend,
];

const SPACES: [ColorSpace; 10] = [
    ColorSpace::Srgb,
    ColorSpace::StudioRgb,
    ColorSpace::Bt601,
    ColorSpace::Bt601Full,
    ColorSpace::Bt709,
    ColorSpace::Bt709Full,
    ColorSpace::XvYcc601,
    ColorSpace::XvYcc709,
    ColorSpace::Bt2020,
    ColorSpace::Bt2020Rgb,
];

const ROTATIONS: [Rotation; 7] = [
    Rotation::Rotate90,
    Rotation::Rotate180,
    Rotation::Rotate270,
    Rotation::MirrorHorizontal,
    Rotation::MirrorVertical,
    Rotation::Rotate90MirrorHorizontal,
    Rotation::Rotate90MirrorVertical,
];

const OUTPUTS: [SurfaceFormat; 11] = [
    SurfaceFormat::Argb,
    SurfaceFormat::Xrgb,
    SurfaceFormat::Abgr,
    SurfaceFormat::Xbgr,
    SurfaceFormat::Rgb565,
    SurfaceFormat::Ayuv,
    SurfaceFormat::Yuy2,
    SurfaceFormat::Uyvy,
    SurfaceFormat::Nv12,
    SurfaceFormat::P010,
    SurfaceFormat::Y410,
];

/// Arena with a class-level fragment for every layer combination plus every helper fragment.
pub fn full_arena() -> FragmentArena {
    let mut arena = FragmentArena::new();
    let code = || vec![0x90; 16];
    for role in ROLES {
        for class in [FormatClass::Rgb, FormatClass::Yuv, FormatClass::Palette] {
            for sampler in [SamplerKind::Scaling, SamplerKind::Avs] {
                for process in PROCESSES {
                    let key = FragmentKey::Layer {
                        role,
                        format: FormatKey::Class(class),
                        sampler,
                        process,
                    };
                    arena.insert(key, code(), 4);
                }
            }
        }
    }
    for src in SPACES {
        for dst in SPACES {
            if src != dst {
                arena.insert(FragmentKey::Csc { src, dst }, code(), 12);
            }
        }
    }
    for key in [FragmentKey::Procamp, FragmentKey::LumaKey, FragmentKey::Colorfill] {
        arena.insert(key, code(), 2);
    }
    for r in ROTATIONS {
        arena.insert(FragmentKey::Rotation(r), code(), 1);
    }
    for format in OUTPUTS {
        for dual_output in [false, true] {
            for dither in [false, true] {
                let key = FragmentKey::RenderTarget {
                    format,
                    dual_output,
                    dither,
                };
                arena.insert(key, code(), 2);
            }
        }
    }
    arena
}

pub type TestCompositor = Compositor<MockDevice, MockSurfaces>;

pub fn compositor(generation: HwGeneration, surfaces: MockSurfaces) -> TestCompositor {
    compositor_with(generation, surfaces, CompositorOpts::default(), full_arena())
}

pub fn compositor_with(
    generation: HwGeneration,
    surfaces: MockSurfaces,
    opts: CompositorOpts,
    arena: FragmentArena,
) -> TestCompositor {
    init_tracing();
    Compositor::new(
        MockDevice::new(),
        surfaces,
        Box::new(GenericCaps::new(generation)),
        arena,
        Box::new(IdentityMatrices),
        opts,
    )
    .unwrap()
}
