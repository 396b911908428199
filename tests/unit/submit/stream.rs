use super::*;
use crate::batch::pool::BatchPoolOpts;
use crate::batch::recorder::record;
use crate::coeff::cache::DirectionTable;
use crate::foundation::core::{ColorSpace, Rect, Rotation};
use crate::kernel::descriptor::DescriptorHash;
use crate::kernel::library::LinkedKernel;
use crate::submit::command::*;
use smallvec::{SmallVec, smallvec};
use std::collections::HashMap;

#[derive(Default)]
struct MockDevice {
    capacity: usize,
    primary: Option<CommandBuffer>,
    submitted: Vec<CommandBuffer>,
    returned: usize,
    completion: HashMap<GpuContextId, u32>,
    fail_submit: bool,
}

impl MockDevice {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
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
        if self.fail_submit {
            return Err(CompositeError::submission("device lost"));
        }
        self.submitted.push(buf);
        Ok(())
    }

    fn completion_tag(&self, ctx: GpuContextId) -> u32 {
        self.completion.get(&ctx).copied().unwrap_or(1)
    }

    fn increment_completion_tag(&mut self, ctx: GpuContextId) {
        let next = self.completion_tag(ctx) + 1;
        self.completion.insert(ctx, next);
    }

    fn reported_completion_tag(&self, _ctx: GpuContextId) -> u32 {
        0
    }

    fn reported_sync_tag(&self) -> u32 {
        0
    }
}

fn kernel() -> KernelEntry {
    KernelEntry {
        id: 3,
        hash: DescriptorHash { hi: 0, lo: 0 },
        fragments: SmallVec::new(),
        kernel: LinkedKernel {
            binary: vec![0; 64],
            const_offsets: SmallVec::new(),
            const_dwords: 4,
        },
        csc: SmallVec::new(),
        layer_matrix: SmallVec::new(),
        processing: ColorSpace::Srgb,
    }
}

fn static_data() -> StaticData {
    StaticData::Gen9 {
        colorfill: 0,
        dual_output: false,
        dither: false,
        luma_low: 0,
        luma_high: 0,
        fill_alpha: 255,
        csc: smallvec![crate::kernel::csc::IDENTITY_MATRIX],
        layers: SmallVec::new(),
        nlas: None,
    }
}

fn signature() -> ArgSignature {
    let r = Rect::new(0, 0, 32, 32);
    ArgSignature {
        media_id: 3,
        output_rect: r,
        dst_rects: smallvec![r],
        rotations: smallvec![Rotation::Identity],
        step_x: 1.0f32.to_bits(),
        skip_blocks: false,
        nlas: None,
    }
}

const BINDINGS: [(SurfaceId, bool); 2] = [(SurfaceId(1), false), (SurfaceId(9), true)];
const SAMPLERS: [ScalingMode; 1] = [ScalingMode::Nearest];

fn submission<'a>(
    data: &'a StaticData,
    kernel: &'a KernelEntry,
    sig: &'a ArgSignature,
) -> PhaseSubmission<'a> {
    PhaseSubmission {
        generation: HwGeneration::Gen9,
        ctx: GpuContextId(0),
        last: true,
        marker: 77,
        static_data: data,
        kernel,
        avs: None,
        samplers: &SAMPLERS,
        bindings: &BINDINGS,
        batch: None,
        signature: sig,
        null_render: false,
        call_id: 1,
    }
}

fn opcodes(buf: &CommandBuffer) -> Vec<u8> {
    decode(buf.dwords()).map(|(op, _)| op).collect()
}

#[test]
fn last_phase_inline_dispatch_order() {
    let mut dev = MockDevice::new(4096);
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let mut sub = Submitter::default();
    let (data, k, sig) = (static_data(), kernel(), signature());

    let receipt = sub
        .submit_phase(&mut dev, &mut pool, &submission(&data, &k, &sig))
        .unwrap();
    assert_eq!(receipt.sync_tag, 1);
    assert_eq!(receipt.completion_tag, Some(1));
    assert_eq!(sub.next_tag, 2);
    assert_eq!(dev.completion_tag(GpuContextId(0)), 2);

    let buf = &dev.submitted[0];
    assert_eq!(receipt.dwords, buf.cursor());
    assert_eq!(
        opcodes(buf),
        vec![
            OP_POWER_MODE,
            OP_STORE_STATUS_TAG,
            OP_INCREMENT_COMPLETION,
            OP_MARKER,
            OP_PROLOGUE,
            OP_STATIC_DATA,
            OP_INTERFACE_DESCRIPTOR,
            OP_SAMPLER_STATE,
            OP_SURFACE_BINDING,
            OP_SURFACE_BINDING,
            OP_CACHE_OVERRIDE,
            OP_MEDIA_OBJECT,
            OP_MEDIA_OBJECT,
            OP_MEDIA_OBJECT,
            OP_MEDIA_OBJECT,
            OP_STORE_SYNC_TAG,
            OP_PIPE_CONTROL,
            OP_BATCH_BUFFER_END,
        ]
    );
    let marker = decode(buf.dwords()).find(|(op, _)| *op == OP_MARKER).unwrap();
    assert_eq!(marker.1, &[77]);
}

#[test]
fn sampler_filter_reaches_the_stream() {
    let (data, k, sig) = (static_data(), kernel(), signature());
    let emit = |filters: &[ScalingMode]| {
        let mut dev = MockDevice::new(4096);
        let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
        let mut p = submission(&data, &k, &sig);
        p.samplers = filters;
        Submitter::default()
            .submit_phase(&mut dev, &mut pool, &p)
            .unwrap();
        dev.submitted.remove(0).dwords().to_vec()
    };

    let nearest = emit(&[ScalingMode::Nearest]);
    let bilinear = emit(&[ScalingMode::Bilinear]);
    assert_ne!(nearest, bilinear);
    let state = |stream: &[u32]| {
        decode(stream)
            .find(|(op, _)| *op == OP_SAMPLER_STATE)
            .map(|(_, payload)| payload.to_vec())
            .unwrap()
    };
    assert_eq!(state(&nearest), vec![u32::from(filter_code(ScalingMode::Nearest)) << 8]);
    assert_eq!(state(&bilinear), vec![u32::from(filter_code(ScalingMode::Bilinear)) << 8]);
}

#[test]
fn gen8_batch_phase_jumps_into_recording() {
    let mut dev = MockDevice::new(4096);
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let mut sub = Submitter::default();
    let (data, k, sig) = (static_data(), kernel(), signature());
    let (id, _) = pool.acquire(4096, &sig, 1, 0, true).unwrap();
    record(&mut pool, id, &sig).unwrap();

    let table = CoeffTable {
        horizontal: DirectionTable {
            y: vec![1, 2],
            uv: Vec::new(),
            scale: 1.0,
        },
        ..CoeffTable::default()
    };
    let mut p = submission(&data, &k, &sig);
    p.generation = HwGeneration::Gen8;
    p.last = false;
    p.avs = Some(&table);
    p.batch = Some(id);

    let receipt = sub.submit_phase(&mut dev, &mut pool, &p).unwrap();
    assert_eq!(receipt.completion_tag, None);
    assert_eq!(dev.completion_tag(GpuContextId(0)), 1);
    assert_eq!(
        opcodes(&dev.submitted[0]),
        vec![
            OP_POWER_MODE,
            OP_MARKER,
            OP_PROLOGUE,
            OP_STATIC_DATA,
            OP_INTERFACE_DESCRIPTOR,
            OP_SAMPLER_AVS,
            OP_SAMPLER_STATE,
            OP_SURFACE_BINDING,
            OP_SURFACE_BINDING,
            OP_CACHE_OVERRIDE,
            OP_MEDIA_STATE_FLUSH,
            OP_BATCH_BUFFER_START,
            OP_STORE_SYNC_TAG,
            OP_BATCH_BUFFER_END,
        ]
    );
    let b = pool.buffer(id).unwrap();
    assert!(b.busy);
    assert_eq!(b.sync_tag, receipt.sync_tag);
    assert_eq!(b.call_id, 1);
}

#[test]
fn overflow_rolls_back_and_returns_the_buffer() {
    let mut dev = MockDevice::new(0);
    let mut prefilled = CommandBuffer::with_capacity(12);
    prefilled.emit(&Command::Marker(5)).unwrap();
    dev.primary = Some(prefilled.clone());

    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let mut sub = Submitter::default();
    let (data, k, sig) = (static_data(), kernel(), signature());

    let err = sub
        .submit_phase(&mut dev, &mut pool, &submission(&data, &k, &sig))
        .unwrap_err();
    assert!(matches!(err, CompositeError::Submission(_)));
    assert_eq!(dev.returned, 1);
    assert!(dev.submitted.is_empty());
    assert_eq!(dev.primary.as_ref(), Some(&prefilled));
    assert_eq!(sub.next_tag, 1);
    assert_eq!(dev.completion_tag(GpuContextId(0)), 1);
}

#[test]
fn failed_submission_discards_the_recording() {
    let mut dev = MockDevice::new(4096);
    dev.fail_submit = true;
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let mut sub = Submitter::default();
    let (data, k, sig) = (static_data(), kernel(), signature());
    let (id, _) = pool.acquire(4096, &sig, 1, 0, true).unwrap();
    record(&mut pool, id, &sig).unwrap();

    let mut p = submission(&data, &k, &sig);
    p.batch = Some(id);
    assert!(sub.submit_phase(&mut dev, &mut pool, &p).is_err());
    let b = pool.buffer(id).unwrap();
    assert!(b.signature.is_none());
    assert!(!b.busy);
    assert_eq!(sub.next_tag, 1);
}

#[test]
fn unrecorded_batch_is_rejected() {
    let mut dev = MockDevice::new(4096);
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let mut sub = Submitter::default();
    let (data, k, sig) = (static_data(), kernel(), signature());
    let (id, _) = pool.acquire(4096, &sig, 1, 0, true).unwrap();

    let mut p = submission(&data, &k, &sig);
    p.batch = Some(id);
    assert!(sub.submit_phase(&mut dev, &mut pool, &p).is_err());
    assert_eq!(dev.returned, 1);
    assert_eq!(dev.primary.as_ref().map(CommandBuffer::cursor), Some(0));
}

#[test]
fn avs_payload_order() {
    let table = CoeffTable {
        horizontal: DirectionTable {
            y: vec![1],
            uv: vec![2],
            scale: 1.0,
        },
        vertical: DirectionTable {
            y: vec![3],
            uv: vec![-1],
            scale: 1.0,
        },
        four_tap_y: true,
        four_tap_uv: true,
    };
    assert_eq!(avs_dwords(&table), vec![1, 2, 3, u32::MAX]);
}
