//! Command opcodes and their dword encoding.
//!
//! Every command is one header dword `opcode << 24 | payload_len` followed by its payload.

use crate::foundation::core::{ScalingMode, SurfaceId};

/// Slice/power configuration.
pub const OP_POWER_MODE: u8 = 0x01;
/// Store the completion tag a status entry waits for.
pub const OP_STORE_STATUS_TAG: u8 = 0x02;
/// Bump the context completion tag.
pub const OP_INCREMENT_COMPLETION: u8 = 0x03;
/// Diagnostic marker.
pub const OP_MARKER: u8 = 0x04;
/// Stream prologue.
pub const OP_PROLOGUE: u8 = 0x05;
/// Kernel static data.
pub const OP_STATIC_DATA: u8 = 0x10;
/// Kernel interface descriptor.
pub const OP_INTERFACE_DESCRIPTOR: u8 = 0x11;
/// AVS sampler coefficient table.
pub const OP_SAMPLER_AVS: u8 = 0x12;
/// Surface binding table entry.
pub const OP_SURFACE_BINDING: u8 = 0x13;
/// Cache policy override.
pub const OP_CACHE_OVERRIDE: u8 = 0x14;
/// Media state flush.
pub const OP_MEDIA_STATE_FLUSH: u8 = 0x15;
/// Sampler filter of one layer slot.
pub const OP_SAMPLER_STATE: u8 = 0x16;
/// Jump into a second-level batch buffer.
pub const OP_BATCH_BUFFER_START: u8 = 0x20;
/// Dispatch of one 16x16 block.
pub const OP_MEDIA_OBJECT: u8 = 0x21;
/// Store the sync tag that retires batch buffers.
pub const OP_STORE_SYNC_TAG: u8 = 0x22;
/// Pipeline flush.
pub const OP_PIPE_CONTROL: u8 = 0x23;
/// End of a (batch) buffer.
pub const OP_BATCH_BUFFER_END: u8 = 0x2f;

/// One command of the render stream.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command<'a> {
    PowerMode { slices: u8 },
    StoreStatusTag { tag: u32 },
    IncrementCompletion,
    Marker(u32),
    Prologue,
    StaticData(&'a [u32]),
    InterfaceDescriptor {
        kernel_id: u32,
        binary_len: u32,
        const_dwords: u16,
        binding_count: u8,
    },
    /// Polyphase coefficient payload for one AVS slot.
    SamplerAvs { slot: u8, coefficients: &'a [u32] },
    SamplerState { layer: u8, filter: ScalingMode },
    SurfaceBinding {
        index: u8,
        surface: SurfaceId,
        write: bool,
    },
    CacheOverride { policy: u32 },
    MediaStateFlush,
    BatchBufferStart { buffer: u32, dwords: u32 },
    /// Inline dispatch of one 16x16 block: origin, then a `horizontal | vertical << 16` mask per
    /// layer.
    MediaObject {
        media_id: u32,
        x: i32,
        y: i32,
        masks: &'a [u32],
    },
    StoreSyncTag { tag: u32 },
    PipeControl,
    BatchBufferEnd,
}

impl Command<'_> {
    /// Encoded size in dwords, header included.
    pub(crate) fn dwords(&self) -> usize {
        1 + match self {
            Self::PowerMode { .. }
            | Self::StoreStatusTag { .. }
            | Self::Marker(_)
            | Self::CacheOverride { .. }
            | Self::StoreSyncTag { .. } => 1,
            Self::IncrementCompletion
            | Self::Prologue
            | Self::MediaStateFlush
            | Self::PipeControl
            | Self::BatchBufferEnd => 0,
            Self::StaticData(d) => d.len(),
            Self::InterfaceDescriptor { .. } => 3,
            Self::SamplerAvs { coefficients, .. } => 1 + coefficients.len(),
            Self::SamplerState { .. } => 1,
            Self::SurfaceBinding { .. } => 2,
            Self::BatchBufferStart { .. } => 2,
            Self::MediaObject { masks, .. } => 2 + masks.len(),
        }
    }

    fn opcode(&self) -> u8 {
        match self {
            Self::PowerMode { .. } => OP_POWER_MODE,
            Self::StoreStatusTag { .. } => OP_STORE_STATUS_TAG,
            Self::IncrementCompletion => OP_INCREMENT_COMPLETION,
            Self::Marker(_) => OP_MARKER,
            Self::Prologue => OP_PROLOGUE,
            Self::StaticData(_) => OP_STATIC_DATA,
            Self::InterfaceDescriptor { .. } => OP_INTERFACE_DESCRIPTOR,
            Self::SamplerAvs { .. } => OP_SAMPLER_AVS,
            Self::SamplerState { .. } => OP_SAMPLER_STATE,
            Self::SurfaceBinding { .. } => OP_SURFACE_BINDING,
            Self::CacheOverride { .. } => OP_CACHE_OVERRIDE,
            Self::MediaStateFlush => OP_MEDIA_STATE_FLUSH,
            Self::BatchBufferStart { .. } => OP_BATCH_BUFFER_START,
            Self::MediaObject { .. } => OP_MEDIA_OBJECT,
            Self::StoreSyncTag { .. } => OP_STORE_SYNC_TAG,
            Self::PipeControl => OP_PIPE_CONTROL,
            Self::BatchBufferEnd => OP_BATCH_BUFFER_END,
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u32>) {
        out.push(u32::from(self.opcode()) << 24 | (self.dwords() as u32 - 1));
        match self {
            Self::PowerMode { slices } => out.push(u32::from(*slices)),
            Self::StoreStatusTag { tag } | Self::StoreSyncTag { tag } => out.push(*tag),
            Self::Marker(m) => out.push(*m),
            Self::CacheOverride { policy } => out.push(*policy),
            Self::IncrementCompletion
            | Self::Prologue
            | Self::MediaStateFlush
            | Self::PipeControl
            | Self::BatchBufferEnd => {}
            Self::StaticData(d) => out.extend_from_slice(d),
            Self::InterfaceDescriptor {
                kernel_id,
                binary_len,
                const_dwords,
                binding_count,
            } => out.extend([
                *kernel_id,
                *binary_len,
                u32::from(*const_dwords) | u32::from(*binding_count) << 16,
            ]),
            Self::SamplerAvs { slot, coefficients } => {
                out.push(u32::from(*slot));
                out.extend_from_slice(coefficients);
            }
            Self::SamplerState { layer, filter } => {
                out.push(u32::from(*layer) | u32::from(filter_code(*filter)) << 8);
            }
            Self::SurfaceBinding {
                index,
                surface,
                write,
            } => out.extend([u32::from(*index) | u32::from(*write) << 8, surface.0]),
            Self::BatchBufferStart { buffer, dwords } => out.extend([*buffer, *dwords]),
            Self::MediaObject {
                media_id,
                x,
                y,
                masks,
            } => {
                out.push(*media_id);
                out.push((*x as u32 & 0xffff) | (*y as u32) << 16);
                out.extend_from_slice(masks);
            }
        }
    }
}

/// Wire code of a sampler filter.
pub fn filter_code(filter: ScalingMode) -> u8 {
    match filter {
        ScalingMode::Nearest => 0,
        ScalingMode::Bilinear => 1,
        ScalingMode::Avs => 2,
    }
}

/// Opcode of an encoded header dword.
pub fn opcode_of(header: u32) -> u8 {
    (header >> 24) as u8
}

/// Walk an encoded stream, yielding `(opcode, payload)` per command.
pub fn decode(stream: &[u32]) -> impl Iterator<Item = (u8, &[u32])> {
    let mut rest = stream;
    std::iter::from_fn(move || {
        let (&header, tail) = rest.split_first()?;
        let len = ((header & 0x00ff_ffff) as usize).min(tail.len());
        let (payload, next) = tail.split_at(len);
        rest = next;
        Some((opcode_of(header), payload))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/submit/command.rs"]
mod tests;
