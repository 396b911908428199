//! Fragment arena: the pre-built kernel pieces a combined kernel is linked from.

use crate::foundation::core::{ColorSpace, Rotation, SurfaceFormat};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::kernel::descriptor::{EntryRole, FilterDescriptor, FilterEntry, Process, SamplerKind};
use crate::scene::layer::LayerRole;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Maximum size of a linked kernel binary.
pub(crate) const MAX_KERNEL_BINARY: usize = 160 * 1024;
/// Maximum number of fragments in one linked kernel.
pub(crate) const MAX_FRAGMENTS_PER_KERNEL: usize = 25;
/// Maximum number of CSC matrices one linked kernel can load.
pub(crate) const MAX_CSC_SLOTS: usize = 8;

/// Index of a fragment inside a [`FragmentArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(pub u32);

/// Broad family of surface formats, used as a search fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatClass {
    /// Any RGB format.
    Rgb,
    /// Any packed or planar YUV format.
    Yuv,
    /// Palettized formats.
    Palette,
}

impl FormatClass {
    /// Family `format` belongs to.
    pub fn of(format: SurfaceFormat) -> Self {
        if format.is_palette() {
            Self::Palette
        } else if format.is_yuv() {
            Self::Yuv
        } else {
            Self::Rgb
        }
    }
}

/// Format part of a layer fragment key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKey {
    /// Fragment handles exactly this format.
    Exact(SurfaceFormat),
    /// Fragment handles every format of the class.
    Class(FormatClass),
}

/// What a fragment implements. The arena is searched by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentKey {
    /// Sample and process one layer.
    Layer {
        /// Layer role.
        role: LayerRole,
        /// Source format.
        format: FormatKey,
        /// Sampler class.
        sampler: SamplerKind,
        /// Blend step.
        process: Process,
    },
    /// Color conversion of the layer just sampled.
    Csc {
        /// Source color space.
        src: ColorSpace,
        /// Destination color space.
        dst: ColorSpace,
    },
    /// Procamp adjustment.
    Procamp,
    /// Luma keying.
    LumaKey,
    /// Solid background fill.
    Colorfill,
    /// Output rotation.
    Rotation(Rotation),
    /// Write the composited block to the render target(s).
    RenderTarget {
        /// Target format.
        format: SurfaceFormat,
        /// Write two targets.
        dual_output: bool,
        /// Dither on write.
        dither: bool,
    },
}

/// One pre-compiled kernel piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Search key.
    pub key: FragmentKey,
    /// Machine code.
    pub code: Vec<u8>,
    /// Constant (CURBE) dwords the fragment reads.
    pub const_dwords: u16,
}

/// Arena of kernel fragments populated by the embedder before compositing.
#[derive(Debug, Default)]
pub struct FragmentArena {
    fragments: Vec<Fragment>,
    by_key: HashMap<FragmentKey, FragmentId>,
}

impl FragmentArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment. A later insert under the same key shadows the earlier one.
    pub fn insert(&mut self, key: FragmentKey, code: Vec<u8>, const_dwords: u16) -> FragmentId {
        let id = FragmentId(self.fragments.len() as u32);
        self.fragments.push(Fragment {
            key,
            code,
            const_dwords,
        });
        self.by_key.insert(key, id);
        id
    }

    /// Fragment by id.
    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0 as usize)
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Return `true` when no fragment was inserted.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn lookup(&self, key: FragmentKey) -> Option<FragmentId> {
        self.by_key.get(&key).copied()
    }

    fn require(&self, key: FragmentKey) -> CompositeResult<FragmentId> {
        self.lookup(key)
            .ok_or_else(|| CompositeError::kernel(format!("no fragment for {key:?}")))
    }

    fn layer_fragment(&self, entry: &FilterEntry, role: LayerRole) -> CompositeResult<FragmentId> {
        let exact = FragmentKey::Layer {
            role,
            format: FormatKey::Exact(entry.format),
            sampler: entry.sampler,
            process: entry.process,
        };
        if let Some(id) = self.lookup(exact) {
            return Ok(id);
        }
        self.require(FragmentKey::Layer {
            role,
            format: FormatKey::Class(FormatClass::of(entry.format)),
            sampler: entry.sampler,
            process: entry.process,
        })
    }
}

/// One CSC matrix a linked kernel loads: convert `src` to `dst`, optionally with procamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CscSlot {
    pub(crate) src: ColorSpace,
    pub(crate) dst: ColorSpace,
    pub(crate) procamp: Option<u8>,
}

/// Result of searching the arena for a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SearchResult {
    pub(crate) fragments: SmallVec<[FragmentId; 16]>,
    pub(crate) csc: SmallVec<[CscSlot; 4]>,
    /// CSC slot used by each layer entry, `None` when it needs no conversion.
    pub(crate) layer_matrix: SmallVec<[Option<u8>; 9]>,
    /// Color space the kernel blends in.
    pub(crate) processing: ColorSpace,
}

/// Resolve every entry of `desc` to fragments and allocate CSC slots.
///
/// Layers are converted into the render target's color space. Slot 0 is reserved for the first
/// procamp-carrying conversion so its coefficients can be refreshed in isolation.
pub(crate) fn search(
    arena: &FragmentArena,
    desc: &FilterDescriptor,
) -> CompositeResult<SearchResult> {
    let rt = desc
        .render_target()
        .filter(|e| e.role == EntryRole::RenderTarget)
        .ok_or_else(|| CompositeError::kernel("descriptor has no render target entry"))?;
    let processing = rt.color_space;

    let mut out = SearchResult {
        fragments: SmallVec::new(),
        csc: SmallVec::new(),
        layer_matrix: SmallVec::new(),
        processing,
    };

    if let Some(e) = desc.layers().iter().find(|e| e.procamp.is_some()) {
        out.csc.push(CscSlot {
            src: e.color_space,
            dst: processing,
            procamp: e.procamp,
        });
    }

    for (i, entry) in desc.layers().iter().enumerate() {
        let EntryRole::Layer(role) = entry.role else {
            return Err(CompositeError::kernel(format!(
                "entry {i} is a render target in layer position"
            )));
        };

        if i == 0 && entry.colorfill {
            out.fragments.push(arena.require(FragmentKey::Colorfill)?);
        }
        out.fragments.push(arena.layer_fragment(entry, role)?);
        if entry.luma_key {
            out.fragments.push(arena.require(FragmentKey::LumaKey)?);
        }

        let converts = entry.color_space != ColorSpace::Any && entry.color_space != processing;
        let matrix = if converts || entry.procamp.is_some() {
            if converts {
                out.fragments.push(arena.require(FragmentKey::Csc {
                    src: entry.color_space,
                    dst: processing,
                })?);
            }
            if entry.procamp.is_some() {
                out.fragments.push(arena.require(FragmentKey::Procamp)?);
            }
            let slot = CscSlot {
                src: entry.color_space,
                dst: processing,
                procamp: entry.procamp,
            };
            let idx = match out.csc.iter().position(|s| *s == slot) {
                Some(idx) => idx,
                None => {
                    out.csc.push(slot);
                    out.csc.len() - 1
                }
            };
            if out.csc.len() > MAX_CSC_SLOTS {
                return Err(CompositeError::kernel(format!(
                    "kernel needs {} color conversions, at most {MAX_CSC_SLOTS} fit",
                    out.csc.len()
                )));
            }
            Some(idx as u8)
        } else {
            None
        };
        out.layer_matrix.push(matrix);
    }

    if rt.procamp.is_some() {
        out.fragments.push(arena.require(FragmentKey::Procamp)?);
        out.csc.push(CscSlot {
            src: processing,
            dst: processing,
            procamp: rt.procamp,
        });
        if out.csc.len() > MAX_CSC_SLOTS {
            return Err(CompositeError::kernel("no CSC slot left for the target procamp"));
        }
    }
    if rt.colorfill {
        out.fragments.push(arena.require(FragmentKey::Colorfill)?);
    }
    if rt.rotation != Rotation::Identity {
        out.fragments.push(arena.require(FragmentKey::Rotation(rt.rotation))?);
    }
    out.fragments.push(arena.require(FragmentKey::RenderTarget {
        format: rt.format,
        dual_output: rt.dual_output,
        dither: rt.dither,
    })?);

    if out.fragments.len() > MAX_FRAGMENTS_PER_KERNEL {
        return Err(CompositeError::kernel(format!(
            "kernel combines {} fragments, at most {MAX_FRAGMENTS_PER_KERNEL} fit",
            out.fragments.len()
        )));
    }
    Ok(out)
}

/// Linked kernel binary with its merged constant layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LinkedKernel {
    pub(crate) binary: Vec<u8>,
    /// Constant dword offset of each fragment, in link order.
    pub(crate) const_offsets: SmallVec<[u16; 16]>,
    pub(crate) const_dwords: u16,
}

/// Concatenate the fragments of `found` into one binary.
pub(crate) fn link(arena: &FragmentArena, found: &SearchResult) -> CompositeResult<LinkedKernel> {
    let mut binary = Vec::new();
    let mut const_offsets = SmallVec::new();
    let mut const_dwords: u16 = 0;

    for &id in &found.fragments {
        let frag = arena
            .get(id)
            .ok_or_else(|| CompositeError::kernel(format!("stale fragment id {}", id.0)))?;
        if binary.len() + frag.code.len() > MAX_KERNEL_BINARY {
            return Err(CompositeError::kernel(format!(
                "linked kernel exceeds {MAX_KERNEL_BINARY} bytes"
            )));
        }
        binary.extend_from_slice(&frag.code);
        const_offsets.push(const_dwords);
        const_dwords = const_dwords
            .checked_add(frag.const_dwords)
            .ok_or_else(|| CompositeError::kernel("constant layout overflow"))?;
    }

    Ok(LinkedKernel {
        binary,
        const_offsets,
        const_dwords,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/library.rs"]
mod tests;
