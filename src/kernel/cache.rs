use crate::foundation::core::ColorSpace;
use crate::foundation::error::CompositeResult;
use crate::kernel::csc::{ColorMatrices, ColorMatrix, ProcampTable, slot_matrix};
use crate::kernel::descriptor::{DescriptorHash, FilterDescriptor};
use crate::kernel::library::{CscSlot, FragmentArena, FragmentId, LinkedKernel, link, search};
use lru::LruCache;
use smallvec::SmallVec;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of linked kernels kept.
pub(crate) const DEFAULT_KERNEL_CACHE_CAPACITY: usize = 64;

/// One loaded CSC matrix.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CscMatrix {
    pub(crate) slot: CscSlot,
    /// Procamp version the coefficients were computed with.
    pub(crate) procamp_version: Option<u32>,
    pub(crate) coeffs: ColorMatrix,
}

/// A linked kernel combination.
#[derive(Debug)]
pub(crate) struct KernelEntry {
    /// Kernel id, unique for the cache's lifetime.
    pub(crate) id: u32,
    pub(crate) hash: DescriptorHash,
    pub(crate) fragments: SmallVec<[FragmentId; 16]>,
    pub(crate) kernel: LinkedKernel,
    pub(crate) csc: SmallVec<[CscMatrix; 4]>,
    /// CSC slot per layer entry.
    pub(crate) layer_matrix: SmallVec<[Option<u8>; 9]>,
    /// Color space the kernel blends in, which is also the colorfill color space.
    pub(crate) processing: ColorSpace,
}

impl KernelEntry {
    fn is_current(&self, procamps: &ProcampTable) -> bool {
        self.csc.iter().all(|m| match m.slot.procamp {
            Some(p) => procamps.version(p) == m.procamp_version,
            None => true,
        })
    }
}

/// How [`KernelCache::resolve`] satisfied a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CacheOutcome {
    /// Reused without search or link.
    Hit,
    /// Searched and linked.
    Miss,
    /// Cached entry had an outdated procamp matrix and was replaced.
    Rebuilt,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KernelCacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) builds: u64,
    pub(crate) evictions: u64,
    pub(crate) stale_releases: u64,
}

/// Descriptor-hash keyed cache of linked kernels with LRU eviction.
pub(crate) struct KernelCache {
    entries: LruCache<DescriptorHash, Arc<KernelEntry>>,
    next_id: u32,
    stats: KernelCacheStats,
}

impl KernelCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            next_id: 0,
            stats: KernelCacheStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> KernelCacheStats {
        self.stats
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[tracing::instrument(level = "trace", skip_all, fields(entries = desc.len()))]
    pub(crate) fn resolve(
        &mut self,
        desc: &FilterDescriptor,
        arena: &FragmentArena,
        procamps: &ProcampTable,
        matrices: &dyn ColorMatrices,
    ) -> CompositeResult<(Arc<KernelEntry>, CacheOutcome)> {
        let hash = desc.hash();

        let mut outcome = CacheOutcome::Miss;
        if let Some(entry) = self.entries.get(&hash) {
            if entry.is_current(procamps) {
                self.stats.hits = self.stats.hits.saturating_add(1);
                tracing::trace!(kcid = entry.id, "kernel cache hit");
                return Ok((Arc::clone(entry), CacheOutcome::Hit));
            }
            self.entries.pop(&hash);
            self.stats.stale_releases = self.stats.stale_releases.saturating_add(1);
            outcome = CacheOutcome::Rebuilt;
        }
        self.stats.misses = self.stats.misses.saturating_add(1);

        let found = search(arena, desc)?;
        let kernel = link(arena, &found)?;
        let csc = found
            .csc
            .iter()
            .map(|slot| {
                let params = slot.procamp.and_then(|p| procamps.params(p));
                Ok(CscMatrix {
                    slot: *slot,
                    procamp_version: slot.procamp.and_then(|p| procamps.version(p)),
                    coeffs: slot_matrix(matrices, slot.src, slot.dst, params.as_ref())?,
                })
            })
            .collect::<CompositeResult<SmallVec<_>>>()?;

        let entry = Arc::new(KernelEntry {
            id: self.next_id,
            hash,
            fragments: found.fragments,
            kernel,
            csc,
            layer_matrix: found.layer_matrix,
            processing: found.processing,
        });
        self.next_id = self.next_id.wrapping_add(1);
        self.stats.builds = self.stats.builds.saturating_add(1);
        tracing::debug!(
            kcid = entry.id,
            fragments = entry.fragments.len(),
            bytes = entry.kernel.binary.len(),
            "linked kernel"
        );

        if let Some((evicted, _)) = self.entries.push(hash, Arc::clone(&entry))
            && evicted != hash
        {
            self.stats.evictions = self.stats.evictions.saturating_add(1);
        }
        Ok((entry, outcome))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/cache.rs"]
mod tests;
