use super::*;
use crate::foundation::core::{Rect, Rotation, ScalingMode, SurfaceFormat, SurfaceId};
use crate::hw::caps::PhaseBudget;
use crate::kernel::csc::IDENTITY_MATRIX;
use crate::kernel::descriptor::{Process, SamplerKind, build_filter};
use crate::kernel::library::{FormatClass, FormatKey, FragmentKey};
use crate::scene::layer::{LayerRole, Procamp};
use crate::schedule::phase::{PhaseLayer, PhaseRequest, PhaseTarget};

struct Identity;

impl ColorMatrices for Identity {
    fn matrix(&self, _src: ColorSpace, _dst: ColorSpace) -> Option<ColorMatrix> {
        Some(IDENTITY_MATRIX)
    }
}

fn arena() -> FragmentArena {
    let mut a = FragmentArena::new();
    for sampler in [SamplerKind::Scaling, SamplerKind::Avs] {
        a.insert(
            FragmentKey::Layer {
                role: LayerRole::MainVideo,
                format: FormatKey::Class(FormatClass::Yuv),
                sampler,
                process: Process::Composite,
            },
            vec![1; 16],
            4,
        );
    }
    a.insert(
        FragmentKey::Csc {
            src: ColorSpace::Bt709,
            dst: ColorSpace::Srgb,
        },
        vec![2; 8],
        12,
    );
    a.insert(FragmentKey::Procamp, vec![3; 8], 0);
    a.insert(
        FragmentKey::RenderTarget {
            format: SurfaceFormat::Argb,
            dual_output: false,
            dither: false,
        },
        vec![4; 8],
        2,
    );
    a
}

fn descriptor(scaling: ScalingMode, procamp_slot: Option<u8>) -> FilterDescriptor {
    let mut p = PhaseRequest::new(PhaseBudget::default(), false);
    p.layers.push(PhaseLayer {
        surface: SurfaceId(1),
        role: LayerRole::MainVideo,
        format: SurfaceFormat::Nv12,
        width: 64,
        height: 64,
        src_rect: Rect::new(0, 0, 64, 64),
        dst_rect: Rect::new(0, 0, 64, 64),
        rotation: Rotation::Identity,
        scaling,
        color_space: ColorSpace::Bt709,
        blend: None,
        luma_key: None,
        procamp_slot,
        deinterlace: None,
        chroma_siting: None,
        source_index: Some(0),
    });
    p.targets.push(PhaseTarget {
        surface: SurfaceId(100),
        format: SurfaceFormat::Argb,
        width: 64,
        height: 64,
        dst_rect: Rect::new(0, 0, 64, 64),
        color_space: ColorSpace::Srgb,
        procamp_slot: None,
    });
    build_filter(&p).unwrap()
}

#[test]
fn second_resolve_is_a_hit_on_the_same_entry() {
    let a = arena();
    let procamps = ProcampTable::default();
    let mut cache = KernelCache::new(DEFAULT_KERNEL_CACHE_CAPACITY);
    let d = descriptor(ScalingMode::Bilinear, None);

    let (first, o1) = cache.resolve(&d, &a, &procamps, &Identity).unwrap();
    let (again, o2) = cache.resolve(&d, &a, &procamps, &Identity).unwrap();
    assert_eq!((o1, o2), (CacheOutcome::Miss, CacheOutcome::Hit));
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(cache.len(), 1);
    let st = cache.stats();
    assert_eq!((st.hits, st.misses, st.builds), (1, 1, 1));
}

#[test]
fn procamp_change_releases_and_rebuilds() {
    let a = arena();
    let mut procamps = ProcampTable::default();
    procamps.update(0, Procamp::default()).unwrap();
    let mut cache = KernelCache::new(4);
    let d = descriptor(ScalingMode::Bilinear, Some(0));

    let (first, _) = cache.resolve(&d, &a, &procamps, &Identity).unwrap();
    assert_eq!(first.csc[0].procamp_version, Some(1));
    let (_, same) = cache.resolve(&d, &a, &procamps, &Identity).unwrap();
    assert_eq!(same, CacheOutcome::Hit);

    procamps
        .update(
            0,
            Procamp {
                contrast: 1.5,
                ..Procamp::default()
            },
        )
        .unwrap();
    let (rebuilt, outcome) = cache.resolve(&d, &a, &procamps, &Identity).unwrap();
    assert_eq!(outcome, CacheOutcome::Rebuilt);
    assert_eq!(rebuilt.csc[0].procamp_version, Some(2));
    assert_ne!(rebuilt.id, first.id);
    assert_eq!(cache.stats().stale_releases, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn lru_capacity_evicts_least_recent() {
    let a = arena();
    let procamps = ProcampTable::default();
    let mut cache = KernelCache::new(1);
    let bilinear = descriptor(ScalingMode::Bilinear, None);
    let avs = descriptor(ScalingMode::Avs, None);

    cache.resolve(&bilinear, &a, &procamps, &Identity).unwrap();
    cache.resolve(&avs, &a, &procamps, &Identity).unwrap();
    assert_eq!(cache.stats().evictions, 1);
    let (_, outcome) = cache.resolve(&bilinear, &a, &procamps, &Identity).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
}

#[test]
fn search_failure_caches_nothing() {
    let a = FragmentArena::new();
    let procamps = ProcampTable::default();
    let mut cache = KernelCache::new(4);
    let err = cache
        .resolve(&descriptor(ScalingMode::Bilinear, None), &a, &procamps, &Identity)
        .unwrap_err();
    assert!(matches!(err, crate::CompositeError::KernelResolution(_)));
    assert_eq!(cache.len(), 0);
}
