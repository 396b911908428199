use super::*;

#[test]
fn opts_default_from_empty_json() {
    let opts = CompositorOpts::from_json_str("{}").unwrap();
    assert_eq!(opts, CompositorOpts::default());
    assert_eq!(opts.batch_max_buffers, 32);
    assert_eq!(opts.batch_align, 32 * 1024);
    assert!(opts.report_status);
    assert!(opts.use_batch_buffers);
}

#[test]
fn opts_json_overrides_fields() {
    let opts = CompositorOpts::from_json_str(
        r#"{"kernel_cache_capacity": 8, "stream_tagging": true, "gpu_context": 3}"#,
    )
    .unwrap();
    assert_eq!(opts.kernel_cache_capacity, 8);
    assert!(opts.stream_tagging);
    assert_eq!(opts.gpu_context, GpuContextId(3));
    assert_eq!(opts.coeff_slots, DEFAULT_COEFF_SLOTS);
}

#[test]
fn opts_reject_bad_values() {
    for json in [
        r#"{"batch_max_buffers": 0}"#,
        r#"{"batch_align": 1000}"#,
        r#"{"kernel_cache_capacity": 0}"#,
        r#"{"coeff_slots": 0}"#,
        r#"{"status_capacity": 48}"#,
        r#"{"status_capacity": "many"}"#,
        "not json",
    ] {
        let err = CompositorOpts::from_json_str(json).unwrap_err();
        assert!(matches!(err, CompositeError::Validation(_)), "{json}: {err}");
    }
}

#[test]
fn caches_follow_opts() {
    let opts = CompositorOpts {
        status_capacity: 8,
        coeff_slots: 2,
        ..CompositorOpts::default()
    };
    let caches = CompositorCaches::from_opts(&opts).unwrap();
    assert_eq!(caches.status.capacity(), 8);
    assert_eq!(caches.batches.len(), 0);

    let bad = CompositorOpts {
        status_capacity: 0,
        ..CompositorOpts::default()
    };
    assert!(CompositorCaches::from_opts(&bad).is_err());
}

#[test]
fn procamp_slots_run_out_per_call() {
    let mut table = ProcampTable::default();
    let mut next = 0u8;
    let p = Procamp::default();
    for expected in 0..PROCAMP_SLOTS as u8 {
        assert_eq!(procamp_slot(&mut table, &mut next, &p).unwrap(), expected);
    }
    let err = procamp_slot(&mut table, &mut next, &p).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(usize::from(next), PROCAMP_SLOTS);
}
