use super::*;
use crate::batch::pool::BatchPoolOpts;
use crate::foundation::core::Rotation;
use crate::submit::command::{OP_BATCH_BUFFER_END, OP_MEDIA_OBJECT, decode};
use smallvec::smallvec;

fn sig(output: Rect, dst: Rect, skip_blocks: bool) -> ArgSignature {
    ArgSignature {
        media_id: 1,
        output_rect: output,
        dst_rects: smallvec![dst],
        rotations: smallvec![Rotation::Identity],
        step_x: 0,
        skip_blocks,
        nlas: None,
    }
}

fn collect(output: Rect, dst: &[Rect], skip: bool) -> Vec<(i32, i32, Vec<u32>)> {
    let mut out = Vec::new();
    walk_blocks(output, dst, skip, |x, y, m| {
        out.push((x, y, m.to_vec()));
        Ok(())
    })
    .unwrap();
    out
}

#[test]
fn span_masks() {
    assert_eq!(span_mask(0, 16), 0xffff);
    assert_eq!(span_mask(4, 8), 0x00f0);
    assert_eq!(span_mask(-5, 3), 0x0007);
    assert_eq!(span_mask(20, 30), 0);
    assert_eq!(span_mask(-40, -20), 0);
    assert_eq!(span_mask(0, 0), 0);
}

#[test]
fn skip_blocks_visits_only_covered_blocks() {
    let blocks = collect(Rect::new(0, 0, 64, 64), &[Rect::new(16, 16, 32, 32)], true);
    assert_eq!(blocks, vec![(16, 16, vec![0xffff_ffff])]);
}

#[test]
fn partial_coverage_sets_partial_masks() {
    let blocks = collect(Rect::new(0, 0, 16, 16), &[Rect::new(4, 8, 16, 16)], true);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].2[0], 0xfff0 | 0xff00 << 16);
}

#[test]
fn full_walk_visits_every_block() {
    let blocks = collect(Rect::new(0, 0, 64, 64), &[Rect::new(16, 16, 32, 32)], false);
    assert_eq!(blocks.len(), 16);
    let full = blocks.iter().filter(|(_, _, m)| m[0] == 0xffff_ffff).count();
    assert_eq!(full, 1);
    let untouched = blocks.iter().filter(|(_, _, m)| m[0] == 0).count();
    assert_eq!(untouched, 9);
}

#[test]
fn block_origins_snap_to_the_grid() {
    let blocks = collect(Rect::new(8, 4, 40, 20), &[Rect::new(8, 4, 40, 20)], false);
    let origins: Vec<(i32, i32)> = blocks.iter().map(|(x, y, _)| (*x, *y)).collect();
    assert_eq!(
        origins,
        vec![(8, 4), (16, 4), (32, 4), (8, 16), (16, 16), (32, 16)]
    );
}

#[test]
fn batch_size_bounds_a_recording() {
    let s = sig(Rect::new(0, 0, 32, 32), Rect::new(0, 0, 32, 32), false);
    assert_eq!(batch_size(&s), (9 * 4 + 1) * 4);
}

#[test]
fn record_writes_blocks_then_end() {
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let s = sig(Rect::new(0, 0, 32, 32), Rect::new(0, 0, 32, 32), false);
    let (id, _) = pool.acquire(batch_size(&s), &s, 1, 0, true).unwrap();

    assert_eq!(record(&mut pool, id, &s).unwrap(), 4);
    let b = pool.buffer(id).unwrap();
    assert!(!b.locked);
    assert_eq!(b.signature.as_ref(), Some(&s));
    let ops: Vec<u8> = decode(&b.data).map(|(op, _)| op).collect();
    assert_eq!(ops.iter().filter(|&&op| op == OP_MEDIA_OBJECT).count(), 4);
    assert_eq!(ops.last(), Some(&OP_BATCH_BUFFER_END));
    assert_eq!(pool.stats().recorded, 1);
}

#[test]
fn locked_buffer_is_not_recorded_twice() {
    let mut pool = BatchBufferPool::new(BatchPoolOpts::default());
    let s = sig(Rect::new(0, 0, 16, 16), Rect::new(0, 0, 16, 16), false);
    let (id, _) = pool.acquire(64, &s, 1, 0, true).unwrap();
    pool.buffer_mut(id).unwrap().locked = true;

    let err = record(&mut pool, id, &s).unwrap_err();
    assert!(err.is_retryable());
    assert!(pool.buffer(id).unwrap().locked, "the other recording keeps its lock");
}

#[test]
fn overflow_discards_and_unlocks() {
    let mut pool = BatchBufferPool::new(BatchPoolOpts {
        max_buffers: 4,
        align: 64,
    });
    let s = sig(Rect::new(0, 0, 64, 64), Rect::new(0, 0, 64, 64), false);
    let (id, _) = pool.acquire(1, &s, 1, 0, true).unwrap();

    assert!(record(&mut pool, id, &s).is_err());
    let b = pool.buffer(id).unwrap();
    assert!(!b.locked);
    assert!(b.signature.is_none());
    assert!(b.data.is_empty());
    assert_eq!(pool.stats().recorded, 0);
}
