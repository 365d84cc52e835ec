use std::ops::Range;
use std::thread;

/// Split `rows` into at most `workers` contiguous, non-overlapping ranges.
///
/// Every range except possibly the last holds `ceil(rows / workers)` rows.
pub fn row_ranges(rows: usize, workers: usize) -> Vec<Range<usize>> {
    if rows == 0 {
        return Vec::new();
    }
    let per_block = rows.div_ceil(workers.max(1));
    (0..rows)
        .step_by(per_block)
        .map(|start| start..(start + per_block).min(rows))
        .collect()
}

/// Parallel-for over disjoint row blocks of an output buffer.
///
/// `out` holds whole rows of `row_len` samples each. `f` receives the range
/// of row indices a block covers together with that block's samples. Blocks
/// never overlap, so helpers need no synchronisation beyond the final join.
pub fn for_each_row_block<F>(out: &mut [u8], row_len: usize, workers: usize, f: F)
where
    F: Fn(Range<usize>, &mut [u8]) + Sync,
{
    let rows = if row_len == 0 { 0 } else { out.len() / row_len };
    if workers <= 1 || rows <= 1 {
        f(0..rows, out);
        return;
    }

    let per_block = rows.div_ceil(workers);
    let f = &f;
    thread::scope(|s| {
        for (k, block) in out.chunks_mut(per_block * row_len).enumerate() {
            let start = k * per_block;
            let range = start..start + block.len() / row_len;
            s.spawn(move || f(range, block));
        }
    });
}

/// Parallel sum over row ranges.
///
/// Partial results are added after every helper has finished, in range
/// order, so the total is independent of scheduling.
pub fn sum_over_rows<F>(rows: usize, workers: usize, f: F) -> usize
where
    F: Fn(Range<usize>) -> usize + Sync,
{
    if workers <= 1 || rows <= 1 {
        return f(0..rows);
    }

    let f = &f;
    thread::scope(|s| {
        let helpers: Vec<_> = row_ranges(rows, workers)
            .into_iter()
            .map(|range| s.spawn(move || f(range)))
            .collect();
        helpers
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .sum()
    })
}
