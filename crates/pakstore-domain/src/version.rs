//! Dotted version comparison.
//!
//! Versions are compared segment by segment as unsigned integers after an
//! optional leading `v` is removed. Missing segments and segments that do not
//! parse as integers count as `0`, so `1.2`, `v1.2.0` and `1.2.0.0` are equal
//! and `1.2.beta` is equal to `1.2.0`. Comparison never fails.

use std::cmp::Ordering;

#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());
    for idx in 0..len {
        let lhs = left.get(idx).copied().unwrap_or(0);
        let rhs = right.get(idx).copied().unwrap_or(0);
        match lhs.cmp(&rhs) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// `-1`, `0` or `1`, matching the manifest tooling's convention.
#[must_use]
pub fn compare_i32(a: &str, b: &str) -> i32 {
    match compare(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

#[must_use]
pub fn has_update(installed: &str, latest: &str) -> bool {
    compare(installed, latest) == Ordering::Less
}

fn segments(raw: &str) -> Vec<u64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    trimmed
        .split('.')
        .map(|segment| segment.parse::<u64>().unwrap_or(0))
        .collect()
}
