//! Bucket placement policy.
//!
//! Stateless decision procedure: given the handler's buckets and a
//! minimum free-space requirement, picks a target bucket id (possibly
//! after the caller provisions new ones). Kept free of any I/O so it can
//! be exercised directly in tests.

use rand::Rng;

/// One gibibyte: the soft per-bucket size cap.
pub const THRESHOLD: u64 = 1 << 30;

/// Number of new buckets provisioned when every existing bucket is full.
pub const FANOUT: usize = 8;

/// Bounds the best-of/random retry loop; step 1's provisioning guarantees
/// a fitting bucket exists, so this only protects against a logic bug
/// turning into an infinite loop.
const MAX_ATTEMPTS: usize = 10_000;

/// Does `size` leave at least `min_free` bytes of headroom before
/// [`THRESHOLD`]? This is step 3's "cannot fit" predicate (spec.md
/// §4.2): `size >= THRESHOLD or THRESHOLD - size < min_free` means no.
fn fits(size: u64, min_free: u64) -> bool {
    size < THRESHOLD && THRESHOLD - size >= min_free
}

/// Step 1's "every bucket full" predicate (spec.md §4.2): `b.size >
/// THRESHOLD or THRESHOLD - b.size <= min_free`. Deliberately a
/// different boundary than [`fits`] — spec.md uses `<=` here and `<` in
/// step 3, so a bucket with exactly `min_free` bytes of headroom still
/// counts as full for the purposes of triggering provisioning, even
/// though step 3 would accept it as a placement target.
fn lacks_room(size: u64, min_free: u64) -> bool {
    size > THRESHOLD || THRESHOLD - size <= min_free
}

/// `true` once every bucket is too full to take `min_free` more bytes —
/// the trigger for provisioning a fresh [`FANOUT`] of buckets.
pub fn needs_more_buckets(sizes: &[u64], min_free: u64) -> bool {
    sizes.iter().all(|&size| lacks_room(size, min_free))
}

/// Picks the index of the bucket that should receive the next write.
///
/// `sizes` must already reflect any buckets provisioned by
/// [`needs_more_buckets`] — this function never grows the set itself,
/// it only chooses among what it's given. Draws a uniform `{0,1,2}`: a
/// 1-in-3 "best" bias toward the smallest bucket, otherwise a uniform
/// random pick, retried (bounded by [`MAX_ATTEMPTS`]) until the chosen
/// bucket can fit `min_free`.
pub fn choose(sizes: &[u64], min_free: u64) -> Option<usize> {
    if sizes.is_empty() {
        return None;
    }

    let mut rng = rand::thread_rng();

    for _ in 0..MAX_ATTEMPTS {
        let draw: u8 = rng.gen_range(0..3);

        let candidate = if draw == 1 {
            sizes
                .iter()
                .enumerate()
                .min_by_key(|(_, &size)| size)
                .map(|(idx, _)| idx)
                .expect("sizes is non-empty")
        } else {
            rng.gen_range(0..sizes.len())
        };

        if fits(sizes[candidate], min_free) {
            return Some(candidate);
        }
    }

    // Every bucket was full despite `needs_more_buckets` saying otherwise;
    // fall back to the least-full bucket rather than losing the write.
    sizes
        .iter()
        .enumerate()
        .min_by_key(|(_, &size)| size)
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bucket_fits_small_payload() {
        assert!(fits(0, 100));
    }

    #[test]
    fn full_bucket_never_fits() {
        assert!(!fits(THRESHOLD, 1));
        assert!(!fits(THRESHOLD - 5, 10));
    }

    #[test]
    fn needs_more_buckets_triggers_exactly_at_the_headroom_boundary() {
        // Headroom == min_free exactly: step 1's `<=` says this bucket
        // is full, even though `fits` (step 3's `<`) would still accept
        // it as a placement target.
        let size = THRESHOLD - 100;
        assert!(!fits(size, 101));
        assert!(fits(size, 100));
        assert!(needs_more_buckets(&[size], 100));
    }

    #[test]
    fn needs_more_buckets_when_all_full() {
        assert!(needs_more_buckets(&[THRESHOLD, THRESHOLD - 1], 100));
        assert!(!needs_more_buckets(&[THRESHOLD, 0], 100));
    }

    #[test]
    fn choose_prefers_buckets_with_room() {
        let sizes = vec![THRESHOLD - 10, 0];
        for _ in 0..200 {
            let idx = choose(&sizes, 100).unwrap();
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn choose_returns_none_for_empty_set() {
        assert_eq!(choose(&[], 10), None);
    }
}
