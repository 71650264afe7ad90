//! Size-tiered buffer pool.
//!
//! Buffers are grouped into capacity classes; `get` hands out the smallest
//! class that covers the hint and `put` returns a buffer to the largest
//! class it still covers. Each tier is bounded so the pool cannot hoard
//! memory.

use std::sync::Mutex;

/// Capacity classes, smallest first.
const TIER_SIZES: [usize; 6] = [64, 256, 1024, 4096, 16 * 1024, 64 * 1024];

/// Most buffers retained per tier.
const TIER_CAPACITY: usize = 8;

static TIERS: [Mutex<Vec<Vec<u8>>>; 6] = [const { Mutex::new(Vec::new()) }; 6];

/// Index of the smallest tier with capacity >= `hint`, if any.
fn tier_for_hint(hint: usize) -> Option<usize> {
    TIER_SIZES.iter().position(|&size| size >= hint)
}

/// Get a cleared buffer with capacity for at least `hint` bytes.
///
/// Hints past the largest class allocate an unpooled buffer.
pub fn get(hint: usize) -> Vec<u8> {
    let Some(tier) = tier_for_hint(hint) else {
        return Vec::with_capacity(hint);
    };
    let recycled = TIERS[tier]
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop();
    match recycled {
        Some(buf) => buf,
        None => Vec::with_capacity(TIER_SIZES[tier]),
    }
}

/// Return a buffer to the pool.
///
/// The buffer is cleared first. Buffers smaller than the smallest class or
/// arriving at a full tier are simply dropped.
pub fn put(mut buf: Vec<u8>) {
    let capacity = buf.capacity();
    let Some(tier) = TIER_SIZES.iter().rposition(|&size| capacity >= size) else {
        return;
    };
    buf.clear();
    let mut tier = TIERS[tier]
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if tier.len() < TIER_CAPACITY {
        tier.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_rounds_up_to_tier() {
        let buf = get(100);
        assert!(buf.capacity() >= 256);
        assert!(buf.is_empty());
        put(buf);
    }

    #[test]
    fn test_large_hint_unpooled() {
        let buf = get(1024 * 1024);
        assert!(buf.capacity() >= 1024 * 1024);
    }

    #[test]
    fn test_put_clears() {
        let mut buf = get(64);
        buf.extend_from_slice(b"leftovers");
        let capacity = buf.capacity();
        put(buf);
        // The next get from the same tier hands back an empty buffer.
        let again = get(capacity.min(64 * 1024));
        assert!(again.is_empty());
    }
}
