/// Packed occupancy bits, one per slot.
#[derive(Debug, Clone)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {index} out of range ({})", self.len);
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("all {0} slots are in use")]
    Exhausted(usize),
    #[error("slot {0} is not live")]
    NotLive(usize),
}

/// Fixed-capacity index pool.
///
/// Freed indices are reused most-recent-first before the high watermark is
/// extended. Freeing the topmost allocated index lowers the watermark instead,
/// so LIFO-shaped churn never grows the pool.
#[derive(Debug, Clone)]
pub struct SlotAllocator<const N: usize> {
    occupancy: BitVector,
    free_stack: Vec<usize>,
    high_watermark: usize,
}

impl<const N: usize> Default for SlotAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SlotAllocator<N> {
    pub fn new() -> Self {
        Self {
            occupancy: BitVector::new(N),
            free_stack: Vec::with_capacity(N),
            high_watermark: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn allocate(&mut self) -> Result<usize, SlotError> {
        let index = if let Some(index) = self.free_stack.pop() {
            index
        } else if self.high_watermark < N {
            self.high_watermark += 1;
            self.high_watermark - 1
        } else {
            return Err(SlotError::Exhausted(N));
        };

        self.occupancy.set(index, true);
        Ok(index)
    }

    pub fn free(&mut self, index: usize) -> Result<(), SlotError> {
        if !self.is_live(index) {
            return Err(SlotError::NotLive(index));
        }

        self.occupancy.set(index, false);
        if index + 1 == self.high_watermark {
            self.high_watermark -= 1;
        } else {
            self.free_stack.push(index);
        }
        Ok(())
    }

    #[inline]
    pub fn is_live(&self, index: usize) -> bool {
        self.occupancy.get(index)
    }

    pub fn live_count(&self) -> usize {
        self.occupancy.count_ones()
    }

    pub fn high_watermark(&self) -> usize {
        self.high_watermark
    }

    /// Live indices in ascending order.
    pub fn iter_live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.high_watermark).filter(|&i| self.occupancy.get(i))
    }

    pub fn clear(&mut self) {
        self.occupancy.clear();
        self.free_stack.clear();
        self.high_watermark = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn bit_vector_set_and_clear() {
        let mut bits = BitVector::new(130);
        bits.set(0, true);
        bits.set(64, true);
        bits.set(129, true);
        assert!(bits.get(0) && bits.get(64) && bits.get(129));
        assert!(!bits.get(1));
        assert!(!bits.get(500));
        assert_eq!(bits.count_ones(), 3);

        bits.set(64, false);
        assert!(!bits.get(64));
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    fn allocates_sequentially_then_exhausts() {
        let mut slots = SlotAllocator::<4>::new();
        for expected in 0..4 {
            assert_eq!(slots.allocate(), Ok(expected));
        }
        assert_eq!(slots.allocate(), Err(SlotError::Exhausted(4)));
        assert_eq!(slots.live_count(), 4);
    }

    #[test]
    fn reuses_freed_indices_in_lifo_order() {
        let mut slots = SlotAllocator::<8>::new();
        for _ in 0..6 {
            slots.allocate().unwrap();
        }

        slots.free(1).unwrap();
        slots.free(3).unwrap();
        slots.free(2).unwrap();

        assert_eq!(slots.allocate(), Ok(2));
        assert_eq!(slots.allocate(), Ok(3));
        assert_eq!(slots.allocate(), Ok(1));
        assert_eq!(slots.allocate(), Ok(6));
    }

    #[test]
    fn freeing_top_index_lowers_watermark() {
        let mut slots = SlotAllocator::<8>::new();
        for _ in 0..3 {
            slots.allocate().unwrap();
        }
        assert_eq!(slots.high_watermark(), 3);

        slots.free(2).unwrap();
        assert_eq!(slots.high_watermark(), 2);
        assert_eq!(slots.allocate(), Ok(2));
        assert_eq!(slots.high_watermark(), 3);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut slots = SlotAllocator::<4>::new();
        let a = slots.allocate().unwrap();
        slots.allocate().unwrap();
        slots.free(a).unwrap();
        assert_eq!(slots.free(a), Err(SlotError::NotLive(a)));
        assert_eq!(slots.free(3), Err(SlotError::NotLive(3)));

        assert_eq!(slots.allocate(), Ok(a));
        assert_eq!(slots.allocate(), Ok(2));
    }

    #[test]
    fn random_churn_never_hands_out_live_index() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut slots = SlotAllocator::<16>::new();
        let mut live = HashSet::new();

        for _ in 0..5_000 {
            if live.is_empty() || rng.gen_bool(0.55) {
                match slots.allocate() {
                    Ok(index) => assert!(live.insert(index), "index {index} handed out twice"),
                    Err(SlotError::Exhausted(_)) => assert_eq!(live.len(), 16),
                    Err(e) => panic!("unexpected {e}"),
                }
            } else {
                let victim = *live.iter().nth(rng.gen_range(0..live.len())).unwrap();
                slots.free(victim).unwrap();
                live.remove(&victim);
            }

            assert_eq!(slots.live_count(), live.len());
            assert!(slots.high_watermark() <= 16);
            let listed: HashSet<usize> = slots.iter_live().collect();
            assert_eq!(listed, live);
        }
    }
}
