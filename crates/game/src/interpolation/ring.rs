/// Fixed-capacity circular queue. Pushing into a full ring evicts the oldest item.
#[derive(Debug, Clone)]
pub struct SnapshotRing<T, const N: usize> {
    items: [T; N],
    start: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> Default for SnapshotRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> SnapshotRing<T, N> {
    pub fn new() -> Self {
        const {
            assert!(N != 0, "ring capacity must not be zero");
        }

        Self {
            items: [T::default(); N],
            start: 0,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, item: T) {
        if self.len == N {
            self.start = (self.start + 1) % N;
            self.len -= 1;
        }
        self.items[(self.start + self.len) % N] = item;
        self.len += 1;
    }

    /// Item `offset` places after the oldest one.
    pub fn peek(&self, offset: usize) -> Option<&T> {
        (offset < self.len).then(|| &self.items[(self.start + offset) % N])
    }

    /// Drops up to `n` of the oldest items, returning how many went.
    pub fn advance(&mut self, n: usize) -> usize {
        let n = n.min(self.len);
        self.start = (self.start + n) % N;
        self.len -= n;
        n
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_peek_advance() {
        let mut ring = SnapshotRing::<u32, 4>::new();
        for i in 1..=3 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.peek(0), Some(&1));
        assert_eq!(ring.peek(2), Some(&3));
        assert_eq!(ring.peek(3), None);

        assert_eq!(ring.advance(2), 2);
        assert_eq!(ring.peek(0), Some(&3));
        assert_eq!(ring.advance(5), 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_evicts_oldest_and_wraps() {
        let mut ring = SnapshotRing::<u32, 3>::new();
        for i in 0..10 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        let items: Vec<u32> = (0..3).map(|i| *ring.peek(i).unwrap()).collect();
        assert_eq!(items, vec![7, 8, 9]);
    }
}
