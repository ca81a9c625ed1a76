//! Chunk arrival bitmap.

/// One bit per chunk index (LSB of byte 0 = chunk 0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBitmap {
    bytes: Vec<u8>,
    total: usize,
    set: usize,
}

impl ChunkBitmap {
    /// Empty bitmap for `total` chunks.
    pub fn new(total: usize) -> Self {
        ChunkBitmap {
            bytes: vec![0u8; (total + 7) / 8],
            total,
            set: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Mark `index` as received. Returns false if it was already set or is out of range.
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.total || self.is_set(index) {
            return false;
        }
        self.bytes[index / 8] |= 1 << (index % 8);
        self.set += 1;
        true
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|&b| (b & (1 << (index % 8))) != 0)
            .unwrap_or(false)
    }

    /// Number of distinct indices marked so far.
    pub fn count(&self) -> usize {
        self.set
    }

    pub fn is_complete(&self) -> bool {
        self.set == self.total
    }

    /// Indices not yet received, ascending.
    pub fn missing(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total).filter(move |&i| !self.is_set(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_query() {
        let mut b = ChunkBitmap::new(10);
        assert!(!b.is_complete());
        assert!(b.set(0));
        assert!(b.set(3));
        assert!(b.set(9));
        assert!(b.is_set(0));
        assert!(!b.is_set(1));
        assert!(b.is_set(9));
        assert_eq!(b.count(), 3);
    }

    #[test]
    fn duplicates_and_out_of_range_ignored() {
        let mut b = ChunkBitmap::new(3);
        assert!(b.set(1));
        assert!(!b.set(1));
        assert!(!b.set(3));
        assert_eq!(b.count(), 1);
        assert_eq!(b.missing().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn complete_when_all_set() {
        let mut b = ChunkBitmap::new(9);
        for i in (0..9).rev() {
            b.set(i);
        }
        assert!(b.is_complete());
        assert_eq!(b.missing().count(), 0);
    }
}
