use crate::board::{Point, BOARD_AREA};

/// Number of u64 words needed to hold one bit per intersection.
pub const POINT_WORDS: usize = BOARD_AREA.div_ceil(64);

/// One bit per intersection, indexed by [`Point::index`].
pub type PointSet = Bitset<POINT_WORDS>;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bitset<const N: usize>([u64; N]);

impl<const N: usize> Bitset<N> {
    #[inline(always)]
    pub fn set(&mut self, idx: usize) {
        self.0[idx / 64] |= 1u64 << (idx % 64);
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> bool {
        (self.0[idx / 64] & (1u64 << (idx % 64))) != 0
    }

    /// Sets the bit and reports whether it was previously clear.
    #[inline(always)]
    pub fn insert(&mut self, idx: usize) -> bool {
        let fresh = !self.get(idx);
        self.set(idx);
        fresh
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl PointSet {
    #[inline(always)]
    pub fn add(&mut self, point: Point) -> bool {
        self.insert(point.index())
    }
}

impl<const N: usize> Default for Bitset<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_intersection() {
        let mut set = PointSet::default();
        for idx in 0..BOARD_AREA {
            assert!(set.insert(idx));
        }
        assert_eq!(set.count(), BOARD_AREA);
        assert!(!set.insert(BOARD_AREA - 1));
    }

    #[test]
    fn word_boundaries_are_independent() {
        let mut set = PointSet::default();
        assert!(set.add(Point::from_index(64)));
        assert!(!set.get(63));
        assert!(set.get(64));
        assert!(!set.add(Point::from_index(64)));
        assert_eq!(set.count(), 1);
    }
}
