//! Var sets and their pools.
//!
//! A [`VarVec`] is a bitmap over var ids. Optimizer passes allocate and drop
//! these constantly, so the Command keeps free-lists of released sets and
//! enumerators. Checkout hands out an owned value; release takes it back by
//! move, so a released handle cannot be touched again by the caller.
//!
//! Pooling can be switched off per Command (`CommandConfig`); released values
//! are then simply dropped.

use roaring::RoaringBitmap;

use crate::var::Var;

/// A set of vars. New sets come only from a [`Command`](crate::Command)'s
/// pool; a clone is an unpooled copy.
///
/// ```compile_fail
/// let set: querytree_ir::VarVec = Default::default();
/// ```
///
/// ```compile_fail
/// let set: querytree_ir::VarVec = std::iter::empty::<querytree_ir::Var>().collect();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VarVec {
    bits: RoaringBitmap,
}

impl VarVec {
    /// Unpooled empty set. IR construction code should use
    /// `Command::create_var_vec` instead.
    pub(crate) fn new() -> Self {
        Self {
            bits: RoaringBitmap::new(),
        }
    }

    /// Unpooled set of `vars`.
    pub(crate) fn from_vars(vars: impl IntoIterator<Item = Var>) -> Self {
        let mut vec = Self::new();
        vec.extend(vars);
        vec
    }

    pub fn set(&mut self, var: Var) {
        self.bits.insert(var.id());
    }

    pub fn clear(&mut self, var: Var) {
        self.bits.remove(var.id());
    }

    pub fn is_set(&self, var: Var) -> bool {
        self.bits.contains(var.id())
    }

    pub fn clear_all(&mut self) {
        self.bits.clear();
    }

    pub fn count(&self) -> usize {
        self.bits.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Lowest var in the set.
    pub fn first(&self) -> Option<Var> {
        self.bits.min().map(Var::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = Var> + '_ {
        self.bits.iter().map(Var::new)
    }

    pub fn or(&mut self, other: &VarVec) {
        self.bits |= &other.bits;
    }

    pub fn and(&mut self, other: &VarVec) {
        self.bits &= &other.bits;
    }

    pub fn minus(&mut self, other: &VarVec) {
        self.bits -= &other.bits;
    }

    /// `self ⊇ other`.
    pub fn subsumes(&self, other: &VarVec) -> bool {
        other.bits.is_subset(&self.bits)
    }

    pub fn overlaps(&self, other: &VarVec) -> bool {
        !self.bits.is_disjoint(&other.bits)
    }

    pub fn init_from(&mut self, other: &VarVec) {
        self.bits.clone_from(&other.bits);
    }

    pub fn init_from_vars(&mut self, vars: impl IntoIterator<Item = Var>) {
        self.bits.clear();
        self.extend(vars);
    }
}

impl Extend<Var> for VarVec {
    fn extend<I: IntoIterator<Item = Var>>(&mut self, iter: I) {
        for var in iter {
            self.set(var);
        }
    }
}

impl std::fmt::Display for VarVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, var) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{var}")?;
        }
        write!(f, "}}")
    }
}

/// Iteration state over a snapshot of a [`VarVec`].
#[derive(Debug)]
pub struct VarVecEnumerator {
    ids: Vec<u32>,
    position: usize,
}

impl VarVecEnumerator {
    pub(crate) fn new() -> Self {
        Self {
            ids: Vec::new(),
            position: 0,
        }
    }

    pub(crate) fn init(&mut self, vec: &VarVec) {
        self.ids.clear();
        self.ids.extend(vec.bits.iter());
        self.position = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.ids.clear();
        self.position = 0;
    }

    pub fn remaining(&self) -> usize {
        self.ids.len() - self.position
    }
}

impl Iterator for VarVecEnumerator {
    type Item = Var;

    fn next(&mut self) -> Option<Var> {
        let id = *self.ids.get(self.position)?;
        self.position += 1;
        Some(Var::new(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for VarVecEnumerator {}

// ============================================================================
// Pools
// ============================================================================

/// Counters for one pool (diagnostics only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub checkouts: u64,
    pub reuses: u64,
    pub releases: u64,
    pub discarded: u64,
}

pub(crate) trait Recycle {
    /// A new value for a checkout from an empty free list.
    fn fresh() -> Self;

    /// Wipe all state left by the previous owner.
    fn recycle(&mut self);
}

impl Recycle for VarVec {
    fn fresh() -> Self {
        Self::new()
    }

    fn recycle(&mut self) {
        self.clear_all();
    }
}

impl Recycle for VarVecEnumerator {
    fn fresh() -> Self {
        Self::new()
    }

    fn recycle(&mut self) {
        self.reset();
    }
}

#[derive(Debug)]
pub(crate) struct Pool<T> {
    free: Vec<T>,
    enabled: bool,
    capacity: usize,
    stats: PoolStats,
}

impl<T: Recycle> Pool<T> {
    pub(crate) fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            enabled,
            capacity,
            stats: PoolStats::default(),
        }
    }

    pub(crate) fn checkout(&mut self) -> T {
        self.stats.checkouts += 1;
        match self.free.pop() {
            Some(item) => {
                self.stats.reuses += 1;
                item
            }
            None => T::fresh(),
        }
    }

    pub(crate) fn release(&mut self, mut item: T) {
        self.stats.releases += 1;
        if !self.enabled || self.free.len() >= self.capacity {
            self.stats.discarded += 1;
            return;
        }
        // Cleared on the way in so a checkout can never observe old bits.
        item.recycle();
        self.free.push(item);
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(ids: &[u32]) -> VarVec {
        VarVec::from_vars(ids.iter().map(|&id| Var::new(id)))
    }

    #[test]
    fn set_algebra() {
        let mut a = vars(&[1, 2, 3]);
        let b = vars(&[2, 3]);
        assert!(a.subsumes(&b));
        assert!(!b.subsumes(&a));
        assert!(a.overlaps(&b));

        a.minus(&b);
        assert_eq!(a, vars(&[1]));
        assert!(!a.overlaps(&b));

        a.or(&b);
        assert_eq!(a.count(), 3);
        a.and(&vars(&[3, 9]));
        assert_eq!(a.first(), Some(Var::new(3)));
    }

    #[test]
    fn enumerator_walks_snapshot() {
        let vec = vars(&[7, 3, 5]);
        let mut e = VarVecEnumerator::new();
        e.init(&vec);
        assert_eq!(e.len(), 3);
        let seen: Vec<u32> = e.map(Var::id).collect();
        assert_eq!(seen, vec![3, 5, 7]);
    }

    #[test]
    fn released_vec_comes_back_empty() {
        let mut pool: Pool<VarVec> = Pool::new(true, 4);
        let mut v = pool.checkout();
        v.set(Var::new(42));
        pool.release(v);

        let reused = pool.checkout();
        assert!(reused.is_empty());
        assert_eq!(pool.stats().reuses, 1);
    }

    #[test]
    fn disabled_pool_never_reuses() {
        let mut pool: Pool<VarVec> = Pool::new(false, 4);
        let v = pool.checkout();
        pool.release(v);
        let _ = pool.checkout();
        let stats = pool.stats();
        assert_eq!(stats.reuses, 0);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn empty_pool_hands_out_fresh_values() {
        let mut pool: Pool<VarVecEnumerator> = Pool::new(true, 4);
        let mut e = pool.checkout();
        assert_eq!(e.next(), None);
        assert_eq!(pool.stats().checkouts, 1);
        assert_eq!(pool.stats().reuses, 0);
    }

    #[test]
    fn capacity_caps_free_list() {
        let mut pool: Pool<VarVec> = Pool::new(true, 1);
        let a = pool.checkout();
        let b = pool.checkout();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.stats().discarded, 1);
    }
}
