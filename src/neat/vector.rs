use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

#[derive(Copy, Clone)]
pub enum AlignedPair<'a, V> {
    HasBoth(&'a V, &'a V),
    HasLeft(&'a V),
    HasRight(&'a V),
}

/// Walks two maps whose keys are sorted ascending, pairing up entries with equal keys.
pub fn align_sorted<'a, K, V, M>(m1: &'a FxIndexMap<K, V>, m2: &'a FxIndexMap<K, V>, mut map: M)
where
    K: Ord,
    M: FnMut(&'a K, AlignedPair<'a, V>),
{
    let mut left = m1.iter().peekable();
    let mut right = m2.iter().peekable();

    loop {
        match (left.peek(), right.peek()) {
            (Some(&(k1, v1)), Some(&(k2, v2))) => {
                if k1 == k2 {
                    map(k1, AlignedPair::HasBoth(v1, v2));
                    left.next();
                    right.next();
                } else if k1 < k2 {
                    map(k1, AlignedPair::HasLeft(v1));
                    left.next();
                } else {
                    map(k2, AlignedPair::HasRight(v2));
                    right.next();
                }
            }
            (Some(&(k1, v1)), None) => {
                //finished with m2
                map(k1, AlignedPair::HasLeft(v1));
                left.next();
            }
            (None, Some(&(k2, v2))) => {
                //finished with m1
                map(k2, AlignedPair::HasRight(v2));
                right.next();
            }
            (None, None) => break,
        }
    }
}
