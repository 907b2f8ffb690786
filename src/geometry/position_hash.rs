//! Fixed-precision spatial hashing for coincident-point lookups.
//!
//! Coordinates are normalized per axis, scaled by `1e12` and rounded to an
//! integer triple. Two points within the fuzzy tolerance can straddle a bin
//! boundary, so every lookup also probes the 26 neighbouring bins and matches
//! candidates with fuzzy equality.

use super::{BoundingBox, Point, fuzzy_equal_points};
use hashbrown::HashMap;

const PRECISION: f64 = 1e12;

/// Integer bin of a hashed position.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct PositionKey(pub [i64; 3]);

impl PositionKey {
    fn offset(&self, d: [i64; 3]) -> Self {
        PositionKey([self.0[0] + d[0], self.0[1] + d[1], self.0[2] + d[2]])
    }
}

/// Maps points to [`PositionKey`]s.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionHasher {
    scale: [f64; 3],
}

impl Default for PositionHasher {
    fn default() -> Self {
        Self { scale: [1.0; 3] }
    }
}

impl PositionHasher {
    /// Scales below one are clamped so a bin is never narrower than the
    /// fuzzy tolerance.
    pub fn new(scale: [f64; 3]) -> Self {
        let clamp = |s: f64| if s.is_finite() && s > 1.0 { s } else { 1.0 };
        Self {
            scale: [clamp(scale[0]), clamp(scale[1]), clamp(scale[2])],
        }
    }

    /// Hasher normalized by the largest absolute coordinate of `bbox`.
    pub fn for_box(bbox: &BoundingBox) -> Self {
        if !bbox.is_valid() {
            return Self::default();
        }
        let mut scale = [1.0; 3];
        for (i, s) in scale.iter_mut().enumerate() {
            *s = bbox.min[i].abs().max(bbox.max[i].abs());
        }
        Self::new(scale)
    }

    pub fn key(&self, p: &Point) -> PositionKey {
        let mut k = [0i64; 3];
        for i in 0..3 {
            k[i] = (p[i] / self.scale[i] * PRECISION).round() as i64;
        }
        PositionKey(k)
    }
}

/// Hash map keyed by position, tolerant to round-off at bin boundaries.
#[derive(Clone, Debug)]
pub struct PositionMap<V> {
    hasher: PositionHasher,
    bins: HashMap<PositionKey, Vec<(Point, V)>>,
    len: usize,
}

impl<V> PositionMap<V> {
    pub fn new(hasher: PositionHasher) -> Self {
        Self {
            hasher,
            bins: HashMap::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, p: &Point) -> Option<(PositionKey, usize)> {
        let center = self.hasher.key(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = center.offset([dx, dy, dz]);
                    if let Some(bin) = self.bins.get(&key) {
                        if let Some(i) = bin.iter().position(|(q, _)| fuzzy_equal_points(p, q)) {
                            return Some((key, i));
                        }
                    }
                }
            }
        }
        None
    }

    pub fn get(&self, p: &Point) -> Option<&V> {
        let (key, i) = self.find(p)?;
        self.bins.get(&key).map(|bin| &bin[i].1)
    }

    pub fn get_mut(&mut self, p: &Point) -> Option<&mut V> {
        let (key, i) = self.find(p)?;
        self.bins.get_mut(&key).map(|bin| &mut bin[i].1)
    }

    pub fn contains(&self, p: &Point) -> bool {
        self.find(p).is_some()
    }

    /// Insert unless a fuzzy-equal point is already present. Returns `true`
    /// when the point was new.
    pub fn insert(&mut self, p: Point, value: V) -> bool {
        if self.find(&p).is_some() {
            return false;
        }
        self.bins
            .entry(self.hasher.key(&p))
            .or_default()
            .push((p, value));
        self.len += 1;
        true
    }

    /// Existing entry for `p`, or a fresh one built by `make`.
    pub fn get_or_insert_with(&mut self, p: Point, make: impl FnOnce() -> V) -> &mut V {
        match self.find(&p) {
            Some((key, i)) => &mut self.bins.entry(key).or_default()[i].1,
            None => {
                let bin = self.bins.entry(self.hasher.key(&p)).or_default();
                bin.push((p, make()));
                self.len += 1;
                let last = bin.len() - 1;
                &mut bin[last].1
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point, &V)> {
        self.bins.values().flatten().map(|(p, v)| (p, v))
    }
}
