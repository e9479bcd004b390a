//! Consistent hash ring assigning block digests to block-store shards.
//!
//! Each shard is placed on the ring at the digest of its identifier. A
//! block belongs to the shard whose point is the smallest point greater
//! than or equal to the block's digest, wrapping around to the first point.
//! Adding or removing a shard only moves the digests on the arc next to its
//! point.

use crate::hash::{hash_bytes, Digest};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Consistent hashing ring over an explicit shard membership list
#[derive(Debug, Clone)]
pub struct Ring {
    /// Ring position -> shard id
    points: BTreeMap<Digest, String>,
    /// Shard id -> number of points it owns
    members: HashMap<String, u16>,
    /// Points per shard (1 places each shard at the digest of its id)
    vnodes: u16,
}

impl Ring {
    /// Build a ring with one point per shard
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_vnodes(members, 1)
    }

    /// Build a ring with `vnodes` points per shard
    pub fn with_vnodes<I, S>(members: I, vnodes: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self {
            points: BTreeMap::new(),
            members: HashMap::new(),
            vnodes: vnodes.max(1),
        };
        for member in members {
            ring.add_shard(member);
        }
        ring
    }

    /// Build `count` shards named `<prefix><i>`, leaving out the ones in `down`
    pub fn with_naming(count: usize, down: &[usize], prefix: &str) -> Self {
        let mut ring = Self::new((0..count).map(|i| format!("{prefix}{i}")));
        for i in down {
            ring.remove_shard(&format!("{prefix}{i}"));
        }
        ring
    }

    /// Add a shard; re-adding an existing shard is a no-op
    pub fn add_shard(&mut self, shard: impl Into<String>) {
        let shard = shard.into();
        if self.members.contains_key(&shard) {
            return;
        }
        for i in 0..self.vnodes {
            self.points.insert(point_for(&shard, i), shard.clone());
        }
        debug!(shard = %shard, vnodes = self.vnodes, "added shard to ring");
        self.members.insert(shard, self.vnodes);
    }

    /// Remove a shard and all of its points
    pub fn remove_shard(&mut self, shard: &str) {
        if let Some(vnodes) = self.members.remove(shard) {
            for i in 0..vnodes {
                let pos = point_for(shard, i);
                if self.points.get(&pos).map(String::as_str) == Some(shard) {
                    self.points.remove(&pos);
                }
            }
            debug!(shard = %shard, "removed shard from ring");
        }
    }

    /// Shard responsible for `digest`, or `None` when the ring is empty
    pub fn responsible_shard(&self, digest: &Digest) -> Option<&str> {
        self.points
            .range(*digest..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, shard)| shard.as_str())
    }

    /// Group digests by responsible shard, keeping input order within a shard
    pub fn assignments(&self, digests: &[Digest]) -> BTreeMap<String, Vec<Digest>> {
        let mut out: BTreeMap<String, Vec<Digest>> = BTreeMap::new();
        for digest in digests {
            if let Some(shard) = self.responsible_shard(digest) {
                out.entry(shard.to_string()).or_default().push(*digest);
            }
        }
        out
    }

    /// Number of digests whose owner differs between two rings
    pub fn moved(old: &Ring, new: &Ring, digests: &[Digest]) -> usize {
        digests
            .iter()
            .filter(|d| old.responsible_shard(d) != new.responsible_shard(d))
            .count()
    }

    /// Shard ids, sorted
    pub fn shards(&self) -> Vec<String> {
        let mut shards: Vec<String> = self.members.keys().cloned().collect();
        shards.sort();
        shards
    }

    pub fn contains(&self, shard: &str) -> bool {
        self.members.contains_key(shard)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Ring position of a shard's i-th point
fn point_for(shard: &str, index: u16) -> Digest {
    if index == 0 {
        hash_bytes(shard.as_bytes())
    } else {
        hash_bytes(format!("{shard}#{index}").as_bytes())
    }
}
