//! Consistent hash selection.
//!
//! # Ring
//! Every registered instance of the service name (healthy or not) owns
//! `replicas` points on a 64-bit ring. A request key hashes to a point and the
//! first point clockwise whose owner is a current candidate wins. Building the
//! ring from all members, not just candidates, keeps keys on their instance
//! while others flap in and out of the candidate set.
//!
//! The ring is rebuilt only when membership changes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::load_balancer::{instance::Candidate, SelectionRequest, Selector};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a followed by a splitmix64 finalizer for better spread of short keys.
pub fn ring_hash(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash = (hash ^ (hash >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    hash = (hash ^ (hash >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    hash ^ (hash >> 31)
}

/// Sorted ring of hash points.
#[derive(Debug, Default, Clone)]
pub struct HashRing {
    members: Vec<String>,
    points: BTreeMap<u64, String>,
}

impl HashRing {
    pub fn build(members: &[String], replicas: u32) -> Self {
        let mut points = BTreeMap::new();
        for member in members {
            for replica in 0..replicas.max(1) {
                let point = ring_hash(format!("{member}#{replica}").as_bytes());
                points.insert(point, member.clone());
            }
        }
        Self {
            members: members.to_vec(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Owners in clockwise order starting at `key`.
    pub fn walk(&self, key: u64) -> impl Iterator<Item = &str> {
        self.points
            .range(key..)
            .chain(self.points.range(..key))
            .map(|(_, owner)| owner.as_str())
    }
}

#[derive(Debug)]
pub struct ConsistentHash {
    replicas: u32,
    ring: RwLock<Arc<HashRing>>,
}

impl ConsistentHash {
    pub fn new(replicas: u32) -> Self {
        Self {
            replicas,
            ring: RwLock::new(Arc::new(HashRing::default())),
        }
    }

    fn ring_for(&self, members: &[String]) -> Arc<HashRing> {
        {
            let ring = self.ring.read().unwrap_or_else(|p| p.into_inner());
            if ring.members == members {
                return Arc::clone(&ring);
            }
        }
        let mut ring = self.ring.write().unwrap_or_else(|p| p.into_inner());
        if ring.members != members {
            *ring = Arc::new(HashRing::build(members, self.replicas));
            tracing::debug!(members = members.len(), points = ring.len(), "Hash ring rebuilt");
        }
        Arc::clone(&ring)
    }
}

impl Selector for ConsistentHash {
    fn select(&self, candidates: &[Candidate], request: &SelectionRequest<'_>) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let fallback: Vec<String>;
        let members = if request.members.is_empty() {
            fallback = candidates.iter().map(|c| c.service_id().to_string()).collect();
            &fallback[..]
        } else {
            request.members
        };

        let key = match request.client_id {
            Some(client) => ring_hash(client.as_bytes()),
            None => rand::random::<u64>(),
        };

        let positions: HashMap<&str, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.service_id(), i))
            .collect();

        let ring = self.ring_for(members);
        let picked = ring.walk(key).find_map(|owner| positions.get(owner).copied());
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::candidates;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ring_has_replica_points() {
        let ring = HashRing::build(&ids(&["a", "b"]), 50);
        assert_eq!(ring.len(), 100);
        assert_eq!(ring.walk(0).count(), 100);
    }

    #[test]
    fn test_same_client_same_instance() {
        let lb = ConsistentHash::new(100);
        let set = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
        let members = ids(&["a", "b", "c"]);
        let req = SelectionRequest {
            client_id: Some("client-42"),
            members: &members,
        };

        let first = lb.select(&set, &req).unwrap();
        for _ in 0..10 {
            assert_eq!(lb.select(&set, &req), Some(first));
        }
    }

    #[test]
    fn test_skips_non_candidates() {
        let lb = ConsistentHash::new(100);
        let all = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
        let members = ids(&["a", "b", "c"]);

        for client in ["x", "y", "z", "w", "v"] {
            let req = SelectionRequest {
                client_id: Some(client),
                members: &members,
            };
            let owner = all[lb.select(&all, &req).unwrap()].service_id().to_string();

            // Remove the owner from the candidates; the key moves but others stay put.
            let rest: Vec<Candidate> = all
                .iter()
                .filter(|c| c.service_id() != owner)
                .cloned()
                .collect();
            let moved = rest[lb.select(&rest, &req).unwrap()].service_id().to_string();
            assert_ne!(moved, owner);
        }
    }

    #[test]
    fn test_keys_spread_across_members() {
        let lb = ConsistentHash::new(100);
        let set = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
        let members = ids(&["a", "b", "c"]);
        let mut hits = [0usize; 3];
        for n in 0..300 {
            let client = format!("client-{n}");
            let req = SelectionRequest {
                client_id: Some(&client),
                members: &members,
            };
            hits[lb.select(&set, &req).unwrap()] += 1;
        }
        assert!(hits.iter().all(|h| *h > 30), "{hits:?}");
    }
}
