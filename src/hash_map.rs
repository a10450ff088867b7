//! Frame Hash Map.
//!
//! Shared read-write across Part Workers; each worker only inserts keys in
//! its own part range so concurrent insertions are always disjoint. A coarse
//! lock is acceptable here — capture already dominates cost.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

pub type Digest32 = [u8; 32];

#[derive(Default)]
pub struct FrameHashMap {
    inner: Mutex<BTreeMap<u64, Digest32>>,
}

impl FrameHashMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digest(bytes: &[u8]) -> Digest32 {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finalize().into()
    }

    pub fn insert(&self, frame_index: u64, bytes: &[u8]) {
        let digest = Self::digest(bytes);
        self.inner.lock().insert(frame_index, digest);
    }

    /// Scan for the first pair of consecutive frames sharing a digest.
    /// Returns `Some((i, i+1))` on the first duplicate found, in ascending
    /// frame order.
    pub fn first_duplicate_pair(&self) -> Option<(u64, u64)> {
        let map = self.inner.lock();
        let mut prev: Option<(&u64, &Digest32)> = None;
        for (frame, digest) in map.iter() {
            if let Some((prev_frame, prev_digest)) = prev {
                if prev_digest == digest && *frame == prev_frame + 1 {
                    return Some((*prev_frame, *frame));
                }
            }
            prev = Some((frame, digest));
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_duplicates_when_all_frames_distinct() {
        let map = FrameHashMap::new();
        for i in 0..10u64 {
            map.insert(i, format!("frame-{i}").as_bytes());
        }
        assert_eq!(map.first_duplicate_pair(), None);
    }

    #[test]
    fn detects_consecutive_duplicate_pair() {
        let map = FrameHashMap::new();
        for i in 0..5u64 {
            map.insert(i, format!("frame-{i}").as_bytes());
        }
        // frames 5 and 6 render identical pixels
        map.insert(5, b"identical pixels");
        map.insert(6, b"identical pixels");
        map.insert(7, b"frame-7");

        assert_eq!(map.first_duplicate_pair(), Some((5, 6)));
    }

    #[test]
    fn non_consecutive_repeats_do_not_count() {
        let map = FrameHashMap::new();
        map.insert(0, b"same");
        map.insert(1, b"different");
        map.insert(2, b"same");
        assert_eq!(map.first_duplicate_pair(), None);
    }

    #[test]
    fn concurrent_disjoint_inserts_from_multiple_workers() {
        use std::sync::Arc;
        use std::thread;

        let map = Arc::new(FrameHashMap::new());
        let mut handles = Vec::new();
        for worker in 0..4u64 {
            let map = map.clone();
            handles.push(thread::spawn(move || {
                for i in 0..25u64 {
                    let frame = worker * 25 + i;
                    map.insert(frame, format!("w{worker}-f{i}").as_bytes());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(map.len(), 100);
    }
}
