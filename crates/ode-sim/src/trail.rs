//! Ring-buffered trajectory cache ("shadow"/"tail") for motion trails.

use crate::error::{SimError, SimResult};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::vec_deque;
use std::collections::VecDeque;

/// Eviction policy. Exactly one policy is active per cache.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Eviction {
    /// Keep entries inside a trailing time window (seconds of simulated
    /// time, measured back from the most recent entry).
    Window(f64),
    /// Keep at most this many entries.
    Capacity(usize),
}

/// One cached trajectory sample.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailEntry {
    pub t: f64,
    pub state: DVector<f64>,
}

/// Fixed-policy trajectory cache.
///
/// `push` stores a defensive copy of the state: the cache must never alias
/// the live mutable state vector, or every trail point would silently follow
/// later mutations. Entries are evicted lazily on push; time tags are
/// enforced non-decreasing.
#[derive(Debug, Clone)]
pub struct TrailCache {
    policy: Eviction,
    entries: VecDeque<TrailEntry>,
}

impl TrailCache {
    pub fn new(policy: Eviction) -> SimResult<Self> {
        match policy {
            Eviction::Window(d) if !(d > 0.0 && d.is_finite()) => {
                return Err(SimError::InvalidArg {
                    what: "trail window must be positive and finite",
                });
            }
            Eviction::Capacity(0) => {
                return Err(SimError::InvalidArg {
                    what: "trail capacity must be positive",
                });
            }
            _ => {}
        }
        Ok(Self {
            policy,
            entries: VecDeque::new(),
        })
    }

    pub fn policy(&self) -> Eviction {
        self.policy
    }

    /// Append a copy of `state` tagged with `t`. Amortized O(1); evicts
    /// whatever the policy says is stale.
    pub fn push(&mut self, t: f64, state: &DVector<f64>) -> SimResult<()> {
        if let Some(latest) = self.latest() {
            if t < latest {
                return Err(SimError::OutOfOrder { t, latest });
            }
        }
        self.entries.push_back(TrailEntry {
            t,
            state: state.clone(),
        });
        match self.policy {
            Eviction::Capacity(n) => {
                while self.entries.len() > n {
                    self.entries.pop_front();
                }
            }
            Eviction::Window(d) => {
                let cutoff = t - d;
                while self
                    .entries
                    .front()
                    .map(|e| e.t < cutoff)
                    .unwrap_or(false)
                {
                    self.entries.pop_front();
                }
            }
        }
        Ok(())
    }

    /// Time tag of the most recent entry.
    pub fn latest(&self) -> Option<f64> {
        self.entries.back().map(|e| e.t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All cached entries inside the active window, oldest first. The view
    /// is lazy and restartable (clone it to iterate again); no states are
    /// copied.
    pub fn window(&self) -> Window<'_> {
        let start = match self.policy {
            Eviction::Capacity(_) => 0,
            Eviction::Window(d) => match self.latest() {
                Some(latest) => {
                    let cutoff = latest - d;
                    self.entries.partition_point(|e| e.t < cutoff)
                }
                None => 0,
            },
        };
        Window {
            iter: self.entries.range(start..),
        }
    }
}

/// Lazy iterator over the current trail window, in increasing time order.
#[derive(Clone)]
pub struct Window<'a> {
    iter: vec_deque::Iter<'a, TrailEntry>,
}

impl<'a> Iterator for Window<'a> {
    type Item = &'a TrailEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for Window<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use proptest::prelude::*;

    fn push_seq(cache: &mut TrailCache, times: &[f64]) {
        for &t in times {
            cache.push(t, &dvector![t, -t]).unwrap();
        }
    }

    #[test]
    fn capacity_policy_bounds_length() {
        let mut cache = TrailCache::new(Eviction::Capacity(3)).unwrap();
        push_seq(&mut cache, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(cache.len(), 3);
        let times: Vec<f64> = cache.window().map(|e| e.t).collect();
        assert_eq!(times, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn window_policy_drops_stale_entries() {
        let mut cache = TrailCache::new(Eviction::Window(0.25)).unwrap();
        push_seq(&mut cache, &[0.0, 0.1, 0.2, 0.3, 0.4]);
        let times: Vec<f64> = cache.window().map(|e| e.t).collect();
        assert_eq!(times, vec![0.2, 0.3, 0.4]);
        assert_eq!(cache.latest(), Some(0.4));
    }

    #[test]
    fn push_copies_state() {
        let mut cache = TrailCache::new(Eviction::Capacity(8)).unwrap();
        let mut live = dvector![1.0, 2.0];
        cache.push(0.0, &live).unwrap();
        live[0] = 99.0;
        let first = cache.window().next().unwrap();
        assert_eq!(first.state, dvector![1.0, 2.0]);
    }

    #[test]
    fn out_of_order_push_is_rejected() {
        let mut cache = TrailCache::new(Eviction::Capacity(8)).unwrap();
        cache.push(1.0, &dvector![0.0]).unwrap();
        let err = cache.push(0.5, &dvector![0.0]).unwrap_err();
        assert!(matches!(err, SimError::OutOfOrder { .. }));
        // Equal tags are allowed (non-decreasing).
        cache.push(1.0, &dvector![1.0]).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn window_is_restartable() {
        let mut cache = TrailCache::new(Eviction::Capacity(4)).unwrap();
        push_seq(&mut cache, &[0.0, 0.1, 0.2]);
        let window = cache.window();
        assert_eq!(window.clone().count(), 3);
        assert_eq!(window.count(), 3);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(TrailCache::new(Eviction::Capacity(0)).is_err());
        assert!(TrailCache::new(Eviction::Window(0.0)).is_err());
        assert!(TrailCache::new(Eviction::Window(f64::NAN)).is_err());
    }

    proptest! {
        /// Capacity is never exceeded and the window stays time-sorted, for
        /// any number of pushes at any non-decreasing times.
        #[test]
        fn capacity_never_exceeded(
            cap in 1usize..16,
            dts in proptest::collection::vec(0.0f64..0.5, 0..64),
        ) {
            let mut cache = TrailCache::new(Eviction::Capacity(cap)).unwrap();
            let mut t = 0.0;
            for dt in dts {
                t += dt;
                cache.push(t, &dvector![t]).unwrap();
                prop_assert!(cache.len() <= cap);
                let times: Vec<f64> = cache.window().map(|e| e.t).collect();
                prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
            }
        }

        /// Every windowed entry lies inside [latest - d, latest].
        #[test]
        fn window_entries_lie_in_range(
            d in 0.05f64..2.0,
            dts in proptest::collection::vec(0.0f64..0.5, 1..64),
        ) {
            let mut cache = TrailCache::new(Eviction::Window(d)).unwrap();
            let mut t = 0.0;
            for dt in dts {
                t += dt;
                cache.push(t, &dvector![t]).unwrap();
            }
            let latest = cache.latest().unwrap();
            for entry in cache.window() {
                prop_assert!(entry.t >= latest - d - 1e-12);
                prop_assert!(entry.t <= latest);
            }
        }
    }
}
