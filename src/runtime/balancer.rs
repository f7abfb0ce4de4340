//! Weighted worker selection
//!
//! Every worker has a running sum of the weights of the tasks sent to it.
//! A task goes to a random worker whose sum is at most 80% of the mean; when
//! none qualifies, to a random worker at or below the upper median.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fraction of the mean load below which a worker is preferred.
pub const UNDERLOADED_RATIO: f64 = 0.8;

#[derive(Debug)]
pub struct LoadBalancer {
    loads: Box<[AtomicU64]>,
    rng: Mutex<fastrand::Rng>,
}

impl LoadBalancer {
    pub fn new(workers: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            loads: (0..workers.max(1)).map(|_| AtomicU64::new(0)).collect(),
            rng: Mutex::new(rng),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.loads.len()
    }

    /// Snapshot of every worker's accumulated load.
    pub fn loads(&self) -> Vec<u64> {
        self.loads.iter().map(|l| l.load(Ordering::Acquire)).collect()
    }

    /// Workers eligible for the next task, given a load snapshot.
    pub fn candidates(loads: &[u64]) -> Vec<usize> {
        if loads.is_empty() {
            return Vec::new();
        }
        let mean = loads.iter().map(|&l| l as f64).sum::<f64>() / loads.len() as f64;
        let threshold = UNDERLOADED_RATIO * mean;
        let underloaded: Vec<usize> = (0..loads.len())
            .filter(|&i| loads[i] as f64 <= threshold)
            .collect();
        if !underloaded.is_empty() {
            return underloaded;
        }

        let mut sorted = loads.to_vec();
        sorted.sort_unstable();
        let median = sorted[sorted.len() / 2];
        (0..loads.len()).filter(|&i| loads[i] <= median).collect()
    }

    /// Pick a worker without charging it.
    pub fn choose_worker(&self) -> usize {
        let candidates = Self::candidates(&self.loads());
        match candidates.len() {
            0 => 0,
            1 => candidates[0],
            n => candidates[self.rng.lock().usize(0..n)],
        }
    }

    /// Add `weight` to a worker's load. Loads only grow.
    pub fn charge(&self, worker: usize, weight: u64) {
        if let Some(load) = self.loads.get(worker) {
            load.fetch_add(weight, Ordering::AcqRel);
        }
    }

    /// Pick a worker and charge it.
    pub fn dispatch(&self, weight: u64) -> usize {
        let worker = self.choose_worker();
        self.charge(worker, weight);
        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_idle_workers_are_candidates() {
        assert_eq!(LoadBalancer::candidates(&[0, 0, 0]), vec![0, 1, 2]);
    }

    #[test]
    fn test_underloaded_workers_preferred() {
        // mean 40, threshold 32
        assert_eq!(LoadBalancer::candidates(&[10, 50, 60, 40]), vec![0]);
    }

    #[test]
    fn test_median_fallback() {
        // mean 10, threshold 8: nobody qualifies, upper median is 10
        assert_eq!(LoadBalancer::candidates(&[9, 10, 11]), vec![0, 1]);
        assert_eq!(LoadBalancer::candidates(&[10, 10]), vec![0, 1]);
    }

    #[test]
    fn test_dispatch_charges_chosen_worker() {
        let balancer = LoadBalancer::new(3, Some(42));
        let first = balancer.dispatch(5);
        assert_eq!(balancer.loads()[first], 5);

        // The charged worker is no longer a candidate while others sit at zero
        let second = balancer.dispatch(5);
        assert_ne!(first, second);
        assert_eq!(balancer.loads().iter().sum::<u64>(), 10);
    }

    #[test]
    fn test_seeded_choices_repeat() {
        let a = LoadBalancer::new(4, Some(7));
        let b = LoadBalancer::new(4, Some(7));
        let picks_a: Vec<usize> = (0..50).map(|_| a.dispatch(1)).collect();
        let picks_b: Vec<usize> = (0..50).map(|_| b.dispatch(1)).collect();
        assert_eq!(picks_a, picks_b);
    }
}
