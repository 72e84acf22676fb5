//! Per-entity fan-out over a rayon pool.
//!
//! Entities are independent, so each one is computed on its own task and the
//! outcomes are collected into key-ordered maps. Entity-level failures are
//! recorded and skipped; batch-level failures abort the whole run.

use emv_core::error::{EngineError, Result};
use emv_core::region::RegionKey;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Collected results of a per-entity run.
#[derive(Debug)]
pub struct Outcomes<T> {
    pub results: BTreeMap<RegionKey, T>,
    pub skipped: BTreeMap<RegionKey, EngineError>,
}

impl<T> Default for Outcomes<T> {
    fn default() -> Self {
        Outcomes {
            results: BTreeMap::new(),
            skipped: BTreeMap::new(),
        }
    }
}

pub struct EntityPool {
    pool: Option<rayon::ThreadPool>,
}

impl EntityPool {
    /// `None` uses rayon's global pool, sized to the available cores.
    pub fn new(max_threads: Option<usize>) -> std::result::Result<Self, rayon::ThreadPoolBuildError> {
        let pool = match max_threads {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };
        Ok(EntityPool { pool })
    }

    /// Apply `compute` to every entity in parallel.
    ///
    /// Results are keyed by entity, so the output is identical for any
    /// worker count or scheduling order.
    pub fn run<I, T, F>(&self, work: Vec<(RegionKey, I)>, compute: F) -> Result<Outcomes<T>>
    where
        I: Send,
        T: Send,
        F: Fn(&RegionKey, I) -> Result<T> + Sync + Send,
    {
        let task = || -> Vec<(RegionKey, Result<T>)> {
            work.into_par_iter()
                .map(|(key, input)| {
                    let outcome = compute(&key, input);
                    (key, outcome)
                })
                .collect()
        };
        let computed = match &self.pool {
            Some(pool) => pool.install(task),
            None => task(),
        };

        let mut outcomes = Outcomes::default();
        for (key, outcome) in computed {
            match outcome {
                Ok(value) => {
                    outcomes.results.insert(key, value);
                }
                Err(e) if e.is_per_entity() => {
                    log::debug!("Skipping {key}: {e}");
                    outcomes.skipped.insert(key, e);
                }
                Err(e) => return Err(e),
            }
        }
        log::info!(
            "Computed {} entities, skipped {}",
            outcomes.results.len(),
            outcomes.skipped.len()
        );
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work() -> Vec<(RegionKey, f64)> {
        (0..50)
            .map(|i| (RegionKey::new(format!("R{i:02}")), i as f64))
            .collect()
    }

    fn halve(key: &RegionKey, value: f64) -> Result<f64> {
        if value == 0.0 {
            return Err(EngineError::NonPositiveBaseline {
                entity: key.to_string(),
                baseline: value,
            });
        }
        Ok(value / 2.0)
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let serial = EntityPool::new(Some(1)).unwrap().run(work(), halve).unwrap();
        let wide = EntityPool::new(Some(8)).unwrap().run(work(), halve).unwrap();
        let global = EntityPool::new(None).unwrap().run(work(), halve).unwrap();
        assert_eq!(serial.results, wide.results);
        assert_eq!(serial.results, global.results);
        assert_eq!(serial.results.len(), 49);
        assert_eq!(serial.results[&RegionKey::new("R10")], 5.0);
    }

    #[test]
    fn test_per_entity_errors_are_skipped() {
        let outcomes = EntityPool::new(Some(2)).unwrap().run(work(), halve).unwrap();
        assert_eq!(outcomes.skipped.len(), 1);
        assert!(outcomes.skipped.contains_key(&RegionKey::new("R00")));
        assert!(!outcomes.results.contains_key(&RegionKey::new("R00")));
    }

    #[test]
    fn test_batch_errors_abort() {
        let result = EntityPool::new(Some(2)).unwrap().run(work(), |_, value| {
            if value == 7.0 {
                Err(EngineError::MalformedDate("7 бубня".into()))
            } else {
                Ok(value)
            }
        });
        assert!(matches!(result, Err(EngineError::MalformedDate(_))));
    }
}
