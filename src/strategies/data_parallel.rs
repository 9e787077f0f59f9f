//! Nested parallel iterators on the global rayon pool.
//!
//! The outer iterator splits the list of ranges, the inner one splits the
//! numbers of each range. The strategy manages no threads or tasks at all.

use rayon::prelude::*;

use crate::error::CountingError;
use crate::oracle::is_prime;
use crate::range::PartitionPlan;
use crate::strategies::Strategy;

#[derive(Debug, Default)]
pub struct DataParallel {
    plan: Option<PartitionPlan>,
}

impl DataParallel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for DataParallel {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.plan = Some(plan.clone());
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let plan = self.plan.as_ref().ok_or(CountingError::NotSetUp)?;
        Ok(plan
            .par_iter()
            .map(|range| range.iter().into_par_iter().filter(|&n| is_prime(n)).count() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::partition;

    #[test]
    fn test_nested_split() {
        let plan = partition(50_000, 5).unwrap();
        let mut strategy = DataParallel::new();
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.execute().unwrap(), 5133);
    }
}
