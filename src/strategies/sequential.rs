//! Sequential baseline: every range counted on the calling thread.
//!
//! This is the reference point for both correctness and speed. It owns no
//! resources and keeps the default no-op `teardown`.

use crate::error::CountingError;
use crate::oracle::count_primes_in;
use crate::range::PartitionPlan;
use crate::strategies::Strategy;

/// Counts all ranges one after another without any coordination.
#[derive(Debug, Default)]
pub struct Sequential {
    plan: Option<PartitionPlan>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for Sequential {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.plan = Some(plan.clone());
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let plan = self.plan.as_ref().ok_or(CountingError::NotSetUp)?;
        Ok(count_primes_in(plan))
    }
}
