//! The primality oracle shared by every strategy.
//!
//! Trial division up to `floor(sqrt(n))`: deliberately naive, since its
//! `O(sqrt n)` cost per call is exactly the work the strategies distribute.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CountingError;
use crate::range::Range;

/// How many candidates are tested between two looks at a [`CancelToken`].
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Returns `true` if `n` is prime.
///
/// # Examples
///
/// ```rust
/// use primebench::oracle::is_prime;
///
/// assert!(!is_prime(1));
/// assert!(is_prime(2));
/// assert!(is_prime(7919));
/// assert!(!is_prime(7917));
/// ```
pub fn is_prime(n: u64) -> bool {
    if n <= 2 {
        return n == 2;
    }
    let mut divisor = 2u64;
    while divisor <= n / divisor {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

/// Counts the primes in one range.
pub fn count_primes(range: Range) -> u64 {
    range.iter().filter(|&n| is_prime(n)).count() as u64
}

/// Counts the primes in every range, one after another.
pub fn count_primes_in(ranges: &[Range]) -> u64 {
    ranges.iter().copied().map(count_primes).sum()
}

/// Counts the primes in one range, giving up once `cancel` is set.
///
/// The token is polled every few hundred candidates so that a cancelled
/// strategy releases its threads promptly.
pub fn count_primes_until_cancelled(range: Range, cancel: &CancelToken) -> Result<u64, CountingError> {
    let mut count = 0;
    for (checked, n) in range.iter().enumerate() {
        if checked as u64 % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(CountingError::Cancelled);
        }
        if is_prime(n) {
            count += 1;
        }
    }
    Ok(count)
}

/// Cooperative cancellation flag shared between a strategy and its workers.
///
/// `teardown` sets the flag; workers observe it between candidates and stop
/// with [`CountingError::Cancelled`]. Once cancelled a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_primes() {
        let primes: Vec<u64> = (0..=30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_boundaries() {
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
        assert!(is_prime(3));
        assert!(!is_prime(4));
    }

    #[test]
    fn test_squares_of_primes_are_composite() {
        for p in [2u64, 3, 5, 7, 11, 101, 997] {
            assert!(!is_prime(p * p), "{} is composite", p * p);
        }
    }

    #[test]
    fn test_count_known_totals() {
        assert_eq!(count_primes(Range::new(1, 100)), 25);
        assert_eq!(count_primes(Range::new(1, 10_000)), 1229);
        assert_eq!(count_primes(Range::new(4, 4)), 0);
    }

    #[test]
    fn test_count_over_ranges_matches_single_range() {
        let ranges = [Range::new(1, 5), Range::new(6, 15), Range::new(16, 30)];
        assert_eq!(count_primes_in(&ranges), count_primes(Range::new(1, 30)));
    }

    #[test]
    fn test_cancel_token_stops_counting() {
        let token = CancelToken::new();
        assert_eq!(
            count_primes_until_cancelled(Range::new(1, 100), &token).unwrap(),
            25
        );

        token.clone().cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            count_primes_until_cancelled(Range::new(1, 100), &token),
            Err(CountingError::Cancelled)
        ));
    }
}
