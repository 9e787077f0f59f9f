//! Publisher/subscriber pairs with credit-based backpressure.
//!
//! One publisher/subscriber pair is created per parallel unit. Ranges are
//! dealt round-robin to the publishers, which are then closed. A publisher
//! only delivers an item when its subscriber holds credit, and the
//! subscriber grants exactly one credit at a time: once when it subscribes,
//! and again after it has finished counting each range.
//!
//! ```text
//!   execute ──submit──► [publisher 0] ══ item ══► subscriber 0 ──┐
//!           ──submit──► [publisher 1] ══ item ══► subscriber 1 ──┼──► completion ──► sum
//!                             ▲                        │         │
//!                             └────── request(1) ──────┘         │
//! ```
//!
//! Items are delivered on a dedicated thread per pair, which drives the
//! delivery loop with the `futures` executor. A subscriber signals
//! completion once its publisher is closed and drained. Supply always
//! outpaces demand in this benchmark, so the credit protocol shows its cost
//! rather than its benefit.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, trace};

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::{PartitionPlan, Range};
use crate::strategies::Strategy;

/// Credit granted by a subscriber per request.
const CREDIT: usize = 1;

type Completion = oneshot::Receiver<Result<u64, CountingError>>;

/// The subscriber's handle for granting credit or cancelling delivery.
///
/// Credit is a semaphore that starts empty: every permit lets the publisher
/// deliver one item. Closing the semaphore cancels delivery.
pub struct Subscription {
    credit: Arc<Semaphore>,
}

impl Subscription {
    /// Allows the publisher to deliver `n` more items.
    pub fn request(&self, n: usize) {
        self.credit.add_permits(n);
    }

    /// Stops delivery; the subscriber receives `on_error(Cancelled)`.
    pub fn cancel(&self) {
        self.credit.close();
    }
}

/// Receiving side of a publisher.
///
/// Every callback runs on the publisher's delivery thread, one at a time.
pub trait Subscriber: Send + 'static {
    fn on_subscribe(&mut self, subscription: Subscription);
    fn on_next(&mut self, item: Range);
    fn on_error(&mut self, error: CountingError);
    fn on_complete(&mut self);
}

/// Buffers submitted ranges and delivers them as credit allows.
pub struct Publisher {
    items: Option<mpsc::UnboundedSender<Range>>,
    credit: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    delivery: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Starts a delivery thread for `subscriber`.
    pub fn subscribe<S: Subscriber>(name: String, subscriber: S) -> Result<Self, CountingError> {
        let (items, buffer) = mpsc::unbounded_channel();
        let credit = Arc::new(Semaphore::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        let delivery = {
            let credit = Arc::clone(&credit);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name(name)
                .spawn(move || futures::executor::block_on(deliver(buffer, credit, pending, subscriber)))
                .map_err(CountingError::Spawn)?
        };
        Ok(Self {
            items: Some(items),
            credit,
            pending,
            delivery: Some(delivery),
        })
    }

    /// Buffers `item`; returns `false` once the publisher is closed.
    pub fn submit(&self, item: Range) -> bool {
        let Some(items) = &self.items else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if items.send(item).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// No more items will be submitted.
    pub fn close(&mut self) {
        self.items = None;
    }

    /// Cancels delivery and waits for the delivery thread to exit.
    pub fn shutdown(&mut self) {
        self.credit.close();
        self.items = None;
        if let Some(delivery) = self.delivery.take() {
            let _ = delivery.join();
        }
    }

    /// Items submitted but not yet delivered.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

async fn deliver<S: Subscriber>(
    mut buffer: mpsc::UnboundedReceiver<Range>,
    credit: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    mut subscriber: S,
) {
    subscriber.on_subscribe(Subscription {
        credit: Arc::clone(&credit),
    });

    loop {
        // One permit per item; a closed semaphore means delivery was cancelled.
        match credit.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return subscriber.on_error(CountingError::Cancelled),
        }

        match buffer.recv().await {
            Some(_) if credit.is_closed() => return subscriber.on_error(CountingError::Cancelled),
            Some(item) => {
                pending.fetch_sub(1, Ordering::AcqRel);
                subscriber.on_next(item);
            }
            None if credit.is_closed() => return subscriber.on_error(CountingError::Cancelled),
            None => return subscriber.on_complete(),
        }
    }
}

/// Counts every delivered range and reports the total on completion.
struct RangeSubscriber {
    count: u64,
    subscription: Option<Subscription>,
    completion: Option<oneshot::Sender<Result<u64, CountingError>>>,
    cancel: CancelToken,
}

impl RangeSubscriber {
    fn new(cancel: CancelToken) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        let subscriber = Self {
            count: 0,
            subscription: None,
            completion: Some(tx),
            cancel,
        };
        (subscriber, rx)
    }

    fn signal(&mut self, result: Result<u64, CountingError>) {
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(result);
        }
    }
}

impl Subscriber for RangeSubscriber {
    fn on_subscribe(&mut self, subscription: Subscription) {
        subscription.request(CREDIT);
        self.subscription = Some(subscription);
    }

    fn on_next(&mut self, item: Range) {
        match count_primes_until_cancelled(item, &self.cancel) {
            Ok(count) => {
                self.count += count;
                if let Some(subscription) = &self.subscription {
                    subscription.request(CREDIT);
                }
            }
            Err(err) => {
                if let Some(subscription) = &self.subscription {
                    subscription.cancel();
                }
                self.signal(Err(err));
            }
        }
    }

    fn on_error(&mut self, error: CountingError) {
        self.signal(Err(error));
    }

    fn on_complete(&mut self) {
        let count = self.count;
        trace!(count, "subscriber complete");
        self.signal(Ok(count));
    }
}

/// Streams ranges through credit-limited publisher/subscriber pairs.
pub struct CreditStream {
    parallelism: NonZeroUsize,
    ranges: Option<Vec<Range>>,
    publishers: Vec<Publisher>,
    completions: Vec<Completion>,
    cancel: CancelToken,
}

impl CreditStream {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self {
            parallelism,
            ranges: None,
            publishers: Vec::new(),
            completions: Vec::new(),
            cancel: CancelToken::new(),
        }
    }
}

impl Strategy for CreditStream {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        for index in 0..self.parallelism.get() {
            let (subscriber, completion) = RangeSubscriber::new(self.cancel.clone());
            let publisher = Publisher::subscribe(format!("credit-stream-{index}"), subscriber)?;
            self.publishers.push(publisher);
            self.completions.push(completion);
        }
        self.ranges = Some(plan.to_vec());
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let ranges = self.ranges.take().ok_or(CountingError::NotSetUp)?;

        let pairs = self.publishers.len();
        for (index, range) in ranges.into_iter().enumerate() {
            if !self.publishers[index % pairs].submit(range) {
                return Err(CountingError::SubscriberLost {
                    subscriber: index % pairs,
                });
            }
        }
        for publisher in &mut self.publishers {
            publisher.close();
        }

        let mut total = 0;
        for (subscriber, completion) in self.completions.drain(..).enumerate() {
            total += completion
                .blocking_recv()
                .map_err(|_| CountingError::SubscriberLost { subscriber })??;
        }
        Ok(total)
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        let pending: usize = self.publishers.iter().map(Publisher::pending).sum();
        for publisher in &mut self.publishers {
            publisher.shutdown();
        }
        self.publishers.clear();
        self.completions.clear();
        debug!(pending, "credit-stream torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::partition;
    use std::sync::atomic::AtomicU64;
    use std::time::{Duration, Instant};

    /// Takes the credit granted on subscribe and never asks for more.
    struct Stingy {
        subscription: Option<Subscription>,
        seen: Arc<AtomicU64>,
        done: Option<oneshot::Sender<()>>,
    }

    impl Stingy {
        fn finish(&mut self) {
            if let Some(done) = self.done.take() {
                let _ = done.send(());
            }
        }
    }

    impl Subscriber for Stingy {
        fn on_subscribe(&mut self, subscription: Subscription) {
            subscription.request(CREDIT);
            self.subscription = Some(subscription);
        }

        fn on_next(&mut self, _item: Range) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&mut self, _error: CountingError) {
            self.finish();
        }

        fn on_complete(&mut self) {
            self.finish();
        }
    }

    #[test]
    fn test_delivery_waits_for_credit() {
        let seen = Arc::new(AtomicU64::new(0));
        let (done_tx, done_rx) = oneshot::channel();
        let subscriber = Stingy {
            subscription: None,
            seen: Arc::clone(&seen),
            done: Some(done_tx),
        };

        let mut publisher = Publisher::subscribe("stingy".to_string(), subscriber).unwrap();
        for start in [1, 11, 21] {
            assert!(publisher.submit(Range::new(start, start + 9)));
        }
        publisher.close();
        assert!(!publisher.submit(Range::new(31, 40)));

        // Only the credit granted on subscribe is ever used.
        while seen.load(Ordering::SeqCst) < 1 {
            thread::yield_now();
        }
        assert_eq!(publisher.pending(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        publisher.shutdown();
        done_rx.blocking_recv().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_round_robin_over_pairs() {
        let plan = partition(10_000, 8).unwrap();
        let mut strategy = CreditStream::new(NonZeroUsize::new(3).unwrap());
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.publishers.len(), 3);
        assert_eq!(strategy.execute().unwrap(), 1229);
        strategy.teardown();
        assert!(strategy.publishers.is_empty());
    }

    #[test]
    fn test_cancelled_subscriber_reports_error() {
        let plan = partition(10_000, 4).unwrap();
        let mut strategy = CreditStream::new(NonZeroUsize::new(2).unwrap());
        strategy.setup(&plan).unwrap();
        strategy.cancel.cancel();
        assert!(matches!(strategy.execute(), Err(CountingError::Cancelled)));
        strategy.teardown();
    }

    #[test]
    fn test_teardown_cancels_subscribers_still_counting() {
        let plan = partition(400_000_000, 6).unwrap();
        let mut strategy = CreditStream::new(NonZeroUsize::new(2).unwrap());
        strategy.setup(&plan).unwrap();

        let cancel = strategy.cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let started = Instant::now();
        assert!(matches!(strategy.execute(), Err(CountingError::Cancelled)));
        assert!(strategy.publishers.iter().any(|publisher| publisher.pending() > 0));

        strategy.teardown();
        canceller.join().unwrap();
        assert!(strategy.publishers.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
