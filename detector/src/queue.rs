use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::warn;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-consumer FIFO hand-off between the frame reader and the workers.
///
/// One mutex guards both the items and the `closed` flag, so a consumer can
/// never observe "empty" and "closed" out of step. Once the queue is closed
/// and drained every `pop` returns `None` immediately.
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    /// Signalled when an item arrives or the queue closes.
    not_empty: Condvar,
    /// Signalled when a bounded queue frees a slot or the queue closes.
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> WorkQueue<T> {
    /// A queue whose `push` never waits.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// A queue holding at most `capacity` items; `push` waits for a free slot.
    /// A capacity of 0 is treated as 1.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append `item` at the tail and wake one waiting consumer.
    ///
    /// Returns `false` and drops the item if the queue is already closed.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.lock();
        if let Some(capacity) = self.capacity {
            state = self
                .not_full
                .wait_while(state, |s| s.items.len() >= capacity && !s.closed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            warn!("push on closed work queue, dropping item");
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        true
    }

    /// Take the head item, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub fn pop(&self) -> Option<T> {
        let state = self.lock();
        let mut state = self
            .not_empty
            .wait_while(state, |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        let item = state.items.pop_front();
        drop(state);
        if item.is_some() && self.capacity.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Mark the end of input and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Point-in-time number of queued items.
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // Nothing panics while holding the lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn pops_in_push_order() {
        let q = WorkQueue::unbounded();
        for i in 0..5 {
            assert!(q.push(i));
        }
        assert_eq!(q.size(), 5);
        let popped: Vec<_> = (0..5).map(|_| q.pop().unwrap()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn drains_before_signalling_end() {
        let q = WorkQueue::unbounded();
        q.push("a");
        q.push("b");
        q.close();
        assert!(q.is_closed());
        assert_eq!(q.pop(), Some("a"));
        assert_eq!(q.pop(), Some("b"));
        assert_eq!(q.pop(), None);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_after_close_is_dropped() {
        let q = WorkQueue::unbounded();
        q.close();
        assert!(!q.push(1));
        assert_eq!(q.size(), 0);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn close_wakes_every_blocked_consumer() {
        let q = Arc::new(WorkQueue::<u32>::unbounded());
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            let tx = tx.clone();
            thread::spawn(move || {
                tx.send(q.pop()).unwrap();
            });
        }
        drop(tx);

        // Give the consumers a chance to block before closing.
        thread::sleep(Duration::from_millis(50));
        q.close();

        for _ in 0..4 {
            let got = rx.recv_timeout(JOIN_TIMEOUT).expect("consumer stayed blocked");
            assert_eq!(got, None);
        }
    }

    #[test]
    fn push_wakes_blocked_consumer() {
        let q = Arc::new(WorkQueue::unbounded());
        let (tx, rx) = mpsc::channel();
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || tx.send(q.pop()).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        q.push(42);
        assert_eq!(rx.recv_timeout(JOIN_TIMEOUT).unwrap(), Some(42));
        consumer.join().unwrap();
    }

    #[test]
    fn every_item_is_delivered_exactly_once() {
        const ITEMS: usize = 10_000;
        let q = Arc::new(WorkQueue::unbounded());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = q.pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        for i in 0..ITEMS {
            q.push(i);
        }
        q.close();

        let mut all: Vec<usize> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    }

    #[test]
    fn bounded_queue_applies_backpressure() {
        let q = Arc::new(WorkQueue::bounded(2));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..100 {
                    assert!(q.push(i));
                }
                q.close();
            })
        };

        let mut received = Vec::new();
        while let Some(item) = q.pop() {
            assert!(q.size() <= 2);
            received.push(item);
        }
        producer.join().unwrap();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn close_releases_producer_waiting_for_space() {
        let q = Arc::new(WorkQueue::bounded(1));
        q.push(0);
        let (tx, rx) = mpsc::channel();
        {
            let q = Arc::clone(&q);
            thread::spawn(move || tx.send(q.push(1)).unwrap());
        }
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(!rx.recv_timeout(JOIN_TIMEOUT).unwrap());
        assert_eq!(q.pop(), Some(0));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn zero_capacity_means_one_slot() {
        let q = WorkQueue::bounded(0);
        assert!(q.push(7));
        assert_eq!(q.size(), 1);
        assert_eq!(q.pop(), Some(7));
    }
}
