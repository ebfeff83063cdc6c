use std::collections::VecDeque;

use parking_lot::Condvar;
use parking_lot::Mutex;

/// A bounded blocking FIFO queue connecting two stages of the model pipeline.
///
/// `push` blocks while the queue is full and `pop` while it is empty. Closing the queue wakes
/// every waiting thread: pushes to a closed queue are refused, while entries already queued can
/// still be popped.
#[derive(Debug)]
pub struct ModelQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    entries: VecDeque<T>,
    closed: bool,
}

impl<T> ModelQueue<T> {
    /// A queue holding at most `capacity` entries; a capacity of `0` behaves like `1`.
    pub fn new(capacity: usize) -> ModelQueue<T> {
        let capacity = capacity.max(1);
        ModelQueue {
            state: Mutex::new(QueueState {
                entries: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `entry`, waiting for space. Returns the entry back if the queue was closed.
    pub fn push(&self, entry: T) -> Result<(), T> {
        let mut state = self.state.lock();
        while state.entries.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(entry);
        }

        state.entries.push_back(entry);
        let _ = self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest entry, waiting for one. Returns `None` once the queue is closed and
    /// empty.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.entries.pop_front() {
                let _ = self.not_full.notify_one();
                return Some(entry);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        let _ = self.not_empty.notify_all();
        let _ = self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn zero_capacity_behaves_like_one() {
        let queue = ModelQueue::new(0);
        assert_eq!(queue.capacity(), 1);

        assert_eq!(queue.push(1), Ok(()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(1));
    }

    #[test]
    fn entries_are_popped_in_order_across_threads() {
        let queue = Arc::new(ModelQueue::new(2));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for value in 0..100 {
                    assert!(queue.push(value).is_ok());
                }
                queue.close();
            })
        };

        let mut received = Vec::new();
        while let Some(value) = queue.pop() {
            received.push(value);
        }
        producer.join().expect("producer does not panic");

        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn closing_wakes_a_blocked_producer() {
        let queue = Arc::new(ModelQueue::new(1));
        assert!(queue.push(0).is_ok());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1))
        };
        queue.close();

        assert_eq!(producer.join().expect("producer does not panic"), Err(1));
        // Entries queued before closing can still be popped.
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn closing_wakes_a_blocked_consumer() {
        let queue: Arc<ModelQueue<u32>> = Arc::new(ModelQueue::new(3));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        queue.close();

        assert_eq!(consumer.join().expect("consumer does not panic"), None);
        assert!(queue.is_closed());
    }
}
