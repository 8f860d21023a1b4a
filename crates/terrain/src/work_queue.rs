//! Background generation dispatch.
//!
//! Height maps and LOD meshes are produced off the main schedule on the
//! bounded [`AsyncComputeTaskPool`] and collected by draining once per tick,
//! so the control thread never blocks on generation. Results arrive in
//! completion order, which is deliberately unrelated to submission order.
//!
//! Guarantees per submission: the job runs exactly once, its result is
//! delivered exactly once, and only ever on the draining thread. A key with
//! a job still in flight rejects further submissions, which is the backstop
//! for the one-request-per-(chunk, LOD) invariant.

use std::collections::HashMap;
use std::hash::Hash;

use bevy::tasks::{block_on, AsyncComputeTaskPool, Task};
use futures_lite::future;

pub struct WorkQueue<K, T> {
    in_flight: HashMap<K, Task<T>>,
    submitted_total: u64,
}

impl<K, T> Default for WorkQueue<K, T> {
    fn default() -> Self {
        Self {
            in_flight: HashMap::new(),
            submitted_total: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, T: Send + 'static> WorkQueue<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` on the compute pool. Returns `false` (without spawning)
    /// when `key` already has a job in flight.
    ///
    /// A panicking job is a defect: the panic is not caught and will take
    /// the process down when the task is polled.
    pub fn submit(&mut self, key: K, job: impl FnOnce() -> T + Send + 'static) -> bool {
        if self.in_flight.contains_key(&key) {
            return false;
        }
        let task = AsyncComputeTaskPool::get().spawn(async move { job() });
        self.in_flight.insert(key, task);
        self.submitted_total += 1;
        true
    }

    /// Collect every completed job, in completion order. Non-blocking: jobs
    /// still running stay in flight for a later drain.
    pub fn drain(&mut self) -> Vec<(K, T)> {
        let mut completed = Vec::new();
        self.in_flight.retain(|key, task| {
            match block_on(future::poll_once(task)) {
                Some(result) => {
                    completed.push((key.clone(), result));
                    false
                }
                None => true,
            }
        });
        completed
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total accepted submissions over the queue's lifetime.
    pub fn submitted_total(&self) -> u64 {
        self.submitted_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::tasks::TaskPool;
    use std::time::Duration;

    fn init_pool() {
        AsyncComputeTaskPool::get_or_init(TaskPool::new);
    }

    fn drain_one<K: Eq + Hash + Clone, T: Send + 'static>(queue: &mut WorkQueue<K, T>) -> (K, T) {
        for _ in 0..5_000 {
            let mut completed = queue.drain();
            if let Some(result) = completed.pop() {
                assert!(completed.is_empty());
                return result;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("job never completed");
    }

    #[test]
    fn test_result_is_delivered_exactly_once() {
        init_pool();
        let mut queue = WorkQueue::new();
        assert!(queue.submit("answer", || 41 + 1));
        let (key, value) = drain_one(&mut queue);
        assert_eq!(key, "answer");
        assert_eq!(value, 42);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_duplicate_key_is_suppressed_while_in_flight() {
        init_pool();
        let mut queue = WorkQueue::new();
        assert!(queue.submit(7u32, || {
            std::thread::sleep(Duration::from_millis(50));
            "slow"
        }));
        assert!(!queue.submit(7u32, || "duplicate"));
        assert_eq!(queue.in_flight(), 1);
        assert_eq!(queue.submitted_total(), 1);

        let (_, value) = drain_one(&mut queue);
        assert_eq!(value, "slow");

        // Once the first job completed, the key is free again.
        assert!(queue.submit(7u32, || "again"));
    }

    #[test]
    fn test_all_submissions_complete() {
        init_pool();
        let mut queue = WorkQueue::new();
        for i in 0..16u32 {
            assert!(queue.submit(i, move || i * i));
        }

        let mut completed = Vec::new();
        for _ in 0..5_000 {
            completed.extend(queue.drain());
            if completed.len() == 16 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(completed.len(), 16);
        completed.sort_by_key(|(key, _)| *key);
        for (key, value) in completed {
            assert_eq!(value, key * key);
        }
    }
}
