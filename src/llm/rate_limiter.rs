//! Concurrency cap plus a sliding window over call start times

use crate::error::{RelevanceError, Result};
use crate::llm::policy::ReasoningPolicy;
use log::debug;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Callers queue until both a concurrency slot and a window slot are free.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    max_calls: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

/// Holds one concurrency slot until dropped.
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(max_concurrency: usize, max_calls: usize, window: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            max_calls: max_calls.max(1),
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_policy(policy: &ReasoningPolicy) -> Self {
        Self::new(
            policy.max_concurrency,
            policy.max_calls_per_window,
            policy.window,
        )
    }

    pub async fn acquire(&self) -> Result<RatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RelevanceError::Reasoning("rate limiter closed".to_string()))?;

        loop {
            let wait = {
                let mut starts = self.starts.lock();
                let now = Instant::now();
                while starts
                    .front()
                    .is_some_and(|start| now.duration_since(*start) >= self.window)
                {
                    starts.pop_front();
                }

                if starts.len() < self.max_calls {
                    starts.push_back(now);
                    None
                } else {
                    starts
                        .front()
                        .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                }
            };

            match wait {
                None => return Ok(RatePermit { _permit: permit }),
                Some(delay) => {
                    debug!("Reasoning call window full, waiting {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Slots currently held by callers.
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_delays_excess_calls() {
        let limiter = RateLimiter::new(10, 2, Duration::from_secs(10));
        let start = Instant::now();

        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));

        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_concurrency_slots_are_released() {
        let limiter = RateLimiter::new(2, 100, Duration::from_secs(60));

        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);

        drop(first);
        assert_eq!(limiter.in_flight(), 1);
        drop(second);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_caller_waits_for_a_slot() {
        let limiter = Arc::new(RateLimiter::new(2, 100, Duration::from_secs(60)));
        let first = limiter.acquire().await.unwrap();
        let _second = limiter.acquire().await.unwrap();

        let waiting = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(first);
        waiting.await.unwrap().unwrap();
    }
}
