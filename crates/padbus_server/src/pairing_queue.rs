// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Rendezvous between callers waiting for a value and producers handing one out.

use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::{Mutex, oneshot};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Pairing queue was cancelled before a value arrived.")]
pub struct PairingQueueCancelled;

struct PairingQueueState<T> {
  waiters: VecDeque<oneshot::Sender<T>>,
  closed: bool,
}

/// FIFO rendezvous queue.
///
/// [PairingQueue::pull] parks the caller until a value is pushed. [PairingQueue::push] hands its
/// value to the oldest parked caller, or gives it back if nobody is waiting. Values are never
/// buffered.
pub struct PairingQueue<T> {
  state: Mutex<PairingQueueState<T>>,
}

impl<T> Default for PairingQueue<T> {
  fn default() -> Self {
    Self {
      state: Mutex::new(PairingQueueState {
        waiters: VecDeque::new(),
        closed: false,
      }),
    }
  }
}

impl<T> PairingQueue<T>
where
  T: Send,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Waits for the next pushed value. Dropping the returned future gives up the place in line.
  pub async fn pull(&self) -> Result<T, PairingQueueCancelled> {
    let receiver = {
      let mut state = self.state.lock().await;
      if state.closed {
        return Err(PairingQueueCancelled);
      }
      // Drop slots left behind by callers that stopped waiting.
      state.waiters.retain(|waiter| !waiter.is_closed());
      let (sender, receiver) = oneshot::channel();
      state.waiters.push_back(sender);
      receiver
    };
    receiver.await.map_err(|_| PairingQueueCancelled)
  }

  /// Delivers `value` to the oldest live waiter. Returns the value if there was none.
  pub async fn push(&self, value: T) -> Result<(), T> {
    let mut state = self.state.lock().await;
    let mut value = value;
    while let Some(waiter) = state.waiters.pop_front() {
      match waiter.send(value) {
        Ok(()) => return Ok(()),
        // Waiter went away, try the next one.
        Err(returned) => value = returned,
      }
    }
    Err(value)
  }

  /// Releases every current waiter with [PairingQueueCancelled]. The queue stays usable.
  pub async fn cancel_all(&self) {
    let mut state = self.state.lock().await;
    let count = state.waiters.len();
    state.waiters.clear();
    if count > 0 {
      trace!("Cancelled {} pending pulls", count);
    }
  }

  /// Cancels every waiter and rejects all future pulls.
  pub async fn close(&self) {
    let mut state = self.state.lock().await;
    state.closed = true;
    state.waiters.clear();
  }

  /// Number of callers currently parked in [PairingQueue::pull].
  pub async fn pending_count(&self) -> usize {
    let state = self.state.lock().await;
    state.waiters.iter().filter(|w| !w.is_closed()).count()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use futures::FutureExt;
  use std::{sync::Arc, time::Duration};
  use tokio::time::timeout;

  async fn wait_for_waiters(queue: &PairingQueue<u32>, count: usize) {
    while queue.pending_count().await < count {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test]
  async fn test_push_without_waiter_returns_value() {
    let queue = PairingQueue::<u32>::new();
    assert_eq!(queue.push(3u32).await, Err(3));
  }

  #[tokio::test]
  async fn test_pull_receives_push() {
    let queue = Arc::new(PairingQueue::<u32>::new());
    let puller = {
      let queue = queue.clone();
      tokio::spawn(async move { queue.pull().await })
    };
    wait_for_waiters(&queue, 1).await;
    assert_eq!(queue.push(10).await, Ok(()));
    assert_eq!(
      puller.await.expect("Test, assuming infallible."),
      Ok(10)
    );
  }

  #[tokio::test]
  async fn test_waiters_served_in_arrival_order() {
    let queue = Arc::new(PairingQueue::<u32>::new());
    let mut pullers = vec![];
    for i in 0..4 {
      let q = queue.clone();
      pullers.push(tokio::spawn(async move { q.pull().await }));
      wait_for_waiters(&queue, i + 1).await;
    }
    for value in 100..104u32 {
      assert_eq!(queue.push(value).await, Ok(()));
    }
    for (puller, expected) in pullers.into_iter().zip(100..104u32) {
      assert_eq!(puller.await.expect("Test, assuming infallible."), Ok(expected));
    }
  }

  #[tokio::test]
  async fn test_dropped_waiter_is_skipped() {
    let queue = Arc::new(PairingQueue::<u32>::new());
    let abandoned = {
      let q = queue.clone();
      tokio::spawn(async move { q.pull().await })
    };
    wait_for_waiters(&queue, 1).await;
    let live = {
      let q = queue.clone();
      tokio::spawn(async move { q.pull().await })
    };
    wait_for_waiters(&queue, 2).await;
    abandoned.abort();
    let _ = abandoned.await;
    assert_eq!(queue.push(42).await, Ok(()));
    assert_eq!(live.await.expect("Test, assuming infallible."), Ok(42));
  }

  #[tokio::test]
  async fn test_abandoned_pulls_do_not_accumulate() {
    let queue = PairingQueue::<u32>::new();
    for _ in 0..16 {
      // One poll parks the caller, then the future is dropped.
      assert!(queue.pull().now_or_never().is_none());
    }
    assert_eq!(queue.pending_count().await, 0);
    assert_eq!(queue.state.lock().await.waiters.len(), 1);
  }

  #[tokio::test]
  async fn test_cancel_all_releases_waiters() {
    let queue = Arc::new(PairingQueue::<u32>::new());
    let puller = {
      let q = queue.clone();
      tokio::spawn(async move { q.pull().await })
    };
    wait_for_waiters(&queue, 1).await;
    queue.cancel_all().await;
    let result = timeout(Duration::from_secs(1), puller)
      .await
      .expect("Test, assuming infallible.")
      .expect("Test, assuming infallible.");
    assert_eq!(result, Err(PairingQueueCancelled));
    // Queue is still usable after a cancel.
    assert_eq!(queue.pending_count().await, 0);
  }

  #[tokio::test]
  async fn test_closed_queue_rejects_pulls() {
    let queue = PairingQueue::<u32>::new();
    queue.close().await;
    assert_eq!(queue.pull().await, Err(PairingQueueCancelled));
    assert_eq!(queue.push(1).await, Err(1));
  }
}
