// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::{InitPacketStore, ReportCache, TargetState, mark_steady_state};
use crate::pairing_queue::PairingQueue;
use padbus_core::util::sleep;
use std::{sync::Arc, time::Duration};
use tokio::{
  select,
  sync::{Mutex, watch},
};
use tokio_util::sync::CancellationToken;

/// Hands the cached frame to a waiting data pull whenever no report arrived for a full period.
/// Covers hosts that re-issue reads without the owner resubmitting input.
pub(super) async fn flush_cached_frame(
  serial: u32,
  period: Duration,
  cache: Arc<Mutex<ReportCache>>,
  queue: Arc<PairingQueue<Vec<u8>>>,
  state: watch::Receiver<TargetState>,
  token: CancellationToken,
) {
  debug!("Starting frame flush timer for target {}", serial);
  loop {
    select! {
      _ = token.cancelled() => break,
      _ = sleep(period) => {
        if *state.borrow() != TargetState::SteadyState {
          continue;
        }
        let cache = cache.lock().await;
        if cache.updated.elapsed() < period {
          continue;
        }
        if queue.push(cache.frame.clone()).await.is_ok() {
          trace!("Target {} flushed cached frame", serial);
        }
      }
    }
  }
  debug!("Frame flush timer for target {} exiting", serial);
}

/// Delivers collected init packets, one per period, to whichever data pull is waiting. A packet
/// nobody was waiting for is kept for the next tick. Finishes the handshake once all are out.
pub(super) async fn replay_init_packets(
  serial: u32,
  period: Duration,
  store: Arc<Mutex<InitPacketStore>>,
  queue: Arc<PairingQueue<Vec<u8>>>,
  state: Arc<watch::Sender<TargetState>>,
  token: CancellationToken,
) {
  debug!("Starting init packet replay for target {}", serial);
  loop {
    select! {
      _ = token.cancelled() => {
        debug!("Init packet replay for target {} cancelled", serial);
        return;
      }
      _ = sleep(period) => {
        let mut store = store.lock().await;
        let Some(packet) = store.packets.pop_front() else {
          break;
        };
        if let Err(packet) = queue.push(packet).await {
          store.packets.push_front(packet);
          continue;
        }
        trace!(
          "Target {} replayed init packet, {} left",
          serial,
          store.packets.len()
        );
        if store.packets.is_empty() {
          break;
        }
      }
    }
  }
  if mark_steady_state(&state) {
    info!("Target {} finished init packet replay", serial);
  }
}
