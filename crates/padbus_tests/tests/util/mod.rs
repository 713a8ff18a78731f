// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use padbus_core::errors::{ErrorKind, PadbusResult};
use padbus_server::{
  Caller,
  PadbusServer,
  PadbusServerBuilder,
  PadbusServerOptions,
  protocol::{PipeKind, xbox360::BOOT_SEQUENCE},
  target::{EmulationTarget, TargetState},
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::timeout};
use tracing_subscriber::EnvFilter;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

#[allow(dead_code)]
pub fn setup_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .try_init();
}

/// Server without the Xbox 360 stall flush, so tests control every frame delivered.
#[allow(dead_code)]
pub fn test_server() -> Arc<PadbusServer> {
  Arc::new(
    PadbusServerBuilder::default()
      .xbox360_flush_period(None)
      .xbox_one_init_period(Duration::from_millis(5))
      .finish()
      .expect("Test, assuming infallible."),
  )
}

#[allow(dead_code)]
pub fn test_server_with_options(options: &PadbusServerOptions) -> Arc<PadbusServer> {
  Arc::new(
    PadbusServerBuilder::from_options(options)
      .finish()
      .expect("Test, assuming infallible."),
  )
}

#[allow(dead_code)]
pub async fn bounded<F>(future: F) -> F::Output
where
  F: Future,
{
  timeout(TEST_TIMEOUT, future)
    .await
    .expect("Test timed out.")
}

#[allow(dead_code)]
pub async fn plug_in(
  server: &PadbusServer,
  caller: &Caller,
  serial: u32,
  target_type: padbus_core::message::TargetType,
) -> Arc<EmulationTarget> {
  server
    .plug_in(caller, serial, target_type, None, None)
    .await
    .expect("Test, assuming infallible.");
  server.target(serial).expect("Test, assuming infallible.")
}

/// Issues a data pipe pull from a separate task, returning once the pull is parked.
#[allow(dead_code)]
pub async fn spawn_data_pull(target: &Arc<EmulationTarget>) -> JoinHandle<PadbusResult<Vec<u8>>> {
  let pending = target.pending_transfer_count().await;
  let pull_target = target.clone();
  let handle =
    tokio::spawn(async move { pull_target.handle_in_transfer(PipeKind::Data, 64).await });
  wait_for_pending_transfers(target, pending + 1).await;
  handle
}

#[allow(dead_code)]
pub async fn wait_for_pending_transfers(target: &EmulationTarget, count: usize) {
  bounded(async {
    while target.pending_transfer_count().await != count {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  })
  .await;
}

#[allow(dead_code)]
pub async fn wait_for_pending_notifications(target: &EmulationTarget, count: usize) {
  bounded(async {
    while target.pending_notification_count().await != count {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  })
  .await;
}

/// Pulls the whole Xbox 360 boot sequence so the target reaches steady state.
#[allow(dead_code)]
pub async fn drain_xbox360_boot(target: &EmulationTarget) {
  for packet in BOOT_SEQUENCE.iter() {
    let data = bounded(target.handle_in_transfer(PipeKind::Data, 64))
      .await
      .expect("Test, assuming infallible.");
    assert_eq!(&data, packet);
  }
  assert_eq!(target.state(), TargetState::SteadyState);
}

#[allow(dead_code)]
pub fn assert_error_kind<T>(result: PadbusResult<T>, kind: ErrorKind)
where
  T: std::fmt::Debug,
{
  match result {
    Ok(value) => panic!("Expected {} error, got {:?}", kind, value),
    Err(err) => assert_eq!(err.kind(), kind),
  }
}
