// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use futures::{
  future::Future,
  task::{FutureObj, Spawn, SpawnError, SpawnExt},
};

#[derive(Default)]
struct TokioAsyncManager {}

impl Spawn for TokioAsyncManager {
  fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
    tokio::spawn(future);
    Ok(())
  }
}

/// Spawns a detached task. Bus background work (report flushing, init packet replay, notification
/// loops) all goes through here.
pub fn spawn<Fut>(future: Fut)
where
  Fut: Future<Output = ()> + Send + 'static,
{
  if let Err(err) = TokioAsyncManager::default().spawn(future) {
    error!("Cannot spawn task: {:?}", err);
  }
}
