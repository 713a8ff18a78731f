// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::{ClientTarget, PadbusClientError};
use async_stream::stream;
use dashmap::{DashMap, mapref::entry::Entry};
use futures::Stream;
use padbus_core::{
  PADBUS_PROTOCOL_VERSION,
  errors::ErrorKind,
  message::{Notification, Report},
  util::async_manager,
};
use padbus_server::{Caller, PadbusServer};
use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info_span;
use tracing_futures::Instrument;

/// Highest serial [PadbusClient::add_target] will try.
const MAX_SERIAL: u32 = u16::MAX as u32;

/// An application's session on an in-process bus.
///
/// Dropping the client closes the session, which unplugs every target it still owns.
pub struct PadbusClient {
  server: Arc<PadbusServer>,
  caller: Caller,
  connected: AtomicBool,
  /// Cancellation tokens for running notification loops, keyed by serial.
  notification_tokens: Arc<DashMap<u32, CancellationToken>>,
}

impl PadbusClient {
  pub fn connect(server: Arc<PadbusServer>) -> Result<Self, PadbusClientError> {
    Self::connect_with_process_id(server, std::process::id())
  }

  pub fn connect_with_process_id(
    server: Arc<PadbusServer>,
    process_id: u32,
  ) -> Result<Self, PadbusClientError> {
    server.check_protocol_version(PADBUS_PROTOCOL_VERSION)?;
    let caller = server.open_session(process_id);
    info!(
      "Client connected to '{}' as session {}",
      server.name(),
      caller.session_id()
    );
    Ok(Self {
      server,
      caller,
      connected: AtomicBool::new(true),
      notification_tokens: Arc::new(DashMap::new()),
    })
  }

  pub fn caller(&self) -> Caller {
    self.caller
  }

  /// Plugs `target` in on the lowest free serial and returns that serial.
  pub async fn add_target(&self, target: &mut ClientTarget) -> Result<u32, PadbusClientError> {
    if target.is_connected() {
      return Err(PadbusClientError::AlreadyConnected);
    }
    for serial in 1..=MAX_SERIAL {
      match self
        .server
        .plug_in(
          &self.caller,
          serial,
          target.target_type(),
          target.vendor_id(),
          target.product_id(),
        )
        .await
      {
        Ok(()) => {
          target.mark_connected(serial);
          return Ok(serial);
        }
        Err(err) if err.kind() == ErrorKind::Conflict => continue,
        Err(err) => return Err(err.into()),
      }
    }
    Err(PadbusClientError::NoFreeSlot)
  }

  pub async fn remove_target(&self, target: &mut ClientTarget) -> Result<(), PadbusClientError> {
    let serial = target.connected_serial()?;
    if let Some((_, token)) = self.notification_tokens.remove(&serial) {
      token.cancel();
    }
    self.server.unplug(&self.caller, serial).await;
    target.mark_disconnected();
    Ok(())
  }

  /// Pushes new input state to a plugged-in target.
  pub async fn update<T>(&self, target: &ClientTarget, report: T) -> Result<(), PadbusClientError>
  where
    T: Into<Report>,
  {
    let serial = target.connected_serial()?;
    self
      .server
      .submit_report(&self.caller, serial, &report.into())
      .await?;
    Ok(())
  }

  pub async fn submit_init_packet(
    &self,
    target: &ClientTarget,
    packet: &[u8],
  ) -> Result<(), PadbusClientError> {
    let serial = target.connected_serial()?;
    self
      .server
      .submit_init_packet(&self.caller, serial, packet)
      .await?;
    Ok(())
  }

  pub fn get_user_index(&self, target: &ClientTarget) -> Result<u8, PadbusClientError> {
    let serial = target.connected_serial()?;
    Ok(self.server.get_user_index(&self.caller, serial)?)
  }

  /// Waits until the host has finished setting the target up.
  pub async fn wait_ready(&self, target: &ClientTarget) -> Result<(), PadbusClientError> {
    let serial = target.connected_serial()?;
    self.server.wait_device_ready(serial).await?;
    Ok(())
  }

  /// Calls `callback` with every notification the host sends to `target`, until the callback is
  /// unregistered or the target goes away.
  pub fn register_notification<F>(
    &self,
    target: &ClientTarget,
    callback: F,
  ) -> Result<(), PadbusClientError>
  where
    F: Fn(Notification) + Send + Sync + 'static,
  {
    let serial = target.connected_serial()?;
    let token = CancellationToken::new();
    match self.notification_tokens.entry(serial) {
      Entry::Occupied(_) => return Err(PadbusClientError::CallbackAlreadyRegistered(serial)),
      Entry::Vacant(entry) => {
        entry.insert(token.clone());
      }
    }
    let server = self.server.clone();
    let caller = self.caller;
    let tokens = self.notification_tokens.clone();
    async_manager::spawn(
      async move {
        loop {
          select! {
            _ = token.cancelled() => {
              debug!("Notification loop for target {} unregistered", serial);
              return;
            }
            result = server.request_notification(&caller, serial) => match result {
              Ok(notification) => callback(notification),
              Err(err) => {
                debug!("Notification loop for target {} stopping: {}", serial, err);
                break;
              }
            }
          }
        }
        tokens.remove(&serial);
      }
      .instrument(info_span!("Padbus Notification Loop", serial = serial)),
    );
    Ok(())
  }

  pub fn unregister_notification(&self, target: &ClientTarget) -> Result<(), PadbusClientError> {
    let serial = target.connected_serial()?;
    match self.notification_tokens.remove(&serial) {
      Some((_, token)) => {
        token.cancel();
        Ok(())
      }
      None => Err(PadbusClientError::CallbackNotFound(serial)),
    }
  }

  /// Notifications for `target` as a stream. Ends when the target is removed.
  pub fn notification_stream(
    &self,
    target: &ClientTarget,
  ) -> Result<impl Stream<Item = Notification> + use<>, PadbusClientError> {
    let serial = target.connected_serial()?;
    let server = self.server.clone();
    let caller = self.caller;
    Ok(stream! {
      while let Ok(notification) = server.request_notification(&caller, serial).await {
        yield notification;
      }
    })
  }

  /// Closes the session, unplugging every target it owns.
  pub async fn disconnect(&self) {
    if self.connected.swap(false, Ordering::SeqCst) {
      self.cancel_notification_loops();
      self.server.close_session(self.caller.session_id()).await;
    }
  }

  fn cancel_notification_loops(&self) {
    for entry in self.notification_tokens.iter() {
      entry.value().cancel();
    }
    self.notification_tokens.clear();
  }
}

impl Drop for PadbusClient {
  fn drop(&mut self) {
    if !self.connected.swap(false, Ordering::SeqCst) {
      return;
    }
    self.cancel_notification_loops();
    if tokio::runtime::Handle::try_current().is_err() {
      warn!(
        "Client for session {} dropped outside of a runtime, targets stay plugged in",
        self.caller.session_id()
      );
      return;
    }
    let server = self.server.clone();
    let session = self.caller.session_id();
    async_manager::spawn(async move {
      server.close_session(session).await;
    });
  }
}
