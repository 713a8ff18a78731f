// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::{
  registry::{ALL_TARGETS, TargetRegistry},
  session::{Caller, SessionId},
  target::EmulationTarget,
};
use futures::future::FutureExt;
use padbus_core::{
  PADBUS_PROTOCOL_VERSION,
  errors::{
    PadbusHandshakeError,
    PadbusResult,
    PadbusResultFuture,
    PadbusValidationError,
  },
  message::{Notification, Report, TargetType},
};
use std::{
  fmt,
  sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
  },
};
use tracing::info_span;
use tracing_futures::Instrument;

/// Front door of the bus. Maps application and transport requests onto targets, checking caller
/// identity on the way in.
pub struct PadbusServer {
  /// Name of the server, mostly for logging.
  name: String,
  registry: Arc<TargetRegistry>,
  /// Next session id to hand out. 0 is reserved for internal callers.
  next_session: AtomicU32,
}

impl fmt::Debug for PadbusServer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PadbusServer")
      .field("name", &self.name)
      .field("targets", &self.registry.serials())
      .finish()
  }
}

fn check_serial(serial: u32) -> PadbusResult<()> {
  if serial == 0 {
    Err(PadbusValidationError::ZeroSerial.into())
  } else {
    Ok(())
  }
}

impl PadbusServer {
  pub(super) fn new(name: &str, registry: TargetRegistry) -> Self {
    Self {
      name: name.to_owned(),
      registry: Arc::new(registry),
      next_session: AtomicU32::new(1),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn registry(&self) -> Arc<TargetRegistry> {
    self.registry.clone()
  }

  pub fn check_protocol_version(&self, version: u32) -> PadbusResult<()> {
    if version == PADBUS_PROTOCOL_VERSION {
      Ok(())
    } else {
      warn!(
        "Client protocol version {} does not match server version {}",
        version, PADBUS_PROTOCOL_VERSION
      );
      Err(PadbusHandshakeError::VersionMismatch(version, PADBUS_PROTOCOL_VERSION).into())
    }
  }

  /// Opens a new session for an application running in `process_id`.
  pub fn open_session(&self, process_id: u32) -> Caller {
    let session = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed));
    debug!("Opened session {} for process {}", session, process_id);
    Caller::new(process_id, session)
  }

  /// Closes a session, unplugging every target it still owns.
  pub async fn close_session(&self, session: SessionId) {
    debug!("Closing session {}", session);
    self.registry.on_session_closed(session).await;
  }

  pub async fn plug_in(
    &self,
    caller: &Caller,
    serial: u32,
    target_type: TargetType,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
  ) -> PadbusResult<()> {
    let target = self
      .registry
      .add(serial, target_type, vendor_id, product_id, *caller)?;
    target.prepare_runtime_state().await;
    info!(
      "Plugged in {} target {} ({:04X}:{:04X}) for session {}",
      target_type,
      serial,
      target.vendor_id(),
      target.product_id(),
      caller.session_id()
    );
    Ok(())
  }

  /// Unplugs the target at `serial`, or every target the caller may remove if `serial` is 0.
  /// Succeeds even if nothing matched. Returns how many targets were removed.
  pub async fn unplug(&self, caller: &Caller, serial: u32) -> usize {
    let removed = self
      .registry
      .remove(serial, caller.session_id(), caller.is_internal())
      .await;
    info!(
      "Session {} unplugged {} target(s) at serial {}",
      caller.session_id(),
      removed,
      serial
    );
    removed
  }

  pub async fn submit_report(&self, caller: &Caller, serial: u32, report: &Report) -> PadbusResult<()> {
    check_serial(serial)?;
    let target = self.registry.lookup(serial)?;
    target
      .submit_report(report, target.is_authorized(caller))
      .instrument(info_span!("Padbus Submit Report", serial = serial))
      .await
  }

  /// Feeds one system init packet to an Xbox One target.
  pub async fn submit_init_packet(
    &self,
    caller: &Caller,
    serial: u32,
    packet: &[u8],
  ) -> PadbusResult<()> {
    check_serial(serial)?;
    let target = self.registry.lookup(serial)?;
    let authorized = target.is_authorized(caller);
    target.check_access(authorized)?;
    target.check_type(TargetType::XboxOne)?;
    target.submit_init_packet(packet, authorized).await
  }

  /// Waits for the next notification the host sends to `serial`.
  ///
  /// Identity checks happen before this returns. The returned future only fails with a
  /// cancellation if the target is removed while waiting.
  pub fn request_notification(
    &self,
    caller: &Caller,
    serial: u32,
  ) -> PadbusResultFuture<Notification> {
    if let Err(err) = check_serial(serial) {
      return err.into();
    }
    let target = match self.registry.lookup(serial) {
      Ok(target) => target,
      Err(err) => return err.into(),
    };
    target
      .request_notification(target.is_authorized(caller))
      .instrument(info_span!("Padbus Notification Request", serial = serial))
      .boxed()
  }

  pub fn get_user_index(&self, caller: &Caller, serial: u32) -> PadbusResult<u8> {
    check_serial(serial)?;
    let target = self.registry.lookup(serial)?;
    target.check_access(target.is_authorized(caller))?;
    target.check_type(TargetType::Xbox360)?;
    target.get_user_index()
  }

  /// Resolves once `serial` has finished its handshake.
  pub fn wait_device_ready(&self, serial: u32) -> PadbusResultFuture<()> {
    if let Err(err) = check_serial(serial) {
      return err.into();
    }
    match self.registry.lookup(serial) {
      Ok(target) => target.wait_ready(),
      Err(err) => err.into(),
    }
  }

  /// Hands the transport the target at `serial`.
  pub fn target(&self, serial: u32) -> PadbusResult<Arc<EmulationTarget>> {
    check_serial(serial)?;
    self.registry.lookup(serial)
  }

  pub fn target_typed(
    &self,
    target_type: TargetType,
    serial: u32,
  ) -> PadbusResult<Arc<EmulationTarget>> {
    check_serial(serial)?;
    self.registry.lookup_typed(target_type, serial)
  }

  /// Removes every target on the bus.
  pub async fn shutdown(&self) {
    let removed = self
      .registry
      .remove(ALL_TARGETS, SessionId::INTERNAL, true)
      .await;
    info!("Server '{}' shut down, removed {} target(s)", self.name, removed);
  }
}
