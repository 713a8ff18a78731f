// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Emulated controllers, as seen by the virtual transport.
//!
//! An [EmulationTarget] answers everything the transport asks of a USB device (descriptors, class
//! requests, IN and OUT transfers) and pairs the transport's pulls with its owner's pushes. The
//! family-specific parts live in a [ProtocolHandler](crate::protocol::ProtocolHandler).

mod timers;

use crate::{
  pairing_queue::PairingQueue,
  protocol::{
    ClassRequest,
    InTransferAction,
    PipeKind,
    ProtocolHandler,
    TargetTimerStrategy,
    configuration_descriptor_query,
    xbox_one::MAX_INIT_PACKET_SIZE,
  },
  session::{Caller, SessionId},
};
use futures::future::FutureExt;
use getset::{CopyGetters, Getters};
use instant::Instant;
use padbus_core::{
  errors::{
    PadbusError,
    PadbusResult,
    PadbusResultFuture,
    PadbusTargetError,
    PadbusValidationError,
  },
  message::{Notification, Report, TargetType},
  util::async_manager,
};
use serde::Serialize;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a target. `Removed` is terminal.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetState {
  Created,
  Handshaking,
  SteadyState,
  Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
  Device,
  Configuration,
  String(u8),
  HidReport,
}

/// A transfer issued by the virtual transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
  /// Host wants data, `length` is the size of its buffer.
  In { pipe: PipeKind, length: usize },
  /// Host sends output data (rumble, LEDs).
  Out { data: Vec<u8> },
}

/// Everything the transport needs to enumerate a target.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize)]
pub struct TargetIdentity {
  #[getset(get = "pub")]
  description: String,
  #[getset(get = "pub")]
  hardware_ids: Vec<String>,
  #[getset(get = "pub")]
  compatible_ids: Vec<String>,
  #[getset(get = "pub")]
  instance_id: String,
  #[getset(get_copy = "pub")]
  container_id: Uuid,
  #[getset(get_copy = "pub")]
  vendor_id: u16,
  #[getset(get_copy = "pub")]
  product_id: u16,
  #[getset(get = "pub")]
  device_descriptor: Vec<u8>,
}

pub(crate) struct ReportCache {
  frame: Vec<u8>,
  updated: Instant,
}

#[derive(Default)]
pub(crate) struct InitPacketStore {
  packets: VecDeque<Vec<u8>>,
  collected: usize,
}

#[derive(CopyGetters)]
pub struct EmulationTarget {
  #[getset(get_copy = "pub")]
  serial: u32,
  #[getset(get_copy = "pub")]
  target_type: TargetType,
  #[getset(get_copy = "pub")]
  vendor_id: u16,
  #[getset(get_copy = "pub")]
  product_id: u16,
  /// Session and process that plugged the target in.
  #[getset(get_copy = "pub")]
  owner: Caller,
  #[getset(get_copy = "pub")]
  container_id: Uuid,
  handler: Arc<dyn ProtocolHandler>,
  state: Arc<watch::Sender<TargetState>>,
  report_cache: Arc<Mutex<ReportCache>>,
  transfer_queue: Arc<PairingQueue<Vec<u8>>>,
  holding_queue: PairingQueue<Vec<u8>>,
  notification_queue: PairingQueue<Notification>,
  last_notification: Mutex<Option<Notification>>,
  init_packets: Arc<Mutex<InitPacketStore>>,
  token: CancellationToken,
}

impl EmulationTarget {
  /// Creates a target and starts its background work. Must be called from within a runtime.
  pub(crate) fn new(
    serial: u32,
    vendor_id: u16,
    product_id: u16,
    owner: Caller,
    handler: Arc<dyn ProtocolHandler>,
  ) -> Self {
    let (state, _) = watch::channel(TargetState::Created);
    let target = Self {
      serial,
      target_type: handler.target_type(),
      vendor_id,
      product_id,
      owner,
      container_id: Uuid::new_v4(),
      report_cache: Arc::new(Mutex::new(ReportCache {
        frame: handler.default_frame(),
        updated: Instant::now(),
      })),
      handler,
      state: Arc::new(state),
      transfer_queue: Arc::new(PairingQueue::new()),
      holding_queue: PairingQueue::new(),
      notification_queue: PairingQueue::new(),
      last_notification: Mutex::new(None),
      init_packets: Arc::new(Mutex::new(InitPacketStore::default())),
      token: CancellationToken::new(),
    };
    if let TargetTimerStrategy::RepeatCachedFrame(period) = target.handler.timer_strategy() {
      async_manager::spawn(timers::flush_cached_frame(
        serial,
        period,
        target.report_cache.clone(),
        target.transfer_queue.clone(),
        target.state.subscribe(),
        target.token.child_token(),
      ));
    }
    target
  }

  pub fn state(&self) -> TargetState {
    *self.state.borrow()
  }

  pub fn owner_session(&self) -> SessionId {
    self.owner.session_id()
  }

  /// Whether a caller may push reports to or receive notifications from this target.
  pub fn is_authorized(&self, caller: &Caller) -> bool {
    caller.is_internal() || caller.session_id() == self.owner.session_id()
  }

  pub fn check_access(&self, authorized: bool) -> Result<(), PadbusTargetError> {
    if authorized {
      Ok(())
    } else {
      Err(PadbusTargetError::AccessDenied(self.serial))
    }
  }

  pub fn check_type(&self, expected: TargetType) -> Result<(), PadbusTargetError> {
    if self.target_type == expected {
      Ok(())
    } else {
      Err(PadbusTargetError::TypeMismatch(
        self.serial,
        self.target_type,
        expected,
      ))
    }
  }

  pub fn prepare_identity(&self) -> TargetIdentity {
    TargetIdentity {
      description: self.handler.description().to_owned(),
      hardware_ids: self.handler.hardware_ids(self.vendor_id, self.product_id),
      compatible_ids: self.handler.compatible_ids(),
      instance_id: format!("{:02}", self.serial),
      container_id: self.container_id,
      vendor_id: self.vendor_id,
      product_id: self.product_id,
      device_descriptor: self
        .handler
        .device_descriptor()
        .to_bytes(self.vendor_id, self.product_id),
    }
  }

  /// Resets cached input to neutral and restarts the handshake.
  pub async fn prepare_runtime_state(&self) {
    self.handler.reset();
    {
      let mut cache = self.report_cache.lock().await;
      cache.frame = self.handler.default_frame();
      cache.updated = Instant::now();
    }
    *self.init_packets.lock().await = InitPacketStore::default();
    let next = if self.handler.has_handshake() {
      TargetState::Handshaking
    } else {
      TargetState::SteadyState
    };
    self.state.send_if_modified(|state| {
      if *state == TargetState::Removed || *state == next {
        false
      } else {
        *state = next;
        true
      }
    });
    info!(
      "Target {} ({}) runtime state prepared, now {}",
      self.serial,
      self.target_type,
      self.state()
    );
  }

  fn mark_ready(&self) {
    if mark_steady_state(&self.state) {
      info!("Target {} finished its handshake", self.serial);
    }
  }

  pub fn handle_descriptor_query(&self, kind: DescriptorKind, length: usize) -> Vec<u8> {
    match kind {
      DescriptorKind::Device => self
        .handler
        .device_descriptor()
        .to_bytes(self.vendor_id, self.product_id),
      DescriptorKind::Configuration => {
        configuration_descriptor_query(self.handler.configuration_descriptor(), length)
      }
      DescriptorKind::String(index) => match self.handler.string_descriptor(index) {
        Some(descriptor) if length < descriptor.len() => descriptor[..1].to_vec(),
        Some(descriptor) => descriptor,
        None => vec![],
      },
      DescriptorKind::HidReport => match self.handler.hid_report_descriptor() {
        Some(descriptor) if length >= descriptor.len() => descriptor.to_vec(),
        _ => vec![],
      },
    }
  }

  pub fn handle_class_request(&self, request: ClassRequest) -> Vec<u8> {
    self.handler.handle_class_request(request)
  }

  /// Routes a transport transfer. IN transfers return the bytes handed to the host, OUT transfers
  /// return nothing.
  pub async fn handle_transfer(&self, transfer: Transfer) -> PadbusResult<Vec<u8>> {
    match transfer {
      Transfer::In { pipe, length } => self.handle_in_transfer(pipe, length).await,
      Transfer::Out { data } => {
        self.handle_out_transfer(&data).await?;
        Ok(vec![])
      }
    }
  }

  pub async fn handle_in_transfer(&self, pipe: PipeKind, length: usize) -> PadbusResult<Vec<u8>> {
    match self.handler.handle_in_transfer(pipe, length) {
      InTransferAction::Complete(data) => {
        if self.handler.has_handshake() && self.handler.handshake_complete() {
          self.mark_ready();
        }
        Ok(data)
      }
      InTransferAction::AwaitReport => self
        .transfer_queue
        .pull()
        .await
        .map_err(|_| PadbusTargetError::Cancelled(self.serial).into()),
      InTransferAction::Hold => self
        .holding_queue
        .pull()
        .await
        .map_err(|_| PadbusTargetError::Cancelled(self.serial).into()),
    }
  }

  pub async fn handle_out_transfer(&self, data: &[u8]) -> PadbusResult<()> {
    if self.token.is_cancelled() {
      return Err(PadbusTargetError::Cancelled(self.serial).into());
    }
    if let Some(notification) = self.handler.handle_out_transfer(data) {
      *self.last_notification.lock().await = Some(notification);
      if self.notification_queue.push(notification).await.is_err() {
        trace!(
          "Target {} has no pending notification request, dropping {:?}",
          self.serial, notification
        );
      }
    }
    Ok(())
  }

  /// The host is shutting its pipes down. Releases every parked IN transfer.
  pub async fn abort_pipes(&self) {
    debug!("Aborting pipes on target {}", self.serial);
    self.transfer_queue.cancel_all().await;
    self.holding_queue.cancel_all().await;
  }

  pub async fn submit_report(&self, report: &Report, authorized: bool) -> PadbusResult<()> {
    self.check_access(authorized)?;
    self.check_type(report.target_type())?;
    // Held until the push completes so concurrent submits are ordered.
    let mut cache = self.report_cache.lock().await;
    let mut frame = cache.frame.clone();
    self.handler.frame_report(&mut frame, report)?;
    if self.handler.suppresses_duplicates() && frame == cache.frame {
      trace!("Target {} ignoring duplicate report", self.serial);
      return Ok(());
    }
    cache.frame = frame.clone();
    cache.updated = Instant::now();
    if self.transfer_queue.push(frame).await.is_err() {
      trace!("Target {} has no pending transfer, report cached", self.serial);
    }
    Ok(())
  }

  pub async fn submit_init_packet(&self, packet: &[u8], authorized: bool) -> PadbusResult<()> {
    self.check_access(authorized)?;
    let Some(count) = self.handler.init_packet_count() else {
      return Err(PadbusValidationError::InitPacketsUnsupported(self.target_type).into());
    };
    if packet.is_empty() || packet.len() > MAX_INIT_PACKET_SIZE {
      return Err(
        PadbusValidationError::InvalidInitPacketSize(packet.len(), MAX_INIT_PACKET_SIZE).into(),
      );
    }
    let mut store = self.init_packets.lock().await;
    if store.collected >= count {
      return Err(PadbusValidationError::InitPacketsComplete(count).into());
    }
    store.packets.push_back(packet.to_vec());
    store.collected += 1;
    debug!(
      "Target {} collected init packet {}/{}",
      self.serial, store.collected, count
    );
    if store.collected == count {
      if let TargetTimerStrategy::ReplayInitPackets(period) = self.handler.timer_strategy() {
        async_manager::spawn(timers::replay_init_packets(
          self.serial,
          period,
          self.init_packets.clone(),
          self.transfer_queue.clone(),
          self.state.clone(),
          self.token.child_token(),
        ));
      }
    }
    Ok(())
  }

  pub fn request_notification(self: &Arc<Self>, authorized: bool) -> PadbusResultFuture<Notification> {
    if let Err(err) = self.check_access(authorized) {
      return err.into();
    }
    if !self.handler.supports_notifications() {
      return PadbusValidationError::NotificationsUnsupported(self.target_type).into();
    }
    let target = self.clone();
    async move {
      target
        .notification_queue
        .pull()
        .await
        .map_err(|_| PadbusError::from(PadbusTargetError::Cancelled(target.serial)))
    }
    .boxed()
  }

  pub fn get_user_index(&self) -> PadbusResult<u8> {
    self
      .handler
      .user_index()
      .ok_or_else(|| PadbusTargetError::NotReady(self.serial).into())
  }

  /// Resolves once the handshake is done, or fails if the target is removed first.
  pub fn wait_ready(&self) -> PadbusResultFuture<()> {
    let mut receiver = self.state.subscribe();
    let serial = self.serial;
    async move {
      let state = receiver
        .wait_for(|state| {
          *state == TargetState::SteadyState || *state == TargetState::Removed
        })
        .await
        .map(|state| *state);
      match state {
        Ok(TargetState::SteadyState) => Ok(()),
        _ => Err(PadbusError::from(PadbusTargetError::Cancelled(serial))),
      }
    }
    .boxed()
  }

  pub async fn last_notification(&self) -> Option<Notification> {
    *self.last_notification.lock().await
  }

  /// Transport pulls currently parked on the data pipe.
  pub async fn pending_transfer_count(&self) -> usize {
    self.transfer_queue.pending_count().await
  }

  /// Application requests currently waiting for a notification.
  pub async fn pending_notification_count(&self) -> usize {
    self.notification_queue.pending_count().await
  }

  /// Tears the target down. Everything still waiting on it fails with a cancellation.
  pub(crate) async fn close(&self) {
    self.token.cancel();
    self.state.send_replace(TargetState::Removed);
    self.transfer_queue.close().await;
    self.holding_queue.close().await;
    self.notification_queue.close().await;
    info!("Target {} removed", self.serial);
  }
}

impl Drop for EmulationTarget {
  fn drop(&mut self) {
    // Timers outlive a target that was never closed otherwise.
    self.token.cancel();
  }
}

fn mark_steady_state(state: &watch::Sender<TargetState>) -> bool {
  state.send_if_modified(|state| {
    if *state == TargetState::Handshaking {
      *state = TargetState::SteadyState;
      true
    } else {
      false
    }
  })
}
