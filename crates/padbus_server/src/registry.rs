// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Serial-keyed table of every live target on the bus.

use crate::{
  protocol::{ProtocolHandlerFactory, ProtocolTiming},
  session::{Caller, SessionId},
  target::EmulationTarget,
};
use dashmap::{DashMap, mapref::entry::Entry};
use padbus_core::{
  errors::{PadbusResult, PadbusTargetError, PadbusValidationError},
  message::TargetType,
};
use std::{collections::HashMap, sync::Arc};

/// Serial value that addresses every target at once in [TargetRegistry::remove].
pub const ALL_TARGETS: u32 = 0;

pub struct TargetRegistry {
  targets: Arc<DashMap<u32, Arc<EmulationTarget>>>,
  protocol_map: HashMap<TargetType, Arc<dyn ProtocolHandlerFactory>>,
  timing: ProtocolTiming,
}

impl TargetRegistry {
  pub fn new(
    protocol_map: HashMap<TargetType, Arc<dyn ProtocolHandlerFactory>>,
    timing: ProtocolTiming,
  ) -> Self {
    Self {
      targets: Arc::new(DashMap::new()),
      protocol_map,
      timing,
    }
  }

  /// Creates a target and inserts it under `serial`.
  ///
  /// If either id is missing or zero, the target type's default vendor and product ids are used.
  pub fn add(
    &self,
    serial: u32,
    target_type: TargetType,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    owner: Caller,
  ) -> PadbusResult<Arc<EmulationTarget>> {
    if serial == 0 {
      return Err(PadbusValidationError::ZeroSerial.into());
    }
    let Some(factory) = self.protocol_map.get(&target_type) else {
      return Err(PadbusValidationError::UnknownTargetType(target_type as u8).into());
    };
    let (vendor_id, product_id) = match (vendor_id, product_id) {
      (Some(vid), Some(pid)) if vid != 0 && pid != 0 => (vid, pid),
      _ => (
        target_type.default_vendor_id(),
        target_type.default_product_id(),
      ),
    };
    match self.targets.entry(serial) {
      Entry::Occupied(_) => Err(PadbusTargetError::AlreadyExists(serial).into()),
      Entry::Vacant(entry) => {
        let target = Arc::new(EmulationTarget::new(
          serial,
          vendor_id,
          product_id,
          owner,
          factory.create(&self.timing),
        ));
        entry.insert(target.clone());
        Ok(target)
      }
    }
  }

  /// Removes the target at `serial`, or every target for [ALL_TARGETS], that `session` owns. Internal
  /// callers remove regardless of owner. Returns how many targets were removed.
  pub async fn remove(&self, serial: u32, session: SessionId, is_internal: bool) -> usize {
    let matches = |target: &Arc<EmulationTarget>| is_internal || target.owner_session() == session;
    // Snapshot first so no map shard lock is held across the awaits below.
    let candidates: Vec<u32> = if serial == ALL_TARGETS {
      self
        .targets
        .iter()
        .filter(|entry| matches(entry.value()))
        .map(|entry| *entry.key())
        .collect()
    } else {
      vec![serial]
    };
    let mut removed = 0;
    for candidate in candidates {
      let Some((_, target)) = self
        .targets
        .remove_if(&candidate, |_, target| matches(target))
      else {
        continue;
      };
      target.close().await;
      removed += 1;
    }
    removed
  }

  /// Drops every target owned by a session that went away.
  pub async fn on_session_closed(&self, session: SessionId) -> usize {
    let removed = self.remove(ALL_TARGETS, session, false).await;
    if removed > 0 {
      info!(
        "Session {} closed, removed {} orphaned target(s)",
        session, removed
      );
    }
    removed
  }

  pub fn lookup(&self, serial: u32) -> PadbusResult<Arc<EmulationTarget>> {
    self
      .targets
      .get(&serial)
      .map(|entry| entry.value().clone())
      .ok_or_else(|| PadbusTargetError::NoSuchDevice(serial).into())
  }

  pub fn lookup_typed(
    &self,
    target_type: TargetType,
    serial: u32,
  ) -> PadbusResult<Arc<EmulationTarget>> {
    let target = self.lookup(serial)?;
    target.check_type(target_type)?;
    Ok(target)
  }

  pub fn serials(&self) -> Vec<u32> {
    let mut serials: Vec<u32> = self.targets.iter().map(|entry| *entry.key()).collect();
    serials.sort_unstable();
    serials
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }
}
