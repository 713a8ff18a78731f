// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::PadbusClientError;
use getset::CopyGetters;
use padbus_core::message::TargetType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTargetState {
  Initialized,
  Connected,
  Disconnected,
}

/// A controller an application wants on the bus. Ids left unset fall back to the type's defaults
/// when the target is plugged in.
#[derive(Debug, Clone, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ClientTarget {
  target_type: TargetType,
  serial: Option<u32>,
  vendor_id: Option<u16>,
  product_id: Option<u16>,
  state: ClientTargetState,
}

impl ClientTarget {
  pub fn new(target_type: TargetType) -> Self {
    Self {
      target_type,
      serial: None,
      vendor_id: None,
      product_id: None,
      state: ClientTargetState::Initialized,
    }
  }

  pub fn xbox360() -> Self {
    Self::new(TargetType::Xbox360)
  }

  pub fn dualshock4() -> Self {
    Self::new(TargetType::DualShock4)
  }

  pub fn xbox_one() -> Self {
    Self::new(TargetType::XboxOne)
  }

  pub fn is_connected(&self) -> bool {
    self.state == ClientTargetState::Connected
  }

  pub fn set_vendor_id(&mut self, vendor_id: u16) -> Result<(), PadbusClientError> {
    if self.is_connected() {
      return Err(PadbusClientError::AlreadyConnected);
    }
    self.vendor_id = Some(vendor_id);
    Ok(())
  }

  pub fn set_product_id(&mut self, product_id: u16) -> Result<(), PadbusClientError> {
    if self.is_connected() {
      return Err(PadbusClientError::AlreadyConnected);
    }
    self.product_id = Some(product_id);
    Ok(())
  }

  /// Serial of a plugged-in target.
  pub(crate) fn connected_serial(&self) -> Result<u32, PadbusClientError> {
    match (self.state, self.serial) {
      (ClientTargetState::Connected, Some(serial)) => Ok(serial),
      _ => Err(PadbusClientError::TargetNotPluggedIn),
    }
  }

  pub(crate) fn mark_connected(&mut self, serial: u32) {
    self.serial = Some(serial);
    self.state = ClientTargetState::Connected;
  }

  pub(crate) fn mark_disconnected(&mut self) {
    self.serial = None;
    self.state = ClientTargetState::Disconnected;
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_ids_locked_while_connected() {
    let mut target = ClientTarget::dualshock4();
    target
      .set_vendor_id(0x1234)
      .expect("Test, assuming infallible.");
    target.mark_connected(3);
    assert_eq!(target.connected_serial(), Ok(3));
    assert_eq!(
      target.set_product_id(0x5678),
      Err(PadbusClientError::AlreadyConnected)
    );
    target.mark_disconnected();
    assert_eq!(
      target.connected_serial(),
      Err(PadbusClientError::TargetNotPluggedIn)
    );
    assert!(target.set_product_id(0x5678).is_ok());
    assert_eq!(target.vendor_id(), Some(0x1234));
  }
}
