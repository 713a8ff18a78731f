// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::protocol::{
  ProtocolHandler,
  ProtocolTiming,
  TargetTimerStrategy,
  UsbDeviceDescriptor,
  protocol_setup,
};
use padbus_core::{
  errors::PadbusValidationError,
  message::{Notification, Report, TargetType, XgipReport},
};
use std::time::Duration;

protocol_setup!(XboxOne, TargetType::XboxOne);

const CONFIGURATION_DESCRIPTOR: [u8; 64] = [
  0x09, 0x02, 0x40, 0x00, 0x02, 0x01, 0x00, 0xC0, 0xFA, 0x09, 0x04, 0x00, 0x00, 0x02, 0xFF, 0x47,
  0xD0, 0x00, 0x07, 0x05, 0x81, 0x03, 0x40, 0x00, 0x04, 0x07, 0x05, 0x01, 0x03, 0x40, 0x00, 0x04,
  0x09, 0x04, 0x01, 0x00, 0x00, 0xFF, 0x47, 0xD0, 0x00, 0x09, 0x04, 0x01, 0x01, 0x02, 0xFF, 0x47,
  0xD0, 0x00, 0x07, 0x05, 0x02, 0x01, 0xE0, 0x00, 0x01, 0x07, 0x05, 0x83, 0x01, 0x80, 0x00, 0x01,
];

const DEFAULT_FRAME: [u8; 18] = [
  0x20, 0x00, 0x10, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xA3, 0xFD, 0xED, 0x05, 0x5B, 0x03,
  0x6F, 0x02,
];

pub const FRAME_SIZE: usize = 18;
const COUNTER_OFFSET: usize = 2;
const REPORT_OFFSET: usize = 4;

/// System init packets the owner must submit before the host sees the controller.
pub const INIT_PACKET_COUNT: usize = 15;
/// Largest init packet the owner can submit.
pub const MAX_INIT_PACKET_SIZE: usize = 64;

pub struct XboxOne {
  init_period: Duration,
}

impl XboxOne {
  pub fn new(timing: &ProtocolTiming) -> Self {
    Self {
      init_period: timing.xbox_one_init_period(),
    }
  }
}

impl ProtocolHandler for XboxOne {
  fn target_type(&self) -> TargetType {
    TargetType::XboxOne
  }

  fn description(&self) -> &'static str {
    "Virtual Xbox One Controller"
  }

  fn hardware_ids(&self, vendor_id: u16, product_id: u16) -> Vec<String> {
    vec![
      format!(
        "USB\\VID_{:04X}&PID_{:04X}&REV_0650",
        vendor_id, product_id
      ),
      format!("USB\\VID_{:04X}&PID_{:04X}", vendor_id, product_id),
    ]
  }

  fn compatible_ids(&self) -> Vec<String> {
    [
      "USB\\MS_COMP_XGIP10",
      "USB\\Class_FF&SubClass_47&Prot_D0",
      "USB\\Class_FF&SubClass_47",
      "USB\\Class_FF",
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
  }

  fn device_descriptor(&self) -> UsbDeviceDescriptor {
    UsbDeviceDescriptor {
      device_class: 0xFF,
      device_subclass: 0x47,
      device_protocol: 0xD0,
      max_packet_size: 0x40,
      bcd_device: 0x0650,
      manufacturer_index: 0x01,
      product_index: 0x02,
      serial_number_index: 0x03,
    }
  }

  fn configuration_descriptor(&self) -> &'static [u8] {
    &CONFIGURATION_DESCRIPTOR
  }

  fn default_frame(&self) -> Vec<u8> {
    DEFAULT_FRAME.to_vec()
  }

  fn frame_report(&self, frame: &mut [u8], report: &Report) -> Result<(), PadbusValidationError> {
    let Report::XboxOne(report) = report else {
      return Err(PadbusValidationError::InvalidParameter(format!(
        "XboxOne target cannot frame a {} report",
        report.target_type()
      )));
    };
    frame[COUNTER_OFFSET] = frame[COUNTER_OFFSET].wrapping_add(1);
    frame[REPORT_OFFSET..REPORT_OFFSET + XgipReport::SIZE].copy_from_slice(&report.to_bytes());
    Ok(())
  }

  fn has_handshake(&self) -> bool {
    true
  }

  fn handle_out_transfer(&self, data: &[u8]) -> Option<Notification> {
    debug!("XboxOne output transfer ({} bytes): {:?}", data.len(), data);
    None
  }

  fn supports_notifications(&self) -> bool {
    false
  }

  fn timer_strategy(&self) -> TargetTimerStrategy {
    TargetTimerStrategy::ReplayInitPackets(self.init_period)
  }

  fn init_packet_count(&self) -> Option<usize> {
    Some(INIT_PACKET_COUNT)
  }
}
