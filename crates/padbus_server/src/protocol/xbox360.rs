// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::protocol::{
  InTransferAction,
  PipeKind,
  ProtocolHandler,
  ProtocolTiming,
  TargetTimerStrategy,
  UsbDeviceDescriptor,
  protocol_setup,
};
use padbus_core::{
  errors::PadbusValidationError,
  message::{Notification, Report, TargetType, XusbReport},
};
use std::{
  sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
  time::Duration,
};

protocol_setup!(Xbox360, TargetType::Xbox360);

const CONFIGURATION_DESCRIPTOR: [u8; 153] = [
  0x09, 0x02, 0x99, 0x00, 0x04, 0x01, 0x00, 0xA0, 0xFA, 0x09, 0x04, 0x00, 0x00, 0x02, 0xFF, 0x5D,
  0x01, 0x00, 0x11, 0x21, 0x00, 0x01, 0x01, 0x25, 0x81, 0x14, 0x00, 0x00, 0x00, 0x00, 0x13, 0x01,
  0x08, 0x00, 0x00, 0x07, 0x05, 0x81, 0x03, 0x20, 0x00, 0x04, 0x07, 0x05, 0x01, 0x03, 0x20, 0x00,
  0x08, 0x09, 0x04, 0x01, 0x00, 0x04, 0xFF, 0x5D, 0x03, 0x00, 0x1B, 0x21, 0x00, 0x01, 0x01, 0x01,
  0x82, 0x40, 0x01, 0x02, 0x20, 0x16, 0x83, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x16, 0x03, 0x00,
  0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x05, 0x82, 0x03, 0x20, 0x00, 0x02, 0x07, 0x05, 0x02, 0x03,
  0x20, 0x00, 0x04, 0x07, 0x05, 0x83, 0x03, 0x20, 0x00, 0x40, 0x07, 0x05, 0x03, 0x03, 0x20, 0x00,
  0x10, 0x09, 0x04, 0x02, 0x00, 0x01, 0xFF, 0x5D, 0x02, 0x00, 0x09, 0x21, 0x00, 0x01, 0x01, 0x22,
  0x84, 0x07, 0x00, 0x07, 0x05, 0x84, 0x03, 0x20, 0x00, 0x10, 0x09, 0x04, 0x03, 0x00, 0x00, 0xFF,
  0xFD, 0x13, 0x04, 0x06, 0x41, 0x00, 0x01, 0x01, 0x03,
];

/// Packets handed to the first data pipe pulls after the target is prepared, in order.
pub const BOOT_SEQUENCE: [&[u8]; 7] = [
  &[0x01, 0x03, 0x0E],
  &[0x02, 0x03, 0x00],
  &[0x03, 0x03, 0x03],
  &[0x08, 0x03, 0x00],
  &[
    0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0xE4, 0xF2, 0xB3, 0xF8, 0x49, 0xF3, 0xB0, 0xFC, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
  ],
  &[0x01, 0x03, 0x03],
  &[0x05, 0x03, 0x00],
];

/// Delivered once on the holding pipe.
pub const CAPABILITIES_PACKET: [u8; 4] = [0x31, 0x3F, 0xCF, 0xDC];

pub const FRAME_SIZE: usize = 20;
const REPORT_OFFSET: usize = 2;

const LED_COMMAND_SIZE: usize = 3;
const RUMBLE_COMMAND_SIZE: usize = 8;
const LED_UNASSIGNED: u8 = u8::MAX;

pub struct Xbox360 {
  boot_index: AtomicUsize,
  capabilities_sent: AtomicBool,
  led_number: AtomicU8,
  large_motor: AtomicU8,
  small_motor: AtomicU8,
  flush_period: Option<Duration>,
}

impl Xbox360 {
  pub fn new(timing: &ProtocolTiming) -> Self {
    Self {
      boot_index: AtomicUsize::new(0),
      capabilities_sent: AtomicBool::new(false),
      led_number: AtomicU8::new(LED_UNASSIGNED),
      large_motor: AtomicU8::new(0),
      small_motor: AtomicU8::new(0),
      flush_period: timing.xbox360_flush_period(),
    }
  }
}

impl ProtocolHandler for Xbox360 {
  fn target_type(&self) -> TargetType {
    TargetType::Xbox360
  }

  fn description(&self) -> &'static str {
    "Virtual Xbox 360 Controller"
  }

  fn hardware_ids(&self, vendor_id: u16, product_id: u16) -> Vec<String> {
    vec![format!("USB\\VID_{:04X}&PID_{:04X}", vendor_id, product_id)]
  }

  fn compatible_ids(&self) -> Vec<String> {
    [
      "USB\\MS_COMP_XUSB10",
      "USB\\Class_FF&SubClass_5D&Prot_01",
      "USB\\Class_FF&SubClass_5D",
      "USB\\Class_FF",
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
  }

  fn device_descriptor(&self) -> UsbDeviceDescriptor {
    UsbDeviceDescriptor {
      device_class: 0xFF,
      device_subclass: 0xFF,
      device_protocol: 0xFF,
      max_packet_size: 0x08,
      bcd_device: 0x0114,
      manufacturer_index: 0x01,
      product_index: 0x02,
      serial_number_index: 0x03,
    }
  }

  fn configuration_descriptor(&self) -> &'static [u8] {
    &CONFIGURATION_DESCRIPTOR
  }

  fn default_frame(&self) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_SIZE];
    frame[1] = FRAME_SIZE as u8;
    frame
  }

  fn frame_report(&self, frame: &mut [u8], report: &Report) -> Result<(), PadbusValidationError> {
    let Report::Xbox360(report) = report else {
      return Err(PadbusValidationError::InvalidParameter(format!(
        "Xbox360 target cannot frame a {} report",
        report.target_type()
      )));
    };
    frame[REPORT_OFFSET..REPORT_OFFSET + XusbReport::SIZE].copy_from_slice(&report.to_bytes());
    Ok(())
  }

  fn suppresses_duplicates(&self) -> bool {
    true
  }

  fn has_handshake(&self) -> bool {
    true
  }

  fn handshake_complete(&self) -> bool {
    self.boot_index.load(Ordering::SeqCst) >= BOOT_SEQUENCE.len()
  }

  fn reset(&self) {
    self.boot_index.store(0, Ordering::SeqCst);
    self.capabilities_sent.store(false, Ordering::SeqCst);
    self.led_number.store(LED_UNASSIGNED, Ordering::SeqCst);
    self.large_motor.store(0, Ordering::SeqCst);
    self.small_motor.store(0, Ordering::SeqCst);
  }

  fn handle_in_transfer(&self, pipe: PipeKind, length: usize) -> InTransferAction {
    match pipe {
      PipeKind::Data => {
        // Claim the next boot packet, if any are left.
        match self
          .boot_index
          .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |index| {
            (index < BOOT_SEQUENCE.len()).then_some(index + 1)
          }) {
          Ok(index) => {
            debug!("Xbox360 boot packet {} delivered", index);
            InTransferAction::Complete(BOOT_SEQUENCE[index].to_vec())
          }
          Err(_) => InTransferAction::AwaitReport,
        }
      }
      PipeKind::Holding => {
        if length >= CAPABILITIES_PACKET.len()
          && self
            .capabilities_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
          InTransferAction::Complete(CAPABILITIES_PACKET.to_vec())
        } else {
          InTransferAction::Hold
        }
      }
    }
  }

  fn handle_out_transfer(&self, data: &[u8]) -> Option<Notification> {
    match data.len() {
      LED_COMMAND_SIZE if data[0] == 0x01 && data[1] == 0x03 && (0x02..=0x05).contains(&data[2]) => {
        let led = data[2] - 0x02;
        debug!("Xbox360 LED number assigned: {}", led);
        self.led_number.store(led, Ordering::SeqCst);
      }
      RUMBLE_COMMAND_SIZE => {
        self.large_motor.store(data[3], Ordering::SeqCst);
        self.small_motor.store(data[4], Ordering::SeqCst);
      }
      _ => trace!("Unhandled Xbox360 output transfer: {:?}", data),
    }
    Some(Notification::Xbox360 {
      large_motor: self.large_motor.load(Ordering::SeqCst),
      small_motor: self.small_motor.load(Ordering::SeqCst),
      led_number: self.user_index(),
    })
  }

  fn user_index(&self) -> Option<u8> {
    match self.led_number.load(Ordering::SeqCst) {
      LED_UNASSIGNED => None,
      led => Some(led),
    }
  }

  fn timer_strategy(&self) -> TargetTimerStrategy {
    match self.flush_period {
      Some(period) => TargetTimerStrategy::RepeatCachedFrame(period),
      None => TargetTimerStrategy::None,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::protocol::configuration_descriptor_query;

  fn handler() -> Xbox360 {
    Xbox360::new(&ProtocolTiming::new(None, Duration::from_millis(50)))
  }

  #[test]
  fn test_boot_sequence_then_reports() {
    let xbox = handler();
    for packet in BOOT_SEQUENCE.iter() {
      assert!(!xbox.handshake_complete());
      assert_eq!(
        xbox.handle_in_transfer(PipeKind::Data, 64),
        InTransferAction::Complete(packet.to_vec())
      );
    }
    assert!(xbox.handshake_complete());
    assert_eq!(
      xbox.handle_in_transfer(PipeKind::Data, 64),
      InTransferAction::AwaitReport
    );
    xbox.reset();
    assert!(!xbox.handshake_complete());
  }

  #[test]
  fn test_capabilities_delivered_once() {
    let xbox = handler();
    assert_eq!(
      xbox.handle_in_transfer(PipeKind::Holding, 2),
      InTransferAction::Hold
    );
    assert_eq!(
      xbox.handle_in_transfer(PipeKind::Holding, 4),
      InTransferAction::Complete(CAPABILITIES_PACKET.to_vec())
    );
    assert_eq!(
      xbox.handle_in_transfer(PipeKind::Holding, 4),
      InTransferAction::Hold
    );
  }

  #[test]
  fn test_led_and_rumble_output() {
    let xbox = handler();
    assert_eq!(xbox.user_index(), None);
    assert_eq!(
      xbox.handle_out_transfer(&[0x01, 0x03, 0x04]),
      Some(Notification::Xbox360 {
        large_motor: 0,
        small_motor: 0,
        led_number: Some(2)
      })
    );
    assert_eq!(
      xbox.handle_out_transfer(&[0x00, 0x08, 0x00, 0xC0, 0x40, 0x00, 0x00, 0x00]),
      Some(Notification::Xbox360 {
        large_motor: 0xC0,
        small_motor: 0x40,
        led_number: Some(2)
      })
    );
    // LED pattern outside the player slot range leaves the index alone.
    xbox.handle_out_transfer(&[0x01, 0x03, 0x0A]);
    assert_eq!(xbox.user_index(), Some(2));
  }

  #[test]
  fn test_frame_layout() {
    let xbox = handler();
    let mut frame = xbox.default_frame();
    let mut report = XusbReport::default();
    report.set_left_trigger(0x7F);
    xbox
      .frame_report(&mut frame, &Report::from(report))
      .expect("Test, assuming infallible.");
    assert_eq!(frame.len(), FRAME_SIZE);
    assert_eq!(&frame[..2], &[0x00, 0x14]);
    assert_eq!(frame[4], 0x7F);
    assert!(frame[14..].iter().all(|b| *b == 0));
  }

  #[test]
  fn test_configuration_descriptor_probe() {
    let xbox = handler();
    let probe = configuration_descriptor_query(xbox.configuration_descriptor(), 9);
    assert_eq!(probe.len(), 9);
    assert_eq!(probe[2], 0x99);
    assert_eq!(
      configuration_descriptor_query(xbox.configuration_descriptor(), 153).len(),
      153
    );
  }
}
