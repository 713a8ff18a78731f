// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Per-family protocol handling: descriptor tables, handshakes and report framing.

pub mod dualshock4;
pub mod xbox360;
pub mod xbox_one;

use byteorder::{ByteOrder, LittleEndian};
use getset::CopyGetters;
use padbus_core::{
  errors::PadbusValidationError,
  message::{Notification, Report, TargetType},
};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Which of a target's IN pipes a transfer was issued on.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PipeKind {
  /// Interrupt pipe carrying input reports.
  Data,
  /// Secondary pipe the host keeps a request parked on.
  Holding,
}

/// What a target should do with an IN transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InTransferAction {
  /// Answer right away with these bytes.
  Complete(Vec<u8>),
  /// Pair with the next report the owner submits.
  AwaitReport,
  /// Park until the pipe is aborted or the target goes away.
  Hold,
}

/// HID class requests the transport may issue on the control pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRequest {
  GetFeatureReport(u8),
  SetFeatureReport(u8),
}

/// Background work a target needs while it is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetTimerStrategy {
  /// No timer.
  None,
  /// If no fresh report was submitted within the period, hand the cached frame to whichever data
  /// pull is waiting.
  RepeatCachedFrame(Duration),
  /// Once all init packets are collected, deliver one per period through the data pipe.
  ReplayInitPackets(Duration),
}

/// Timing knobs handed to protocol handlers on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ProtocolTiming {
  xbox360_flush_period: Option<Duration>,
  xbox_one_init_period: Duration,
}

impl ProtocolTiming {
  pub fn new(xbox360_flush_period: Option<Duration>, xbox_one_init_period: Duration) -> Self {
    Self {
      xbox360_flush_period,
      xbox_one_init_period,
    }
  }
}

impl Default for ProtocolTiming {
  fn default() -> Self {
    Self::new(Some(Duration::from_millis(5)), Duration::from_millis(50))
  }
}

/// Fields of the standard USB device descriptor that vary between families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct UsbDeviceDescriptor {
  device_class: u8,
  device_subclass: u8,
  device_protocol: u8,
  max_packet_size: u8,
  bcd_device: u16,
  manufacturer_index: u8,
  product_index: u8,
  serial_number_index: u8,
}

impl UsbDeviceDescriptor {
  pub const SIZE: usize = 18;

  pub fn to_bytes(&self, vendor_id: u16, product_id: u16) -> Vec<u8> {
    let mut buf = vec![0u8; Self::SIZE];
    buf[0] = Self::SIZE as u8;
    buf[1] = 0x01;
    LittleEndian::write_u16(&mut buf[2..4], 0x0200);
    buf[4] = self.device_class;
    buf[5] = self.device_subclass;
    buf[6] = self.device_protocol;
    buf[7] = self.max_packet_size;
    LittleEndian::write_u16(&mut buf[8..10], vendor_id);
    LittleEndian::write_u16(&mut buf[10..12], product_id);
    LittleEndian::write_u16(&mut buf[12..14], self.bcd_device);
    buf[14] = self.manufacturer_index;
    buf[15] = self.product_index;
    buf[16] = self.serial_number_index;
    buf[17] = 0x01;
    buf
  }
}

/// Length of the configuration descriptor header. A query for exactly this many bytes is a size
/// probe.
pub const CONFIGURATION_HEADER_SIZE: usize = 9;

/// Answers a configuration descriptor query against a full descriptor table.
pub fn configuration_descriptor_query(table: &[u8], length: usize) -> Vec<u8> {
  if length == CONFIGURATION_HEADER_SIZE {
    table[..CONFIGURATION_HEADER_SIZE].to_vec()
  } else if length >= table.len() {
    table.to_vec()
  } else {
    vec![]
  }
}

pub trait ProtocolHandlerFactory: Send + Sync {
  fn target_type(&self) -> TargetType;
  fn create(&self, timing: &ProtocolTiming) -> Arc<dyn ProtocolHandler>;
}

/// Behavior of one device family. One handler instance exists per plugged-in target and holds that
/// target's protocol state.
pub trait ProtocolHandler: Sync + Send {
  fn target_type(&self) -> TargetType;

  fn description(&self) -> &'static str;

  fn hardware_ids(&self, vendor_id: u16, product_id: u16) -> Vec<String>;

  fn compatible_ids(&self) -> Vec<String>;

  fn device_descriptor(&self) -> UsbDeviceDescriptor;

  fn configuration_descriptor(&self) -> &'static [u8];

  fn string_descriptor(&self, _index: u8) -> Option<Vec<u8>> {
    None
  }

  fn hid_report_descriptor(&self) -> Option<&'static [u8]> {
    None
  }

  /// Frame the transport receives before any report was submitted.
  fn default_frame(&self) -> Vec<u8>;

  /// Writes `report` into a cached frame.
  fn frame_report(&self, frame: &mut [u8], report: &Report) -> Result<(), PadbusValidationError>;

  /// Whether a report identical to the cached one should be swallowed instead of completing a
  /// pending pull.
  fn suppresses_duplicates(&self) -> bool {
    false
  }

  fn has_handshake(&self) -> bool {
    false
  }

  fn handshake_complete(&self) -> bool {
    true
  }

  /// Resets handshake state. Called whenever the target's runtime state is prepared.
  fn reset(&self) {}

  fn handle_in_transfer(&self, pipe: PipeKind, _length: usize) -> InTransferAction {
    match pipe {
      PipeKind::Data => InTransferAction::AwaitReport,
      PipeKind::Holding => InTransferAction::Hold,
    }
  }

  /// Processes an OUT transfer, returning the notification it produces, if any.
  fn handle_out_transfer(&self, _data: &[u8]) -> Option<Notification> {
    None
  }

  fn supports_notifications(&self) -> bool {
    true
  }

  fn user_index(&self) -> Option<u8> {
    None
  }

  fn handle_class_request(&self, _request: ClassRequest) -> Vec<u8> {
    vec![]
  }

  fn timer_strategy(&self) -> TargetTimerStrategy {
    TargetTimerStrategy::None
  }

  /// Number of init packets the owner must submit before the handshake can run.
  fn init_packet_count(&self) -> Option<usize> {
    None
  }
}

macro_rules! protocol_setup {
  ( $protocol_name:ident, $target_type:expr ) => {
    paste::paste! {
      pub mod setup {
        use std::sync::Arc;
        use padbus_core::message::TargetType;
        use $crate::protocol::{ProtocolHandler, ProtocolHandlerFactory, ProtocolTiming};

        #[derive(Default)]
        pub struct [< $protocol_name HandlerFactory >] {}

        impl ProtocolHandlerFactory for [< $protocol_name HandlerFactory >] {
          fn target_type(&self) -> TargetType {
            $target_type
          }

          fn create(&self, timing: &ProtocolTiming) -> Arc<dyn ProtocolHandler> {
            Arc::new(super::$protocol_name::new(timing))
          }
        }
      }
    }
  };
}

pub(crate) use protocol_setup;

pub fn get_default_protocol_map() -> HashMap<TargetType, Arc<dyn ProtocolHandlerFactory>> {
  let mut map = HashMap::new();
  fn add_to_protocol_map<T>(
    map: &mut HashMap<TargetType, Arc<dyn ProtocolHandlerFactory>>,
    factory: T,
  ) where
    T: ProtocolHandlerFactory + 'static,
  {
    let factory = Arc::new(factory);
    map.insert(factory.target_type(), factory);
  }

  add_to_protocol_map(&mut map, xbox360::setup::Xbox360HandlerFactory::default());
  add_to_protocol_map(&mut map, xbox_one::setup::XboxOneHandlerFactory::default());
  add_to_protocol_map(
    &mut map,
    dualshock4::setup::DualShock4HandlerFactory::default(),
  );
  map
}
