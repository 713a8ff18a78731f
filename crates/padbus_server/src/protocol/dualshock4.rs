// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::protocol::{
  ClassRequest,
  ProtocolHandler,
  ProtocolTiming,
  UsbDeviceDescriptor,
  protocol_setup,
};
use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use padbus_core::{
  errors::PadbusValidationError,
  message::{Ds4Report, Ds4ReportEx, LightbarColor, Notification, Report, TargetType},
};

protocol_setup!(DualShock4, TargetType::DualShock4);

const CONFIGURATION_DESCRIPTOR: [u8; 41] = [
  0x09, 0x02, 0x29, 0x00, 0x01, 0x01, 0x00, 0xC0, 0xFA, 0x09, 0x04, 0x00, 0x00, 0x02, 0x03, 0x00,
  0x00, 0x00, 0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0xD3, 0x01, 0x07, 0x05, 0x84, 0x03, 0x40,
  0x00, 0x05, 0x07, 0x05, 0x03, 0x03, 0x40, 0x00, 0x05,
];

const HID_REPORT_DESCRIPTOR: [u8; 467] = [
  0x05, 0x01, 0x09, 0x05, 0xA1, 0x01, 0x85, 0x01, 0x09, 0x30, 0x09, 0x31, 0x09, 0x32, 0x09, 0x35,
  0x15, 0x00, 0x26, 0xFF, 0x00, 0x75, 0x08, 0x95, 0x04, 0x81, 0x02, 0x09, 0x39, 0x15, 0x00, 0x25,
  0x07, 0x35, 0x00, 0x46, 0x3B, 0x01, 0x65, 0x14, 0x75, 0x04, 0x95, 0x01, 0x81, 0x42, 0x65, 0x00,
  0x05, 0x09, 0x19, 0x01, 0x29, 0x0E, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x0E, 0x81, 0x02,
  0x06, 0x00, 0xFF, 0x09, 0x20, 0x75, 0x06, 0x95, 0x01, 0x15, 0x00, 0x25, 0x7F, 0x81, 0x02, 0x05,
  0x01, 0x09, 0x33, 0x09, 0x34, 0x15, 0x00, 0x26, 0xFF, 0x00, 0x75, 0x08, 0x95, 0x02, 0x81, 0x02,
  0x06, 0x00, 0xFF, 0x09, 0x21, 0x95, 0x36, 0x81, 0x02, 0x85, 0x05, 0x09, 0x22, 0x95, 0x1F, 0x91,
  0x02, 0x85, 0x04, 0x09, 0x23, 0x95, 0x24, 0xB1, 0x02, 0x85, 0x02, 0x09, 0x24, 0x95, 0x24, 0xB1,
  0x02, 0x85, 0x08, 0x09, 0x25, 0x95, 0x03, 0xB1, 0x02, 0x85, 0x10, 0x09, 0x26, 0x95, 0x04, 0xB1,
  0x02, 0x85, 0x11, 0x09, 0x27, 0x95, 0x02, 0xB1, 0x02, 0x85, 0x12, 0x06, 0x02, 0xFF, 0x09, 0x21,
  0x95, 0x0F, 0xB1, 0x02, 0x85, 0x13, 0x09, 0x22, 0x95, 0x16, 0xB1, 0x02, 0x85, 0x14, 0x06, 0x05,
  0xFF, 0x09, 0x20, 0x95, 0x10, 0xB1, 0x02, 0x85, 0x15, 0x09, 0x21, 0x95, 0x2C, 0xB1, 0x02, 0x06,
  0x80, 0xFF, 0x85, 0x80, 0x09, 0x20, 0x95, 0x06, 0xB1, 0x02, 0x85, 0x81, 0x09, 0x21, 0x95, 0x06,
  0xB1, 0x02, 0x85, 0x82, 0x09, 0x22, 0x95, 0x05, 0xB1, 0x02, 0x85, 0x83, 0x09, 0x23, 0x95, 0x01,
  0xB1, 0x02, 0x85, 0x84, 0x09, 0x24, 0x95, 0x04, 0xB1, 0x02, 0x85, 0x85, 0x09, 0x25, 0x95, 0x06,
  0xB1, 0x02, 0x85, 0x86, 0x09, 0x26, 0x95, 0x06, 0xB1, 0x02, 0x85, 0x87, 0x09, 0x27, 0x95, 0x23,
  0xB1, 0x02, 0x85, 0x88, 0x09, 0x28, 0x95, 0x22, 0xB1, 0x02, 0x85, 0x89, 0x09, 0x29, 0x95, 0x02,
  0xB1, 0x02, 0x85, 0x90, 0x09, 0x30, 0x95, 0x05, 0xB1, 0x02, 0x85, 0x91, 0x09, 0x31, 0x95, 0x03,
  0xB1, 0x02, 0x85, 0x92, 0x09, 0x32, 0x95, 0x03, 0xB1, 0x02, 0x85, 0x93, 0x09, 0x33, 0x95, 0x0C,
  0xB1, 0x02, 0x85, 0xA0, 0x09, 0x40, 0x95, 0x06, 0xB1, 0x02, 0x85, 0xA1, 0x09, 0x41, 0x95, 0x01,
  0xB1, 0x02, 0x85, 0xA2, 0x09, 0x42, 0x95, 0x01, 0xB1, 0x02, 0x85, 0xA3, 0x09, 0x43, 0x95, 0x30,
  0xB1, 0x02, 0x85, 0xA4, 0x09, 0x44, 0x95, 0x0D, 0xB1, 0x02, 0x85, 0xA5, 0x09, 0x45, 0x95, 0x15,
  0xB1, 0x02, 0x85, 0xA6, 0x09, 0x46, 0x95, 0x15, 0xB1, 0x02, 0x85, 0xF0, 0x09, 0x47, 0x95, 0x3F,
  0xB1, 0x02, 0x85, 0xF1, 0x09, 0x48, 0x95, 0x3F, 0xB1, 0x02, 0x85, 0xF2, 0x09, 0x49, 0x95, 0x0F,
  0xB1, 0x02, 0x85, 0xA7, 0x09, 0x4A, 0x95, 0x01, 0xB1, 0x02, 0x85, 0xA8, 0x09, 0x4B, 0x95, 0x01,
  0xB1, 0x02, 0x85, 0xA9, 0x09, 0x4C, 0x95, 0x08, 0xB1, 0x02, 0x85, 0xAA, 0x09, 0x4E, 0x95, 0x01,
  0xB1, 0x02, 0x85, 0xAB, 0x09, 0x4F, 0x95, 0x39, 0xB1, 0x02, 0x85, 0xAC, 0x09, 0x50, 0x95, 0x39,
  0xB1, 0x02, 0x85, 0xAD, 0x09, 0x51, 0x95, 0x0B, 0xB1, 0x02, 0x85, 0xAE, 0x09, 0x52, 0x95, 0x01,
  0xB1, 0x02, 0x85, 0xAF, 0x09, 0x53, 0x95, 0x02, 0xB1, 0x02, 0x85, 0xB0, 0x09, 0x54, 0x95, 0x3F,
  0xB1, 0x02, 0xC0,
];

const DEFAULT_FRAME: [u8; 64] = [
  0x01, 0x82, 0x7F, 0x7E, 0x80, 0x08, 0x00, 0x58, 0x00, 0x00, 0xFD, 0x63, 0x06, 0x03, 0x00, 0xFE,
  0xFF, 0xFC, 0xFF, 0x79, 0xFD, 0x1B, 0x14, 0xD1, 0xE9, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1B, 0x00,
  0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00,
  0x80, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00,
];

const FEATURE_REPORT_A3: [u8; 49] = [
  0xA3, 0x41, 0x75, 0x67, 0x20, 0x20, 0x33, 0x20, 0x32, 0x30, 0x31, 0x33, 0x00, 0x00, 0x00, 0x00,
  0x00, 0x30, 0x37, 0x3A, 0x30, 0x31, 0x3A, 0x31, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
  0x00, 0x00, 0x01, 0x00, 0x31, 0x03, 0x00, 0x00, 0x00, 0x49, 0x00, 0x05, 0x00, 0x00, 0x80, 0x03,
  0x00,
];

const FEATURE_REPORT_02: [u8; 37] = [
  0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x87, 0x22, 0x7B, 0xDD, 0xB2, 0x22, 0x47, 0xDD, 0xBD,
  0x22, 0x43, 0xDD, 0x1C, 0x02, 0x1C, 0x02, 0x7F, 0x1E, 0x2E, 0xDF, 0x60, 0x1F, 0x4C, 0xE0, 0x3A,
  0x1D, 0xC6, 0xDE, 0x08, 0x00,
];

const FEATURE_REPORT_12: [u8; 16] = [
  0x12, 0x8B, 0x09, 0x07, 0x6D, 0x66, 0x1C, 0x08, 0x25, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const FEATURE_REPORT_13: [u8; 23] = [
  0x13, 0xAC, 0x9E, 0x17, 0x94, 0x05, 0xB0, 0x56, 0xE8, 0x81, 0x38, 0x08, 0x06, 0x51, 0x41, 0xC0,
  0x7F, 0x12, 0xAA, 0xD9, 0x66, 0x3C, 0xCE,
];

const FEATURE_REPORT_14: [u8; 17] = [
  0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
  0x00,
];

pub const FRAME_SIZE: usize = 64;
const REPORT_OFFSET: usize = 1;
const OUTPUT_STATE_OFFSET: usize = 4;
const OUTPUT_STATE_SIZE: usize = 5;

const FEATURE_REPORT_MAC_ADDRESSES: u8 = 0x12;
const TARGET_MAC_OFFSET: usize = 1;
const HOST_MAC_OFFSET: usize = 10;
const MAC_VENDOR_PREFIX: [u8; 3] = [0xC0, 0x13, 0x37];

const LANGUAGE_ID_DESCRIPTOR: [u8; 4] = [0x04, 0x03, 0x09, 0x04];
static MANUFACTURER_STRING_DESCRIPTOR: Lazy<Vec<u8>> =
  Lazy::new(|| string_descriptor("Sony Computer Entertainment"));
static PRODUCT_STRING_DESCRIPTOR: Lazy<Vec<u8>> =
  Lazy::new(|| string_descriptor("Wireless Controller"));

/// Encodes a USB string descriptor: length, type 0x03, then UTF-16LE text.
fn string_descriptor(text: &str) -> Vec<u8> {
  let units: Vec<u16> = text.encode_utf16().collect();
  let mut descriptor = vec![0u8; 2 + units.len() * 2];
  descriptor[0] = descriptor.len() as u8;
  descriptor[1] = 0x03;
  LittleEndian::write_u16_into(&units, &mut descriptor[2..]);
  descriptor
}

fn generate_mac_address() -> [u8; 6] {
  let nic: [u8; 3] = rand::random();
  [
    MAC_VENDOR_PREFIX[0],
    MAC_VENDOR_PREFIX[1],
    MAC_VENDOR_PREFIX[2],
    nic[0],
    nic[1],
    nic[2],
  ]
}

pub struct DualShock4 {
  target_mac_address: [u8; 6],
  host_mac_address: [u8; 6],
}

impl DualShock4 {
  pub fn new(_timing: &ProtocolTiming) -> Self {
    Self {
      target_mac_address: generate_mac_address(),
      host_mac_address: generate_mac_address(),
    }
  }

  pub fn target_mac_address(&self) -> [u8; 6] {
    self.target_mac_address
  }

  pub fn host_mac_address(&self) -> [u8; 6] {
    self.host_mac_address
  }

  fn mac_address_report(&self) -> Vec<u8> {
    let mut response = FEATURE_REPORT_12.to_vec();
    let mut target = self.target_mac_address;
    target.reverse();
    response[TARGET_MAC_OFFSET..TARGET_MAC_OFFSET + 6].copy_from_slice(&target);
    let mut host = self.host_mac_address;
    host.reverse();
    response[HOST_MAC_OFFSET..HOST_MAC_OFFSET + 6].copy_from_slice(&host);
    response
  }
}

impl ProtocolHandler for DualShock4 {
  fn target_type(&self) -> TargetType {
    TargetType::DualShock4
  }

  fn description(&self) -> &'static str {
    "Virtual DualShock 4 Controller"
  }

  fn hardware_ids(&self, vendor_id: u16, product_id: u16) -> Vec<String> {
    vec![
      format!(
        "USB\\VID_{:04X}&PID_{:04X}&REV_0100",
        vendor_id, product_id
      ),
      format!("USB\\VID_{:04X}&PID_{:04X}", vendor_id, product_id),
    ]
  }

  fn compatible_ids(&self) -> Vec<String> {
    [
      "USB\\Class_03&SubClass_00&Prot_00",
      "USB\\Class_03&SubClass_00",
      "USB\\Class_03",
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
  }

  fn device_descriptor(&self) -> UsbDeviceDescriptor {
    UsbDeviceDescriptor {
      device_class: 0x00,
      device_subclass: 0x00,
      device_protocol: 0x00,
      max_packet_size: 0x40,
      bcd_device: 0x0100,
      manufacturer_index: 0x01,
      product_index: 0x02,
      serial_number_index: 0x00,
    }
  }

  fn configuration_descriptor(&self) -> &'static [u8] {
    &CONFIGURATION_DESCRIPTOR
  }

  fn string_descriptor(&self, index: u8) -> Option<Vec<u8>> {
    match index {
      0 => Some(LANGUAGE_ID_DESCRIPTOR.to_vec()),
      1 => Some(MANUFACTURER_STRING_DESCRIPTOR.to_vec()),
      2 => Some(PRODUCT_STRING_DESCRIPTOR.to_vec()),
      _ => None,
    }
  }

  fn hid_report_descriptor(&self) -> Option<&'static [u8]> {
    Some(&HID_REPORT_DESCRIPTOR)
  }

  fn default_frame(&self) -> Vec<u8> {
    DEFAULT_FRAME.to_vec()
  }

  fn frame_report(&self, frame: &mut [u8], report: &Report) -> Result<(), PadbusValidationError> {
    match report {
      Report::DualShock4(report) => {
        frame[REPORT_OFFSET..REPORT_OFFSET + Ds4Report::SIZE].copy_from_slice(&report.to_bytes());
      }
      Report::DualShock4Ex(report) => {
        frame[REPORT_OFFSET..REPORT_OFFSET + Ds4ReportEx::SIZE].copy_from_slice(report.data());
      }
      other => {
        return Err(PadbusValidationError::InvalidParameter(format!(
          "DualShock4 target cannot frame a {} report",
          other.target_type()
        )));
      }
    }
    Ok(())
  }

  fn handle_out_transfer(&self, data: &[u8]) -> Option<Notification> {
    if data.len() < OUTPUT_STATE_OFFSET + OUTPUT_STATE_SIZE {
      warn!(
        "DualShock4 output transfer too short ({} bytes), ignoring",
        data.len()
      );
      return None;
    }
    let state = &data[OUTPUT_STATE_OFFSET..OUTPUT_STATE_OFFSET + OUTPUT_STATE_SIZE];
    Some(Notification::DualShock4 {
      small_motor: state[0],
      large_motor: state[1],
      lightbar: LightbarColor::new(state[2], state[3], state[4]),
    })
  }

  fn handle_class_request(&self, request: ClassRequest) -> Vec<u8> {
    match request {
      ClassRequest::GetFeatureReport(0xA3) => FEATURE_REPORT_A3.to_vec(),
      ClassRequest::GetFeatureReport(0x02) => FEATURE_REPORT_02.to_vec(),
      ClassRequest::GetFeatureReport(FEATURE_REPORT_MAC_ADDRESSES) => self.mac_address_report(),
      ClassRequest::SetFeatureReport(0x13) => FEATURE_REPORT_13.to_vec(),
      ClassRequest::SetFeatureReport(0x14) => FEATURE_REPORT_14.to_vec(),
      other => {
        debug!("Unhandled DualShock4 class request {:?}", other);
        vec![]
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::time::Duration;

  fn handler() -> DualShock4 {
    DualShock4::new(&ProtocolTiming::new(None, Duration::from_millis(50)))
  }

  #[test]
  fn test_hid_descriptor_size_matches_configuration() {
    let ds4 = handler();
    let hid = ds4.hid_report_descriptor().expect("Test, assuming infallible.");
    // wDescriptorLength inside the HID class descriptor.
    let declared = LittleEndian::read_u16(&CONFIGURATION_DESCRIPTOR[25..27]) as usize;
    assert_eq!(hid.len(), declared);
    assert_eq!(hid.len(), 467);
  }

  #[test]
  fn test_string_descriptors() {
    let ds4 = handler();
    assert_eq!(
      ds4.string_descriptor(0),
      Some(vec![0x04, 0x03, 0x09, 0x04])
    );
    let manufacturer = ds4.string_descriptor(1).expect("Test, assuming infallible.");
    assert_eq!(&manufacturer[..4], &[0x38, 0x03, b'S', 0x00]);
    assert_eq!(manufacturer.len(), 0x38);
    let product = ds4.string_descriptor(2).expect("Test, assuming infallible.");
    assert_eq!(&product[..2], &[0x28, 0x03]);
    assert_eq!(ds4.string_descriptor(3), None);
  }

  #[test]
  fn test_report_overwrites_leading_bytes() {
    let ds4 = handler();
    let mut frame = ds4.default_frame();
    let mut report = Ds4Report::default();
    report.set_thumb_lx(0x00).set_trigger_r(0xFF);
    ds4
      .frame_report(&mut frame, &Report::from(report))
      .expect("Test, assuming infallible.");
    assert_eq!(frame[0], 0x01);
    assert_eq!(&frame[1..10], &report.to_bytes());
    assert_eq!(&frame[10..], &DEFAULT_FRAME[10..]);
  }

  #[test]
  fn test_output_transfer_to_notification() {
    let ds4 = handler();
    let out = [0x05, 0xFF, 0x00, 0x00, 0x10, 0x20, 0xAA, 0xBB, 0xCC, 0x00];
    assert_eq!(
      ds4.handle_out_transfer(&out),
      Some(Notification::DualShock4 {
        small_motor: 0x10,
        large_motor: 0x20,
        lightbar: LightbarColor::new(0xAA, 0xBB, 0xCC),
      })
    );
    assert_eq!(ds4.handle_out_transfer(&out[..8]), None);
  }

  #[test]
  fn test_mac_address_feature_report() {
    let ds4 = handler();
    let response = ds4.handle_class_request(ClassRequest::GetFeatureReport(0x12));
    assert_eq!(response.len(), 16);
    assert_eq!(response[0], 0x12);
    // Addresses are stored most significant byte last.
    assert_eq!(&response[4..7], &[0x37, 0x13, 0xC0]);
    assert_eq!(&response[13..16], &[0x37, 0x13, 0xC0]);
    let mut target = ds4.target_mac_address();
    target.reverse();
    assert_eq!(&response[1..7], &target);
    assert_eq!(&response[7..10], &[0x08, 0x25, 0x00]);
  }

  #[test]
  fn test_canned_feature_reports() {
    let ds4 = handler();
    assert_eq!(
      ds4.handle_class_request(ClassRequest::GetFeatureReport(0xA3)).len(),
      49
    );
    assert_eq!(
      ds4.handle_class_request(ClassRequest::GetFeatureReport(0x02)).len(),
      37
    );
    assert_eq!(
      ds4.handle_class_request(ClassRequest::SetFeatureReport(0x13)).len(),
      23
    );
    assert_eq!(
      ds4.handle_class_request(ClassRequest::SetFeatureReport(0x14))[..2],
      [0x14, 0x02]
    );
    assert!(
      ds4
        .handle_class_request(ClassRequest::GetFeatureReport(0x13))
        .is_empty()
    );
  }
}
