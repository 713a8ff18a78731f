// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::{errors::PadbusValidationError, message::TargetType};
use byteorder::{ByteOrder, LittleEndian};
use derive_builder::Builder;
use enumflags2::{BitFlags, bitflags};
use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};

const DPAD_MASK: u16 = 0x000F;

/// DualShock 4 face and shoulder buttons. The low nibble of the button word is the d-pad and is
/// handled through [Ds4DpadDirection] instead.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ds4Button {
  Square = 1 << 4,
  Cross = 1 << 5,
  Circle = 1 << 6,
  Triangle = 1 << 7,
  ShoulderLeft = 1 << 8,
  ShoulderRight = 1 << 9,
  TriggerLeft = 1 << 10,
  TriggerRight = 1 << 11,
  Share = 1 << 12,
  Options = 1 << 13,
  ThumbLeft = 1 << 14,
  ThumbRight = 1 << 15,
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ds4SpecialButton {
  Ps = 1 << 0,
  Touchpad = 1 << 1,
}

/// D-pad state, stored in the low nibble of the button word. Directions run clockwise from north.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ds4DpadDirection {
  North = 0x0,
  NorthEast = 0x1,
  East = 0x2,
  SouthEast = 0x3,
  South = 0x4,
  SouthWest = 0x5,
  West = 0x6,
  NorthWest = 0x7,
  None = 0x8,
}

/// DualShock 4 input state. Sticks rest at 0x80.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters, Setters, Serialize, Deserialize, Builder)]
#[builder(default)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Ds4Report {
  thumb_lx: u8,
  thumb_ly: u8,
  thumb_rx: u8,
  thumb_ry: u8,
  buttons: u16,
  special: u8,
  trigger_l: u8,
  trigger_r: u8,
}

impl Default for Ds4Report {
  fn default() -> Self {
    Self {
      thumb_lx: 0x80,
      thumb_ly: 0x80,
      thumb_rx: 0x80,
      thumb_ry: 0x80,
      buttons: Ds4DpadDirection::None as u16,
      special: 0,
      trigger_l: 0,
      trigger_r: 0,
    }
  }
}

impl Ds4Report {
  pub const SIZE: usize = 9;

  pub fn dpad(&self) -> Ds4DpadDirection {
    Ds4DpadDirection::from_repr((self.buttons & DPAD_MASK) as u8).unwrap_or(Ds4DpadDirection::None)
  }

  pub fn set_dpad(&mut self, direction: Ds4DpadDirection) -> &mut Self {
    self.buttons = (self.buttons & !DPAD_MASK) | direction as u16;
    self
  }

  pub fn button_flags(&self) -> BitFlags<Ds4Button> {
    BitFlags::from_bits_truncate(self.buttons)
  }

  /// Replaces the face/shoulder buttons, keeping the d-pad as it is.
  pub fn set_button_flags(&mut self, buttons: BitFlags<Ds4Button>) -> &mut Self {
    self.buttons = (self.buttons & DPAD_MASK) | buttons.bits();
    self
  }

  pub fn special_flags(&self) -> BitFlags<Ds4SpecialButton> {
    BitFlags::from_bits_truncate(self.special)
  }

  pub fn set_special_flags(&mut self, special: BitFlags<Ds4SpecialButton>) -> &mut Self {
    self.special = special.bits();
    self
  }

  pub fn to_bytes(&self) -> [u8; Self::SIZE] {
    let mut buf = [0u8; Self::SIZE];
    buf[0] = self.thumb_lx;
    buf[1] = self.thumb_ly;
    buf[2] = self.thumb_rx;
    buf[3] = self.thumb_ry;
    LittleEndian::write_u16(&mut buf[4..6], self.buttons);
    buf[6] = self.special;
    buf[7] = self.trigger_l;
    buf[8] = self.trigger_r;
    buf
  }

  pub fn from_bytes(data: &[u8]) -> Result<Self, PadbusValidationError> {
    if data.len() != Self::SIZE {
      return Err(PadbusValidationError::InvalidReportSize(
        TargetType::DualShock4,
        data.len(),
        Self::SIZE,
      ));
    }
    Ok(Self {
      thumb_lx: data[0],
      thumb_ly: data[1],
      thumb_rx: data[2],
      thumb_ry: data[3],
      buttons: LittleEndian::read_u16(&data[4..6]),
      special: data[6],
      trigger_l: data[7],
      trigger_r: data[8],
    })
  }
}

/// Full DualShock 4 input report body, everything after the report id. Used by callers that drive
/// the touchpad, motion sensors or battery fields directly.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
#[getset(get = "pub")]
pub struct Ds4ReportEx {
  data: Vec<u8>,
}

impl Ds4ReportEx {
  pub const SIZE: usize = 63;

  pub fn new(data: &[u8]) -> Result<Self, PadbusValidationError> {
    if data.len() != Self::SIZE {
      return Err(PadbusValidationError::InvalidReportSize(
        TargetType::DualShock4,
        data.len(),
        Self::SIZE,
      ));
    }
    Ok(Self {
      data: data.to_vec(),
    })
  }

  /// Overwrites the leading structured fields, leaving the rest of the body intact.
  pub fn set_report(&mut self, report: &Ds4Report) -> &mut Self {
    self.data[..Ds4Report::SIZE].copy_from_slice(&report.to_bytes());
    self
  }
}

impl TryFrom<Vec<u8>> for Ds4ReportEx {
  type Error = PadbusValidationError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    Self::new(&data)
  }
}

impl From<Ds4ReportEx> for Vec<u8> {
  fn from(report: Ds4ReportEx) -> Self {
    report.data
  }
}

impl Default for Ds4ReportEx {
  fn default() -> Self {
    let mut data = vec![0u8; Self::SIZE];
    data[..Ds4Report::SIZE].copy_from_slice(&Ds4Report::default().to_bytes());
    Self { data }
  }
}
