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
use getset::{CopyGetters, Setters};
use serde::{Deserialize, Serialize};

/// Xbox 360 button bits, as laid out in the `buttons` word of [XusbReport].
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XusbButton {
  DpadUp = 0x0001,
  DpadDown = 0x0002,
  DpadLeft = 0x0004,
  DpadRight = 0x0008,
  Start = 0x0010,
  Back = 0x0020,
  LeftThumb = 0x0040,
  RightThumb = 0x0080,
  LeftShoulder = 0x0100,
  RightShoulder = 0x0200,
  Guide = 0x0400,
  A = 0x1000,
  B = 0x2000,
  X = 0x4000,
  Y = 0x8000,
}

/// Xbox 360 input state.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  CopyGetters,
  Setters,
  Serialize,
  Deserialize,
  Builder,
)]
#[builder(default)]
#[getset(get_copy = "pub", set = "pub")]
pub struct XusbReport {
  buttons: u16,
  left_trigger: u8,
  right_trigger: u8,
  thumb_lx: i16,
  thumb_ly: i16,
  thumb_rx: i16,
  thumb_ry: i16,
}

impl XusbReport {
  pub const SIZE: usize = 12;

  pub fn button_flags(&self) -> BitFlags<XusbButton> {
    BitFlags::from_bits_truncate(self.buttons)
  }

  pub fn set_button_flags(&mut self, buttons: BitFlags<XusbButton>) -> &mut Self {
    self.buttons = buttons.bits();
    self
  }

  pub fn to_bytes(&self) -> [u8; Self::SIZE] {
    let mut buf = [0u8; Self::SIZE];
    LittleEndian::write_u16(&mut buf[0..2], self.buttons);
    buf[2] = self.left_trigger;
    buf[3] = self.right_trigger;
    LittleEndian::write_i16(&mut buf[4..6], self.thumb_lx);
    LittleEndian::write_i16(&mut buf[6..8], self.thumb_ly);
    LittleEndian::write_i16(&mut buf[8..10], self.thumb_rx);
    LittleEndian::write_i16(&mut buf[10..12], self.thumb_ry);
    buf
  }

  pub fn from_bytes(data: &[u8]) -> Result<Self, PadbusValidationError> {
    if data.len() != Self::SIZE {
      return Err(PadbusValidationError::InvalidReportSize(
        TargetType::Xbox360,
        data.len(),
        Self::SIZE,
      ));
    }
    Ok(Self {
      buttons: LittleEndian::read_u16(&data[0..2]),
      left_trigger: data[2],
      right_trigger: data[3],
      thumb_lx: LittleEndian::read_i16(&data[4..6]),
      thumb_ly: LittleEndian::read_i16(&data[6..8]),
      thumb_rx: LittleEndian::read_i16(&data[8..10]),
      thumb_ry: LittleEndian::read_i16(&data[10..12]),
    })
  }
}
