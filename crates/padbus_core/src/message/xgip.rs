// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use crate::{errors::PadbusValidationError, message::TargetType};
use byteorder::{ByteOrder, LittleEndian};
use derive_builder::Builder;
use getset::{CopyGetters, Setters};
use serde::{Deserialize, Serialize};

/// Xbox One input state.
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
pub struct XgipReport {
  buttons1: u8,
  buttons2: u8,
  left_trigger: i16,
  right_trigger: i16,
  thumb_lx: i16,
  thumb_ly: i16,
  thumb_rx: i16,
  thumb_ry: i16,
}

impl XgipReport {
  pub const SIZE: usize = 14;

  pub fn to_bytes(&self) -> [u8; Self::SIZE] {
    let mut buf = [0u8; Self::SIZE];
    buf[0] = self.buttons1;
    buf[1] = self.buttons2;
    LittleEndian::write_i16(&mut buf[2..4], self.left_trigger);
    LittleEndian::write_i16(&mut buf[4..6], self.right_trigger);
    LittleEndian::write_i16(&mut buf[6..8], self.thumb_lx);
    LittleEndian::write_i16(&mut buf[8..10], self.thumb_ly);
    LittleEndian::write_i16(&mut buf[10..12], self.thumb_rx);
    LittleEndian::write_i16(&mut buf[12..14], self.thumb_ry);
    buf
  }

  pub fn from_bytes(data: &[u8]) -> Result<Self, PadbusValidationError> {
    if data.len() != Self::SIZE {
      return Err(PadbusValidationError::InvalidReportSize(
        TargetType::XboxOne,
        data.len(),
        Self::SIZE,
      ));
    }
    Ok(Self {
      buttons1: data[0],
      buttons2: data[1],
      left_trigger: LittleEndian::read_i16(&data[2..4]),
      right_trigger: LittleEndian::read_i16(&data[4..6]),
      thumb_lx: LittleEndian::read_i16(&data[6..8]),
      thumb_ly: LittleEndian::read_i16(&data[8..10]),
      thumb_rx: LittleEndian::read_i16(&data[10..12]),
      thumb_ry: LittleEndian::read_i16(&data[12..14]),
    })
  }
}
