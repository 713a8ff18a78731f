// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use getset::CopyGetters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct LightbarColor {
  red: u8,
  green: u8,
  blue: u8,
}

impl LightbarColor {
  pub fn new(red: u8, green: u8, blue: u8) -> Self {
    Self { red, green, blue }
  }
}

/// Feedback the host sent to a target, handed back to the owning application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
  Xbox360 {
    large_motor: u8,
    small_motor: u8,
    /// Player slot, 0-3, once the host has assigned one.
    led_number: Option<u8>,
  },
  DualShock4 {
    small_motor: u8,
    large_motor: u8,
    lightbar: LightbarColor,
  },
}
