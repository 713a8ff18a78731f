// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Target families, input reports and output notifications.

mod ds4;
mod notification;
mod xgip;
mod xusb;

pub use ds4::{
  Ds4Button,
  Ds4DpadDirection,
  Ds4Report,
  Ds4ReportBuilder,
  Ds4ReportEx,
  Ds4SpecialButton,
};
pub use notification::{LightbarColor, Notification};
pub use xgip::{XgipReport, XgipReportBuilder};
pub use xusb::{XusbButton, XusbReport, XusbReportBuilder};

use crate::errors::PadbusValidationError;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Device families the bus can emulate.
#[derive(
  Debug,
  Display,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  Serialize_repr,
  Deserialize_repr,
)]
#[repr(u8)]
pub enum TargetType {
  Xbox360 = 0,
  XboxOne = 1,
  DualShock4 = 2,
}

impl TargetType {
  pub fn default_vendor_id(&self) -> u16 {
    match self {
      TargetType::Xbox360 => 0x045E,
      TargetType::XboxOne => 0x0E6F,
      TargetType::DualShock4 => 0x054C,
    }
  }

  pub fn default_product_id(&self) -> u16 {
    match self {
      TargetType::Xbox360 => 0x028E,
      TargetType::XboxOne => 0x0139,
      TargetType::DualShock4 => 0x05C4,
    }
  }
}

impl TryFrom<u8> for TargetType {
  type Error = PadbusValidationError;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    match value {
      0 => Ok(TargetType::Xbox360),
      1 => Ok(TargetType::XboxOne),
      2 => Ok(TargetType::DualShock4),
      other => Err(PadbusValidationError::UnknownTargetType(other)),
    }
  }
}

/// A typed input report, as submitted by the application owning a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Report {
  Xbox360(XusbReport),
  DualShock4(Ds4Report),
  DualShock4Ex(Ds4ReportEx),
  XboxOne(XgipReport),
}

impl Report {
  pub fn target_type(&self) -> TargetType {
    match self {
      Report::Xbox360(_) => TargetType::Xbox360,
      Report::DualShock4(_) | Report::DualShock4Ex(_) => TargetType::DualShock4,
      Report::XboxOne(_) => TargetType::XboxOne,
    }
  }

  /// Wire layout of the report body, little endian.
  pub fn to_bytes(&self) -> Vec<u8> {
    match self {
      Report::Xbox360(report) => report.to_bytes().to_vec(),
      Report::DualShock4(report) => report.to_bytes().to_vec(),
      Report::DualShock4Ex(report) => report.data().clone(),
      Report::XboxOne(report) => report.to_bytes().to_vec(),
    }
  }
}

impl From<XusbReport> for Report {
  fn from(report: XusbReport) -> Self {
    Report::Xbox360(report)
  }
}

impl From<Ds4Report> for Report {
  fn from(report: Ds4Report) -> Self {
    Report::DualShock4(report)
  }
}

impl From<Ds4ReportEx> for Report {
  fn from(report: Ds4ReportEx) -> Self {
    Report::DualShock4Ex(report)
  }
}

impl From<XgipReport> for Report {
  fn from(report: XgipReport) -> Self {
    Report::XboxOne(report)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use strum::IntoEnumIterator;

  #[test]
  fn test_target_type_round_trips_through_raw_value() {
    for target_type in TargetType::iter() {
      assert_eq!(TargetType::try_from(target_type as u8), Ok(target_type));
    }
    assert_eq!(
      TargetType::try_from(7),
      Err(PadbusValidationError::UnknownTargetType(7))
    );
  }

  #[test]
  fn test_report_target_type() {
    assert_eq!(
      Report::from(Ds4ReportEx::default()).target_type(),
      TargetType::DualShock4
    );
    assert_eq!(
      Report::from(XgipReport::default()).target_type(),
      TargetType::XboxOne
    );
  }
}
