// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical handle an application holds on the bus. Targets are owned by the session that plugged
/// them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
  /// Session used by trusted, in-process callers.
  pub const INTERNAL: SessionId = SessionId(0);

  pub fn new(id: u32) -> Self {
    Self(id)
  }

  pub fn value(&self) -> u32 {
    self.0
  }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identity of whoever issued a bus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Caller {
  process_id: u32,
  session_id: SessionId,
  /// Internal callers bypass ownership checks.
  is_internal: bool,
}

impl Caller {
  pub fn new(process_id: u32, session_id: SessionId) -> Self {
    Self {
      process_id,
      session_id,
      is_internal: false,
    }
  }

  pub fn internal() -> Self {
    Self {
      process_id: std::process::id(),
      session_id: SessionId::INTERNAL,
      is_internal: true,
    }
  }
}
