// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Application-side handle on a [PadbusServer](padbus_server::PadbusServer) living in the same
//! process.

#[macro_use]
extern crate log;

mod client;
mod client_target;

pub use client::PadbusClient;
pub use client_target::{ClientTarget, ClientTargetState};

use padbus_core::errors::PadbusError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PadbusClientError {
  /// Every serial on the bus is taken.
  #[error("No free serial left on the bus.")]
  NoFreeSlot,
  #[error("Target is already plugged in.")]
  AlreadyConnected,
  #[error("Target is not plugged in.")]
  TargetNotPluggedIn,
  #[error("A notification callback is already registered for target {0}.")]
  CallbackAlreadyRegistered(u32),
  #[error("No notification callback is registered for target {0}.")]
  CallbackNotFound(u32),
  #[error(transparent)]
  ServerError(#[from] PadbusError),
}
