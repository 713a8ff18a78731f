// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Emulates a bus of virtual game controllers.
//!
//! The Padbus Server owns every emulated controller ("target") on the bus and brokers between two
//! parties that never talk to each other directly:
//!
//! - The virtual transport, which enumerates targets, reads their descriptors and keeps pulling
//!   input data from them as if they were real USB hardware.
//! - Applications, which plug targets in, push new input state into them and wait for the
//!   feedback (rumble, LEDs) the host sends back.
//!
//! ## Target Lifetime
//!
//! - Plug in
//!   - An application asks the [PadbusServer] for a target with a serial of its choice. The serial
//!     must be unique on the bus. The target is created, its runtime state is reset, and per-type
//!     background work (report flushing for Xbox 360, init packet replay for Xbox One) is started.
//! - Handshake
//!   - The transport reads descriptors and pulls data. Each device family has its own handshake:
//!     Xbox 360 targets hand out a fixed boot sequence, Xbox One targets replay init packets the
//!     application submitted, DualShock 4 targets need no handshake at all.
//! - Steady state
//!   - Every transport pull is paired with the next report the application submits. Every output
//!     transfer the transport sends is paired with the next notification request the application
//!     makes.
//! - Removal
//!   - Unplugging a target, or closing the session that owns it, removes it from the bus. Anything
//!     still waiting on it is released with a cancellation error.

#[macro_use]
extern crate log;

#[macro_use]
extern crate strum_macros;

mod pairing_queue;
pub mod protocol;
mod registry;
mod server;
mod server_builder;
mod session;
pub mod target;

pub use pairing_queue::{PairingQueue, PairingQueueCancelled};
pub use registry::{ALL_TARGETS, TargetRegistry};
pub use server::PadbusServer;
pub use server_builder::{PadbusServerBuilder, PadbusServerOptions};
pub use session::{Caller, SessionId};

use thiserror::Error;

/// Error enum for Padbus Server configuration errors.
#[derive(Error, Debug)]
pub enum PadbusServerError {
  /// Options could not be parsed.
  #[error("Padbus Server options could not be parsed: {0}")]
  OptionsParseError(String),
  /// Xbox One init replay needs a non-zero period.
  #[error("Xbox One init packet replay period must be greater than 0.")]
  InvalidInitPacketPeriod,
  /// A protocol has already been registered for this target type.
  #[error("Padbus Protocol for target type {0} has already been added to the system.")]
  ProtocolAlreadyAdded(String),
  /// Requested protocol has not been registered with the system.
  #[error("Padbus Protocol for target type {0} does not exist in the system and cannot be removed.")]
  ProtocolDoesNotExist(String),
}
