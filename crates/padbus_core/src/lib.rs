// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Shared types for the Padbus virtual gamepad bus.
//!
//! This crate holds everything both sides of the bus need to agree on: the error taxonomy, the
//! device families a bus can emulate, the typed input reports applications submit, and the
//! feedback notifications (rumble, LEDs, lightbars) the bus hands back. It also carries the async
//! runtime helpers used by the server and client crates.

#[macro_use]
extern crate log;

#[macro_use]
extern crate strum_macros;

pub mod errors;
pub mod message;
pub mod util;

/// Version of the bus/client contract. Clients must present exactly this value when connecting.
pub const PADBUS_PROTOCOL_VERSION: u32 = 0x0001;
