// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Runtime helpers shared across the Padbus crates.

pub mod async_manager;

cfg_if::cfg_if! {
  if #[cfg(feature = "tokio-runtime")] {
    pub use tokio::time::sleep;
  }
}
