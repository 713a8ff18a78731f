// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

cfg_if::cfg_if! {
  if #[cfg(feature = "tokio-runtime")] {
    mod tokio;
    pub use self::tokio::spawn;
  } else {
    std::compile_error!("Please choose a runtime feature: tokio-runtime");
  }
}
