// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::{
  PadbusServerError,
  protocol::{ProtocolHandlerFactory, ProtocolTiming, get_default_protocol_map},
  registry::TargetRegistry,
  server::PadbusServer,
};
use getset::{CopyGetters, Getters};
use padbus_core::message::TargetType;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};

const DEFAULT_SERVER_NAME: &str = "Padbus Server";

/// Serializable server settings, usually loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
#[serde(default)]
pub struct PadbusServerOptions {
  #[getset(get = "pub")]
  name: String,
  /// Milliseconds an Xbox 360 target may go without a new report before its cached frame is
  /// resent. 0 turns this off.
  #[getset(get_copy = "pub")]
  xbox360_flush_period_ms: u64,
  /// Milliseconds between Xbox One init packet deliveries.
  #[getset(get_copy = "pub")]
  xbox_one_init_period_ms: u64,
}

impl Default for PadbusServerOptions {
  fn default() -> Self {
    Self {
      name: DEFAULT_SERVER_NAME.to_owned(),
      xbox360_flush_period_ms: 5,
      xbox_one_init_period_ms: 50,
    }
  }
}

impl PadbusServerOptions {
  pub fn from_json(json: &str) -> Result<Self, PadbusServerError> {
    serde_json::from_str(json).map_err(|e| PadbusServerError::OptionsParseError(e.to_string()))
  }
}

/// Configures and creates [PadbusServer] instances.
pub struct PadbusServerBuilder {
  /// Name of the server, used in logs.
  name: String,
  /// Xbox 360 stall flush period. If None, cached frames are never resent.
  xbox360_flush_period: Option<Duration>,
  xbox_one_init_period: Duration,
  protocol_map: HashMap<TargetType, Arc<dyn ProtocolHandlerFactory>>,
}

impl Default for PadbusServerBuilder {
  fn default() -> Self {
    Self::from_options(&PadbusServerOptions::default())
  }
}

impl PadbusServerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_options(options: &PadbusServerOptions) -> Self {
    let flush_period = match options.xbox360_flush_period_ms() {
      0 => None,
      ms => Some(Duration::from_millis(ms)),
    };
    Self {
      name: options.name().clone(),
      xbox360_flush_period: flush_period,
      xbox_one_init_period: Duration::from_millis(options.xbox_one_init_period_ms()),
      protocol_map: get_default_protocol_map(),
    }
  }

  /// Set the name of the server.
  pub fn name(&mut self, name: &str) -> &mut Self {
    self.name = name.to_owned();
    self
  }

  /// Set how long an Xbox 360 target may stall before its cached frame is resent. None turns the
  /// flush off.
  pub fn xbox360_flush_period(&mut self, period: Option<Duration>) -> &mut Self {
    self.xbox360_flush_period = period;
    self
  }

  pub fn xbox_one_init_period(&mut self, period: Duration) -> &mut Self {
    self.xbox_one_init_period = period;
    self
  }

  /// Register a protocol for a target type that has none.
  pub fn add_protocol<T>(&mut self, factory: T) -> Result<&mut Self, PadbusServerError>
  where
    T: ProtocolHandlerFactory + 'static,
  {
    let target_type = factory.target_type();
    if self.protocol_map.contains_key(&target_type) {
      return Err(PadbusServerError::ProtocolAlreadyAdded(
        target_type.to_string(),
      ));
    }
    self.protocol_map.insert(target_type, Arc::new(factory));
    Ok(self)
  }

  /// Remove a target type's protocol. Plugging in that type fails afterwards.
  pub fn remove_protocol(&mut self, target_type: TargetType) -> Result<&mut Self, PadbusServerError> {
    if self.protocol_map.remove(&target_type).is_none() {
      return Err(PadbusServerError::ProtocolDoesNotExist(
        target_type.to_string(),
      ));
    }
    Ok(self)
  }

  /// Try to build a [PadbusServer] using the parameters given.
  pub fn finish(&self) -> Result<PadbusServer, PadbusServerError> {
    if self.xbox_one_init_period.is_zero() {
      return Err(PadbusServerError::InvalidInitPacketPeriod);
    }
    debug!("Creating server '{}'", self.name);
    let timing = ProtocolTiming::new(
      self.xbox360_flush_period.filter(|period| !period.is_zero()),
      self.xbox_one_init_period,
    );
    let registry = TargetRegistry::new(self.protocol_map.clone(), timing);
    Ok(PadbusServer::new(&self.name, registry))
  }
}
