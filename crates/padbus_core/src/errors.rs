// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Padbus Error Structs/Enums, representing bus and target errors.

use crate::message::TargetType;
use displaydoc::Display;
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PadbusResult<T = ()> = Result<T, PadbusError>;
pub type PadbusResultFuture<T = ()> = BoxFuture<'static, PadbusResult<T>>;

/// Macro for implementing `From<ErrorType> for BoxFuture<'static, Result<T, PadbusError>>`.
/// These implementations allow error types to be converted directly into ready futures.
macro_rules! impl_error_to_future {
  ($($error_type:ty),* $(,)?) => {
    $(
      impl<T> From<$error_type> for BoxFuture<'static, Result<T, PadbusError>>
      where
        T: Send + 'static,
      {
        fn from(err: $error_type) -> BoxFuture<'static, Result<T, PadbusError>> {
          PadbusError::from(err).into()
        }
      }
    )*
  };
}

impl_error_to_future!(
  PadbusValidationError,
  PadbusTargetError,
  PadbusHandshakeError,
);

/// Validation errors are raised synchronously when a request is malformed, before any target state
/// is touched.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadbusValidationError {
  /// Serial number 0 is reserved and cannot address a single target.
  ZeroSerial,
  /// Unknown target type {0}
  UnknownTargetType(u8),
  /// {0} report must be {2} bytes, got {1}
  InvalidReportSize(TargetType, usize, usize),
  /// Init packets must be between 1 and {1} bytes, got {0}
  InvalidInitPacketSize(usize, usize),
  /// All {0} init packets have already been submitted.
  InitPacketsComplete(usize),
  /// {0} targets do not accept init packets.
  InitPacketsUnsupported(TargetType),
  /// {0} targets do not produce notifications.
  NotificationsUnsupported(TargetType),
  /// Invalid parameter: {0}
  InvalidParameter(String),
}

/// Target errors come from addressing a specific target: it may be missing, owned by someone else,
/// of the wrong family, or not done with its handshake.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadbusTargetError {
  /// No target with serial {0} is plugged in.
  NoSuchDevice(u32),
  /// Target with serial {0} is already plugged in.
  AlreadyExists(u32),
  /// Caller is not allowed to access target {0}.
  AccessDenied(u32),
  /// Target {0} is a {1} target, but a {2} operation was requested.
  TypeMismatch(u32, TargetType, TargetType),
  /// Target {0} has not finished its handshake.
  NotReady(u32),
  /// Target {0} was removed while the request was waiting.
  Cancelled(u32),
}

/// Handshake errors occur while a client is connecting to a bus.
#[derive(Debug, Error, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadbusHandshakeError {
  /// Bus protocol version {0} does not match client version {1}.
  VersionMismatch(u32, u32),
}

/// Coarse classification of every error the bus can return.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
  /// Validation error
  ValidationError,
  /// Not found
  NotFound,
  /// Conflict
  Conflict,
  /// Access denied
  AccessDenied,
  /// Type mismatch
  TypeMismatch,
  /// Not ready
  NotReady,
  /// Cancelled
  Cancelled,
  /// Version mismatch
  VersionMismatch,
}

/// Aggregation enum for bus error types.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PadbusError {
  #[error(transparent)]
  PadbusValidationError(#[from] PadbusValidationError),
  #[error(transparent)]
  PadbusTargetError(#[from] PadbusTargetError),
  #[error(transparent)]
  PadbusHandshakeError(#[from] PadbusHandshakeError),
}

impl PadbusError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      PadbusError::PadbusValidationError(_) => ErrorKind::ValidationError,
      PadbusError::PadbusTargetError(err) => match err {
        PadbusTargetError::NoSuchDevice(_) => ErrorKind::NotFound,
        PadbusTargetError::AlreadyExists(_) => ErrorKind::Conflict,
        PadbusTargetError::AccessDenied(_) => ErrorKind::AccessDenied,
        PadbusTargetError::TypeMismatch(..) => ErrorKind::TypeMismatch,
        PadbusTargetError::NotReady(_) => ErrorKind::NotReady,
        PadbusTargetError::Cancelled(_) => ErrorKind::Cancelled,
      },
      PadbusError::PadbusHandshakeError(_) => ErrorKind::VersionMismatch,
    }
  }
}

impl<T> From<PadbusError> for BoxFuture<'static, Result<T, PadbusError>>
where
  T: Send + 'static,
{
  fn from(err: PadbusError) -> BoxFuture<'static, Result<T, PadbusError>> {
    future::ready(Err(err)).boxed()
  }
}
