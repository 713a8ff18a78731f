// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

mod util;
use util::{assert_error_kind, bounded, plug_in, spawn_data_pull, test_server};

use padbus_core::{
  errors::ErrorKind,
  message::{Report, TargetType, XgipReport, XusbReport},
};
use padbus_server::{
  protocol::{
    PipeKind,
    xbox_one::{INIT_PACKET_COUNT, MAX_INIT_PACKET_SIZE},
  },
  target::TargetState,
};

fn init_packet(index: usize) -> Vec<u8> {
  // Sizes vary on purpose.
  vec![index as u8; 4 + index]
}

#[tokio::test]
async fn test_init_packets_replayed_in_order() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::XboxOne).await;
  assert_eq!(target.state(), TargetState::Handshaking);

  for index in 0..INIT_PACKET_COUNT {
    server
      .submit_init_packet(&caller, 1, &init_packet(index))
      .await
      .expect("Test, assuming infallible.");
  }
  assert_error_kind(
    server.submit_init_packet(&caller, 1, &[0x01]).await,
    ErrorKind::ValidationError,
  );

  // Packets nobody pulled yet are kept for the next pull.
  for index in 0..INIT_PACKET_COUNT {
    let packet = bounded(target.handle_in_transfer(PipeKind::Data, 64))
      .await
      .expect("Test, assuming infallible.");
    assert_eq!(packet, init_packet(index));
  }
  bounded(server.wait_device_ready(1))
    .await
    .expect("Test, assuming infallible.");
  assert_eq!(target.state(), TargetState::SteadyState);
}

#[tokio::test]
async fn test_init_packet_validation() {
  let server = test_server();
  let owner = server.open_session(100);
  let intruder = server.open_session(200);
  plug_in(&server, &owner, 1, TargetType::XboxOne).await;
  plug_in(&server, &owner, 2, TargetType::Xbox360).await;

  assert_error_kind(
    server.submit_init_packet(&owner, 1, &[]).await,
    ErrorKind::ValidationError,
  );
  assert_error_kind(
    server
      .submit_init_packet(&owner, 1, &vec![0u8; MAX_INIT_PACKET_SIZE + 1])
      .await,
    ErrorKind::ValidationError,
  );
  assert_error_kind(
    server.submit_init_packet(&intruder, 1, &[0x01]).await,
    ErrorKind::AccessDenied,
  );
  assert_error_kind(
    server.submit_init_packet(&owner, 2, &[0x01]).await,
    ErrorKind::TypeMismatch,
  );
  server
    .submit_init_packet(&owner, 1, &vec![0u8; MAX_INIT_PACKET_SIZE])
    .await
    .expect("Test, assuming infallible.");
}

#[tokio::test]
async fn test_report_counter_advances() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::XboxOne).await;

  let mut report = XgipReport::default();
  report.set_left_trigger(0x0123);
  for expected_counter in [0x11u8, 0x12] {
    let pull = spawn_data_pull(&target).await;
    server
      .submit_report(&caller, 1, &Report::from(report))
      .await
      .expect("Test, assuming infallible.");
    let frame = bounded(pull)
      .await
      .expect("Test, assuming infallible.")
      .expect("Test, assuming infallible.");
    assert_eq!(frame.len(), 18);
    assert_eq!(&frame[..2], &[0x20, 0x00]);
    assert_eq!(frame[2], expected_counter);
    assert_eq!(frame[3], 0x0E);
    assert_eq!(&frame[4..], &report.to_bytes());
  }
  assert_error_kind(
    server
      .submit_report(&caller, 1, &Report::from(XusbReport::default()))
      .await,
    ErrorKind::TypeMismatch,
  );
}

#[tokio::test]
async fn test_identical_reports_consume_two_pulls() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::XboxOne).await;

  let first = spawn_data_pull(&target).await;
  let second = spawn_data_pull(&target).await;
  let report = Report::from(XgipReport::default());
  for _ in 0..2 {
    server
      .submit_report(&caller, 1, &report)
      .await
      .expect("Test, assuming infallible.");
  }
  let first = bounded(first)
    .await
    .expect("Test, assuming infallible.")
    .expect("Test, assuming infallible.");
  let second = bounded(second)
    .await
    .expect("Test, assuming infallible.")
    .expect("Test, assuming infallible.");
  // Same input, but each frame carries its own counter.
  assert_eq!(&first[3..], &second[3..]);
  assert_eq!(second[2], first[2].wrapping_add(1));
  assert_eq!(target.pending_transfer_count().await, 0);
}

#[tokio::test]
async fn test_notifications_unsupported() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::XboxOne).await;
  target
    .handle_out_transfer(&[0x09, 0x00, 0x00, 0x09])
    .await
    .expect("Test, assuming infallible.");
  assert_error_kind(
    server.request_notification(&caller, 1).await,
    ErrorKind::ValidationError,
  );
}
