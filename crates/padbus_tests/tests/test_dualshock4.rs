// Padbus Rust Source Code File - See README.md for more info.
//
// Copyright 2016-2024 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

mod util;
use util::{
  bounded,
  plug_in,
  spawn_data_pull,
  test_server,
  wait_for_pending_notifications,
};

use padbus_core::message::{
  Ds4Button,
  Ds4DpadDirection,
  Ds4Report,
  Ds4ReportBuilder,
  Ds4ReportEx,
  LightbarColor,
  Notification,
  Report,
  TargetType,
};
use padbus_server::{
  protocol::ClassRequest,
  target::{DescriptorKind, TargetState},
};

#[tokio::test]
async fn test_ready_without_handshake() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;
  assert_eq!(target.state(), TargetState::SteadyState);
  bounded(server.wait_device_ready(1))
    .await
    .expect("Test, assuming infallible.");
}

#[tokio::test]
async fn test_report_frame_layout() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let mut report = Ds4ReportBuilder::default()
    .thumb_lx(0x10)
    .thumb_ly(0x20)
    .thumb_rx(0x30)
    .thumb_ry(0x40)
    .trigger_l(0xAA)
    .trigger_r(0xBB)
    .build()
    .expect("Test, assuming infallible.");
  report.set_dpad(Ds4DpadDirection::East);
  report.set_button_flags(Ds4Button::Cross.into());

  let pull = spawn_data_pull(&target).await;
  server
    .submit_report(&caller, 1, &Report::from(report))
    .await
    .expect("Test, assuming infallible.");
  let frame = bounded(pull)
    .await
    .expect("Test, assuming infallible.")
    .expect("Test, assuming infallible.");
  assert_eq!(frame.len(), 64);
  assert_eq!(frame[0], 0x01);
  assert_eq!(&frame[1..10], &report.to_bytes());
  assert_eq!(&frame[1..5], &[0x10, 0x20, 0x30, 0x40]);
  assert_eq!(frame[5] & 0x0F, Ds4DpadDirection::East as u8);
  // Everything past the report keeps the neutral frame.
  assert_eq!(&frame[10..13], &[0xFD, 0x63, 0x06]);
}

#[tokio::test]
async fn test_extended_report_replaces_body() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let body: Vec<u8> = (0..Ds4ReportEx::SIZE as u8).collect();
  let report = Ds4ReportEx::new(&body).expect("Test, assuming infallible.");
  let pull = spawn_data_pull(&target).await;
  server
    .submit_report(&caller, 1, &Report::from(report))
    .await
    .expect("Test, assuming infallible.");
  let frame = bounded(pull)
    .await
    .expect("Test, assuming infallible.")
    .expect("Test, assuming infallible.");
  assert_eq!(frame[0], 0x01);
  assert_eq!(&frame[1..], body.as_slice());
}

#[tokio::test]
async fn test_identical_reports_consume_two_pulls() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let first = spawn_data_pull(&target).await;
  let second = spawn_data_pull(&target).await;
  let report = Report::from(Ds4Report::default());
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
  assert_eq!(first, second);
  assert_eq!(target.pending_transfer_count().await, 0);
}

#[tokio::test]
async fn test_output_report_notification() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let request = tokio::spawn(server.request_notification(&caller, 1));
  wait_for_pending_notifications(&target, 1).await;
  target
    .handle_out_transfer(&[0x05, 0xFF, 0x00, 0x00, 0x40, 0x80, 0x11, 0x22, 0x33, 0x00])
    .await
    .expect("Test, assuming infallible.");
  let notification = bounded(request)
    .await
    .expect("Test, assuming infallible.")
    .expect("Test, assuming infallible.");
  assert_eq!(
    notification,
    Notification::DualShock4 {
      small_motor: 0x40,
      large_motor: 0x80,
      lightbar: LightbarColor::new(0x11, 0x22, 0x33),
    }
  );
}

#[tokio::test]
async fn test_descriptors() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let device = target.handle_descriptor_query(DescriptorKind::Device, 18);
  assert_eq!(&device[8..12], &[0x4C, 0x05, 0xC4, 0x05]);

  let header = target.handle_descriptor_query(DescriptorKind::Configuration, 9);
  assert_eq!(header.len(), 9);
  assert_eq!(
    target
      .handle_descriptor_query(DescriptorKind::Configuration, 41)
      .len(),
    41
  );
  assert!(
    target
      .handle_descriptor_query(DescriptorKind::Configuration, 20)
      .is_empty()
  );

  assert_eq!(
    target.handle_descriptor_query(DescriptorKind::String(0), 255),
    vec![0x04, 0x03, 0x09, 0x04]
  );
  let product = target.handle_descriptor_query(DescriptorKind::String(2), 255);
  assert_eq!(product[0] as usize, product.len());
  assert_eq!(product[1], 0x03);
  // A short buffer only gets the length byte.
  assert_eq!(
    target.handle_descriptor_query(DescriptorKind::String(2), 2),
    vec![product[0]]
  );
  assert!(
    target
      .handle_descriptor_query(DescriptorKind::String(9), 255)
      .is_empty()
  );

  assert_eq!(
    target
      .handle_descriptor_query(DescriptorKind::HidReport, 1024)
      .len(),
    467
  );
  assert!(
    target
      .handle_descriptor_query(DescriptorKind::HidReport, 100)
      .is_empty()
  );
}

#[tokio::test]
async fn test_feature_reports() {
  let server = test_server();
  let caller = server.open_session(100);
  let target = plug_in(&server, &caller, 1, TargetType::DualShock4).await;

  let macs = target.handle_class_request(ClassRequest::GetFeatureReport(0x12));
  assert_eq!(macs.len(), 16);
  assert_eq!(macs[0], 0x12);
  // Addresses are stored byte-reversed, so the vendor prefix ends each one.
  assert_eq!(&macs[4..7], &[0x37, 0x13, 0xC0]);
  assert_eq!(&macs[13..16], &[0x37, 0x13, 0xC0]);

  assert_eq!(
    target
      .handle_class_request(ClassRequest::GetFeatureReport(0xA3))
      .len(),
    49
  );
  assert_eq!(
    target
      .handle_class_request(ClassRequest::GetFeatureReport(0x02))
      .len(),
    37
  );
  assert_eq!(
    target
      .handle_class_request(ClassRequest::SetFeatureReport(0x14))
      .len(),
    17
  );
  assert!(
    target
      .handle_class_request(ClassRequest::GetFeatureReport(0x55))
      .is_empty()
  );
}
