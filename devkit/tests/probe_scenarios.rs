//! Probes against a loopback mock printer, one scenario per test.

use printwatch_core::oid;
use printwatch_core::snmp::{Oid, SnmpVersion, Value};
use printwatch_core::{DeviceProber, DeviceStatus, Severity, NO_ERROR};
use printwatch_devkit::{device_at, fast_settings, init_logging, MockPrinter, PrinterProfile};
use std::time::{Duration, Instant};

#[tokio::test]
async fn healthy_printer_is_functioning() {
    init_logging();
    let printer = MockPrinter::start(PrinterProfile::healthy("Brother HL-L6400DW")).await.unwrap();
    let prober = DeviceProber::new(fast_settings(printer.port()));

    let health = prober.probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert!(health.is_online);
    assert_eq!(health.status, DeviceStatus::Functioning);
    assert_eq!(health.errors, [NO_ERROR]);
    assert_eq!(health.uptime.as_deref(), Some("2d 3h"));
    assert!(!health.has_critical_errors);
    // basic, advanced and supplies rounds
    assert_eq!(printer.request_count(), 3);
}

#[tokio::test]
async fn inoperative_device_reports_one_critical_error() {
    init_logging();
    let profile = PrinterProfile::new().sys_descr("HP LaserJet 400").device_status(5);
    let printer = MockPrinter::start(profile).await.unwrap();
    let prober = DeviceProber::new(fast_settings(printer.port()));

    let health = prober.probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::Inoperative);
    assert!(health.has_critical_errors);
    assert_eq!(health.error_details.len(), 1);
    assert_eq!(health.error_details[0].severity, Severity::Critical);
    assert_eq!(health.errors, ["device inoperative"]);
}

#[tokio::test]
async fn bitmask_twenty_lists_low_toner_then_cover_open() {
    init_logging();
    let profile = PrinterProfile::healthy("Xerox WorkCentre 6515").printer_status(3).error_state(20);
    let printer = MockPrinter::start(profile).await.unwrap();
    let prober = DeviceProber::new(fast_settings(printer.port()));

    let health = prober.probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.errors, ["low toner", "cover open"]);
    assert!(!health.has_critical_errors);
    assert_eq!(health.status, DeviceStatus::Awaiting);
    assert!(health.is_online);
}

#[tokio::test]
async fn advanced_bitmask_replaces_basic_round_errors() {
    init_logging();
    let profile = PrinterProfile::new().sys_descr("OKI MC363").device_status(5).error_state(4);
    let printer = MockPrinter::start(profile).await.unwrap();
    let prober = DeviceProber::new(fast_settings(printer.port()));

    let health = prober.probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.errors, ["low toner"]);
    assert_eq!(health.error_details.len(), 1);
    assert!(!health.has_critical_errors);
}

#[tokio::test]
async fn silent_advanced_round_degrades_quietly() {
    init_logging();
    let profile = PrinterProfile::healthy("HP OfficeJet").silent_on(oid::HR_PRINTER_STATUS);
    let printer = MockPrinter::start(profile).await.unwrap();
    let mut settings = fast_settings(printer.port());
    settings.timeout_ms = 100;
    settings.read_supplies = false;

    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert!(health.is_online);
    assert_eq!(health.status, DeviceStatus::Functioning);
    assert_eq!(health.errors, [NO_ERROR]);
}

#[tokio::test]
async fn stalled_supply_round_keeps_printer_status() {
    init_logging();
    let profile = PrinterProfile::healthy("HP LaserJet")
        .printer_status(3)
        .silent_on(oid::PRT_MARKER_SUPPLIES_LEVEL);
    let printer = MockPrinter::start(profile).await.unwrap();
    let mut settings = fast_settings(printer.port());
    // The silent supply round alone would need 600 ms against a 500 ms deadline.
    settings.timeout_ms = 300;
    settings.retries = 1;
    settings.safety_margin_ms = 200;

    let started = Instant::now();
    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert!(health.is_online);
    assert_eq!(health.status, DeviceStatus::Awaiting);
    assert_eq!(health.errors, [NO_ERROR]);
    assert!(health.supplies.is_none());
    assert!(started.elapsed() < Duration::from_millis(600));
}

#[tokio::test]
async fn one_undecodable_field_does_not_hide_the_rest() {
    init_logging();
    let profile = PrinterProfile::new()
        .sys_descr("HP LaserJet 400")
        .device_status(5)
        .with(oid::SYS_UPTIME, Value::Undecodable { tag: 0x47, bytes: vec![0x2A] });
    let printer = MockPrinter::start(profile).await.unwrap();
    let prober = DeviceProber::new(fast_settings(printer.port()));

    let health = prober.probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert!(health.is_online);
    assert_eq!(health.status, DeviceStatus::Inoperative);
    assert_eq!(health.errors, ["device inoperative"]);
    assert!(health.has_critical_errors);
    assert_eq!(health.uptime, None);
}

#[tokio::test]
async fn stalled_probe_hits_the_safety_deadline() {
    init_logging();
    let profile = PrinterProfile::healthy("Xerox VersaLink").silent_on(oid::HR_PRINTER_STATUS);
    let printer = MockPrinter::start(profile).await.unwrap();
    let mut settings = fast_settings(printer.port());
    // Retries alone would take 2.2s; the deadline is 200 + 300 ms.
    settings.timeout_ms = 200;
    settings.retries = 10;
    settings.safety_margin_ms = 300;

    let started = Instant::now();
    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::Timeout);
    assert!(!health.is_online);
    assert_eq!(health.errors, ["SNMP query timed out"]);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn closed_port_means_snmp_disabled() {
    init_logging();
    let probe_socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = probe_socket.local_addr().unwrap().port();
    drop(probe_socket);

    let mut settings = fast_settings(port);
    settings.timeout_ms = 500;
    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::Offline);
    assert_eq!(health.errors, ["SNMP disabled"]);
    assert_eq!(health.error_details[0].severity, Severity::Warning);
}

#[tokio::test]
async fn wrong_community_is_not_responding() {
    init_logging();
    let printer = MockPrinter::start(PrinterProfile::healthy("HP").community("campus")).await.unwrap();
    let mut settings = fast_settings(printer.port());
    settings.timeout_ms = 100;

    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::Offline);
    assert_eq!(health.errors, ["device not responding"]);
    // Only the basic round was attempted.
    assert_eq!(printer.request_count(), 1);
}

#[tokio::test]
async fn per_device_community_overrides_default() {
    init_logging();
    let printer = MockPrinter::start(PrinterProfile::healthy("HP").community("campus")).await.unwrap();
    let mut device = device_at("p1", Some("127.0.0.1"));
    device.community = Some("campus".into());

    let health = DeviceProber::new(fast_settings(printer.port())).probe(&device).await;
    assert_eq!(health.status, DeviceStatus::Functioning);
}

#[tokio::test]
async fn xerox_supplies_include_vendor_level() {
    init_logging();
    let profile = PrinterProfile::new()
        .sys_descr("Xerox AltaLink C8045")
        .toner(3_000, 12_000)
        .with(oid::XEROX_TONER_LEVEL, Value::Integer(24));
    let printer = MockPrinter::start(profile).await.unwrap();

    let health = DeviceProber::new(fast_settings(printer.port())).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::XeroxDetected);
    let supplies = health.supplies.expect("supply reading");
    assert_eq!(supplies.percent, Some(25));
    assert_eq!(supplies.vendor_level, Some(24));

    let supply_round = printer.requests().pop().unwrap();
    assert!(supply_round.contains(&Oid::from_slice(oid::XEROX_TONER_LEVEL)));
}

#[tokio::test]
async fn v1_missing_supply_oids_do_not_hurt_health() {
    init_logging();
    let printer = MockPrinter::start(PrinterProfile::healthy("OKI B432").printer_status(4)).await.unwrap();
    let mut settings = fast_settings(printer.port());
    settings.version = SnmpVersion::V1;

    let health = DeviceProber::new(settings).probe(&device_at("p1", Some("127.0.0.1"))).await;
    assert_eq!(health.status, DeviceStatus::Printing);
    assert_eq!(health.errors, [NO_ERROR]);
    assert!(health.supplies.is_none());
}
