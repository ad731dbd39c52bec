//! Steady-state cycle: sample → build → link check → publish → sleep.

use futures_lite::future::block_on;

use envnode::app::events::AppEvent;
use envnode::app::service::{CycleOutcome, SkipReason};
use envnode::error::TelemetryError;
use envnode::point::{FieldValue, WritePrecision};
use envnode::sensors::{AcquisitionPhase, Oversampling, RawMeasurement};
use envnode::sensors::sim::SimChip;

use crate::mock_node::{
    Bme280Node, RecordingSink, VirtualClock, boot_280, boot_680, bme280_node, bme680_node, config,
    reading, with_precision,
};

const CYCLE_MS: u64 = 35 + 1_000;

fn booted() -> (Bme280Node, VirtualClock, RecordingSink) {
    let (mut node, clock) = bme280_node(config(), SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();
    sink.clear();
    (node, clock, sink)
}

#[test]
fn publishes_expected_line() {
    let (mut node, _clock, mut sink) = booted();

    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
    assert_eq!(
        node.telemetry().transport().posted_lines(),
        ["BME280,device=ESP32 temperature=22.50,pressure=1013.25,humidity=45.00,altitude=0.00"]
    );

    let expected = [
        AppEvent::Writing(
            "BME280,device=ESP32 temperature=22.50,pressure=1013.25,humidity=45.00,altitude=0.00"
                .into(),
        ),
        AppEvent::Published,
        AppEvent::Waiting { ms: 1_000 },
    ];
    assert_eq!(sink.events, expected);
}

#[test]
fn write_request_is_authorized_and_addressed() {
    let (mut node, _clock, mut sink) = booted();
    block_on(node.run_cycle(&mut sink));

    let post = node.telemetry().transport().requests().last().cloned().unwrap();
    assert_eq!(
        post.url,
        "https://influx.test/api/v2/write?org=lab&bucket=env&precision=s"
    );
    assert_eq!(post.header("Authorization"), Some("Token t0k3n"));
    assert_eq!(post.header("Content-Type"), Some("text/plain; charset=utf-8"));
}

#[test]
fn cycles_are_spaced_by_conversion_and_period() {
    let (mut node, clock, mut sink) = booted();
    let start = clock.now_ms();
    for _ in 0..3 {
        block_on(node.run_cycle(&mut sink));
    }
    assert_eq!(clock.now_ms() - start, 3 * CYCLE_MS);
    assert_eq!(node.stats().cycles, 3);
    assert_eq!(node.stats().published, 3);
}

#[test]
fn failed_trigger_skips_publish_but_keeps_period() {
    let (mut node, clock, mut sink) = booted();
    node.sensor_mut().chip_mut().fail_next_triggers(1);
    let start = clock.now_ms();

    assert_eq!(
        block_on(node.run_cycle(&mut sink)),
        CycleOutcome::Skipped(SkipReason::BeginFailed)
    );
    assert!(node.telemetry().transport().posted_lines().is_empty());
    assert!(sink.events.contains(&AppEvent::ReadFailed(AcquisitionPhase::Begin)));
    // No conversion window was opened, only the period elapsed.
    assert_eq!(clock.now_ms() - start, 1_000);

    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
    assert_eq!(node.stats().skipped_reads, 1);
}

#[test]
fn failed_fetch_skips_publish() {
    let (mut node, clock, mut sink) = booted();
    node.sensor_mut().chip_mut().fail_next_fetches(1);
    let start = clock.now_ms();

    assert_eq!(
        block_on(node.run_cycle(&mut sink)),
        CycleOutcome::Skipped(SkipReason::EndFailed)
    );
    assert!(node.telemetry().transport().posted_lines().is_empty());
    assert!(sink.events.contains(&AppEvent::ReadFailed(AcquisitionPhase::End)));
    assert_eq!(clock.now_ms() - start, CYCLE_MS);
    // A skipped cycle leaves no fields behind.
    assert!(!node.point().has_fields());
}

#[test]
fn publish_failure_does_not_leak_into_next_cycle() {
    let (mut node, _clock, mut sink) = booted();
    node.telemetry_mut().transport_mut().push_response(
        500,
        r#"{"code":"internal error","message":"engine: shard closed"}"#,
    );

    assert_eq!(
        block_on(node.run_cycle(&mut sink)),
        CycleOutcome::PublishFailed(TelemetryError::Rejected { status: 500 })
    );
    assert!(sink.events.contains(&AppEvent::PublishFailed {
        error: TelemetryError::Rejected { status: 500 },
        message: Some("engine: shard closed".into()),
    }));

    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
    let lines = node.telemetry().transport().posted_lines();
    assert_eq!(lines.len(), 2);
    // Failed writes are not replayed: each POST carries one point.
    assert_eq!(lines[0], lines[1]);
    assert_eq!(node.stats().publish_failures, 1);
    assert_eq!(node.stats().published, 1);
}

#[test]
fn transport_error_is_reported_not_fatal() {
    let (mut node, _clock, mut sink) = booted();
    node.telemetry_mut()
        .transport_mut()
        .push_error(TelemetryError::Timeout);

    assert_eq!(
        block_on(node.run_cycle(&mut sink)),
        CycleOutcome::PublishFailed(TelemetryError::Timeout)
    );
    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
}

#[test]
fn lost_link_is_reported_and_write_still_attempted() {
    let (mut node, _clock, mut sink) = booted();
    node.link_mut().sim_drop_link();
    node.link_mut().sim_fail_next(1);

    block_on(node.run_cycle(&mut sink));
    assert!(sink.events.contains(&AppEvent::LinkLost));
    assert_eq!(node.stats().link_losses, 1);
    assert_eq!(node.telemetry().transport().posted_lines().len(), 1);

    // Reassociates on the next cycle without another report.
    sink.clear();
    block_on(node.run_cycle(&mut sink));
    assert!(!sink.events.contains(&AppEvent::LinkLost));
    assert_eq!(node.stats().link_losses, 1);
}

#[test]
fn dropped_link_that_reconnects_is_not_a_loss() {
    let (mut node, _clock, mut sink) = booted();
    node.link_mut().sim_drop_link();

    block_on(node.run_cycle(&mut sink));
    assert!(!sink.events.contains(&AppEvent::LinkLost));
    assert_eq!(node.link().attempts(), 2);
}

#[test]
fn tags_never_change_between_cycles() {
    let mut c = config();
    c.extra_tags.push(("room".into(), "lab".into())).unwrap();
    let (mut node, clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();

    let before: Vec<(String, String)> = node
        .point()
        .tags()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    node.sensor_mut().chip_mut().fail_next_fetches(1);
    for _ in 0..4 {
        block_on(node.run_cycle(&mut sink));
    }
    let after: Vec<(String, String)> = node
        .point()
        .tags()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    assert_eq!(before, after);
    assert!(clock.now_ms() > 0);
}

#[test]
fn fields_reflect_only_the_latest_sample() {
    let (mut node, _clock, mut sink) = booted();
    block_on(node.run_cycle(&mut sink));
    assert!(node.point().field("humidity").is_some());

    node.sensor_mut().chip_mut().set_reading(RawMeasurement {
        temperature_c: 19.25,
        pressure_pa: 99_000.0,
        humidity_pct: None,
        gas_ohms: None,
    });
    block_on(node.run_cycle(&mut sink));

    let p = node.point();
    assert!(p.field("humidity").is_none());
    assert_eq!(p.field("temperature").and_then(FieldValue::as_f64), Some(19.25));
    assert_eq!(p.fields().count(), 3);
}

#[test]
fn non_finite_reading_is_dropped_from_the_line() {
    let (mut node, _clock, mut sink) = booted();
    node.sensor_mut().chip_mut().set_reading(RawMeasurement {
        humidity_pct: Some(f32::NAN),
        ..reading()
    });

    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
    assert_eq!(
        node.telemetry().transport().posted_lines(),
        ["BME280,device=ESP32 temperature=22.50,pressure=1013.25,altitude=0.00"]
    );
}

#[test]
fn skipped_humidity_channel_is_not_published() {
    let mut c = config();
    c.sensor.humidity_oversampling = Oversampling::Skipped;
    let (mut node, _clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();

    block_on(node.run_cycle(&mut sink));
    let lines = node.telemetry().transport().posted_lines();
    assert!(!lines[0].contains("humidity="), "{}", lines[0]);
    assert!(lines[0].contains("temperature=22.50"));
}

#[test]
fn point_is_stamped_once_the_clock_is_valid() {
    let (mut node, clock, mut sink) = booted();
    block_on(node.run_cycle(&mut sink));
    assert_eq!(node.point().timestamp(), None);

    clock.set_wall_nanos(1_718_000_000_123_456_789);
    block_on(node.run_cycle(&mut sink));
    assert_eq!(node.point().timestamp(), Some(1_718_000_000));
    let lines = node.telemetry().transport().posted_lines();
    assert!(lines[1].ends_with(" 1718000000"));
}

#[test]
fn timestamp_follows_write_precision() {
    let c = with_precision(config(), Some(WritePrecision::Millis));
    let (mut node, clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    clock.set_wall_nanos(1_718_000_000_123_456_789);
    boot_280(&mut node, &mut sink).0.unwrap();

    block_on(node.run_cycle(&mut sink));
    assert_eq!(node.point().timestamp(), Some(1_718_000_000_123));
    assert!(node.telemetry().write_url().ends_with("&precision=ms"));
}

#[test]
fn no_precision_leaves_point_unstamped() {
    let c = with_precision(config(), None);
    let (mut node, clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    clock.set_wall_nanos(1_718_000_000_123_456_789);
    boot_280(&mut node, &mut sink).0.unwrap();

    block_on(node.run_cycle(&mut sink));
    assert_eq!(node.point().timestamp(), None);
    assert!(!node.telemetry().write_url().contains("precision"));
}

#[test]
fn bme680_reports_gas_resistance() {
    let raw = RawMeasurement {
        gas_ohms: Some(52_340.0),
        ..reading()
    };
    let (mut node, clock) = bme680_node(
        {
            let mut c = config();
            c.sensor = envnode::sensors::SensorParams::bme680();
            c
        },
        SimChip::new(raw),
    );
    let mut sink = RecordingSink::new();
    boot_680(&mut node, &mut sink).0.unwrap();
    let start = clock.now_ms();

    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
    assert_eq!(
        node.telemetry().transport().posted_lines(),
        ["BME680,device=ESP32 temperature=22.50,pressure=1013.25,humidity=45.00,gas_resistance=52.34,altitude=0.00"]
    );
    // TPH conversion plus the 150 ms heater phase.
    assert_eq!(clock.now_ms() - start, 183 + 1_000);
}

#[test]
fn custom_measurement_name_is_used() {
    let mut c = config();
    c.measurement = Some("climate".into());
    let (mut node, _clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();

    block_on(node.run_cycle(&mut sink));
    let lines = node.telemetry().transport().posted_lines();
    assert!(lines[0].starts_with("climate,device=ESP32 "));
}
