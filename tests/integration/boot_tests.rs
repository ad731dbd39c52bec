//! Boot sequence against the simulated link, backend and sensor.

use futures_lite::future::block_on;

use envnode::adapters::http_transport::Method;
use envnode::app::events::AppEvent;
use envnode::app::ports::{ClockPort, LinkState};
use envnode::app::service::{CycleOutcome, NodeState, SkipReason};
use envnode::error::{Error, LinkError, SensorError, TelemetryError};
use envnode::sensors::SensorVariant;
use envnode::sensors::sim::SimChip;

use crate::mock_node::{RecordingSink, boot_280, bme280_node, config, reading};

#[test]
fn boot_runs_link_time_backend_sensor_in_order() {
    let (mut node, _clock) = bme280_node(config(), SimChip::new(reading()));
    let mut sink = RecordingSink::new();

    let (r, led) = boot_280(&mut node, &mut sink);
    r.unwrap();
    assert!(!led.is_fault_latched());
    assert_eq!(node.state(), NodeState::SteadyState);

    let kinds: Vec<&str> = sink
        .events
        .iter()
        .map(|e| match e {
            AppEvent::LinkUp { .. } => "link",
            AppEvent::TimeSynced { .. } => "time",
            AppEvent::BackendReady { .. } => "backend",
            AppEvent::SensorConfigured { .. } => "sensor",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, ["link", "time", "backend", "sensor"]);

    // Health check only: nothing is written during boot.
    let requests = node.telemetry().transport().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].url, "https://influx.test/health");
}

#[test]
fn boot_reports_server_identity() {
    let (mut node, _clock) = bme280_node(config(), SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();

    let ready = sink.events.iter().find_map(|e| match e {
        AppEvent::BackendReady { url, info } => Some((url.clone(), info.clone())),
        _ => None,
    });
    let (url, info) = ready.expect("BackendReady emitted");
    assert_eq!(url, "https://influx.test");
    assert_eq!(info.name, "influxdb");
    assert_eq!(info.version, "v2.7.4");
}

#[test]
fn boot_waits_out_refused_associations() {
    let (mut node, clock) = bme280_node(config(), SimChip::new(reading()));
    node.link_mut().sim_fail_next(3);
    let mut sink = RecordingSink::new();

    boot_280(&mut node, &mut sink).0.unwrap();

    let waits: Vec<(u32, u32)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::LinkWaiting {
                attempt,
                retry_in_ms,
            } => Some((*attempt, *retry_in_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(waits, [(1, 100), (2, 100), (3, 100)]);
    assert_eq!(clock.now_ms(), 300);

    // Round-robin over two candidates: the fourth attempt lands on the second.
    assert_eq!(node.link().connected_ssid(), Some("lab-guest"));
    assert!(sink.events.contains(&AppEvent::LinkUp { rssi: Some(-55) }));
}

#[test]
fn exhausted_link_cap_halts_with_fault_led() {
    let mut c = config();
    c.link_retry.max_attempts = Some(2);
    let (mut node, _clock) = bme280_node(c, SimChip::new(reading()));
    node.link_mut().sim_fail_next(u32::MAX);
    let mut sink = RecordingSink::new();

    let (r, led) = boot_280(&mut node, &mut sink);
    let err = Error::Link(LinkError::GaveUp { attempts: 2 });
    assert_eq!(r, Err(err));
    assert!(led.is_fault_latched());
    assert!(led.is_on());
    assert_eq!(node.state(), NodeState::Halted);
    assert_eq!(sink.events.last(), Some(&AppEvent::Halted(err)));
    assert!(node.telemetry().transport().requests().is_empty());
}

#[test]
fn unhealthy_backend_does_not_stop_boot() {
    let (mut node, _clock) = bme280_node(config(), SimChip::new(reading()));
    node.telemetry_mut().transport_mut().push_response(
        503,
        r#"{"name":"influxdb","message":"database unavailable","status":"fail"}"#,
    );
    let mut sink = RecordingSink::new();

    boot_280(&mut node, &mut sink).0.unwrap();
    assert_eq!(node.state(), NodeState::SteadyState);
    assert!(sink.events.contains(&AppEvent::BackendUnavailable {
        url: "https://influx.test".into(),
        error: TelemetryError::Unhealthy,
        message: Some("database unavailable".into()),
    }));

    // The first cycle still writes.
    assert_eq!(block_on(node.run_cycle(&mut sink)), CycleOutcome::Published);
}

#[test]
fn unreachable_backend_does_not_stop_boot() {
    let (mut node, _clock) = bme280_node(config(), SimChip::new(reading()));
    node.telemetry_mut()
        .transport_mut()
        .push_error(TelemetryError::Tls);
    let mut sink = RecordingSink::new();

    boot_280(&mut node, &mut sink).0.unwrap();
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::BackendUnavailable {
                error: TelemetryError::Tls,
                ..
            }
        )),
        1
    );
}

#[test]
fn missing_sensor_is_fatal() {
    let (mut node, _clock) = bme280_node(config(), SimChip::absent());
    let mut sink = RecordingSink::new();

    let (r, led) = boot_280(&mut node, &mut sink);
    assert_eq!(r, Err(Error::Sensor(SensorError::NotDetected)));
    assert!(led.is_fault_latched());
    assert_eq!(node.state(), NodeState::Halted);

    // The halted node never samples or writes.
    assert_eq!(
        block_on(node.run_cycle(&mut sink)),
        CycleOutcome::Skipped(SkipReason::NotBooted)
    );
    assert_eq!(block_on(node.run(&mut sink)), Error::NotBooted);
    assert!(node.telemetry().transport().posted_lines().is_empty());
    assert_eq!(node.sensor().chip().trigger_count(), 0);
}

#[test]
fn sensor_receives_configured_profile() {
    let mut c = config();
    c.sensor.filter_coefficient = 4;
    let (mut node, _clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();

    boot_280(&mut node, &mut sink).0.unwrap();
    let applied = node.sensor().chip().applied().copied().unwrap();
    assert_eq!(applied.filter_coefficient, 4);
    assert!(sink.events.contains(&AppEvent::SensorConfigured {
        variant: SensorVariant::Bme280
    }));
}

#[test]
fn wall_clock_validity_is_reported() {
    let (mut node, clock) = bme280_node(config(), SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();
    assert!(sink.events.contains(&AppEvent::TimeSynced {
        wall_clock_valid: false
    }));

    let (mut node, clock2) = bme280_node(config(), SimChip::new(reading()));
    clock2.set_wall_nanos(1_718_000_000_000_000_000);
    sink.clear();
    boot_280(&mut node, &mut sink).0.unwrap();
    assert!(sink.events.contains(&AppEvent::TimeSynced {
        wall_clock_valid: true
    }));
    assert!(clock.unix_nanos().is_none());
}

#[test]
fn boot_is_one_shot() {
    let (mut node, _clock) = bme280_node(config(), SimChip::new(reading()));
    let mut sink = RecordingSink::new();
    boot_280(&mut node, &mut sink).0.unwrap();
    assert_eq!(boot_280(&mut node, &mut sink).0, Err(Error::AlreadyBooted));
    assert_eq!(node.point().tags().count(), 1);
    assert_eq!(node.link().state(), LinkState::Connected);
}

#[test]
fn extra_tags_follow_device_tag() {
    let mut c = config();
    c.device_tag = "greenhouse-3".into();
    c.extra_tags.push(("site".into(), "north wing".into())).unwrap();
    let (mut node, _clock) = bme280_node(c, SimChip::new(reading()));
    let mut sink = RecordingSink::new();

    boot_280(&mut node, &mut sink).0.unwrap();
    let tags: Vec<(&str, &str)> = node.point().tags().collect();
    assert_eq!(tags, [("device", "greenhouse-3"), ("site", "north wing")]);
}
