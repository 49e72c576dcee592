//! Gesture classification through the device edge path

use std::thread::sleep;
use std::time::Duration;

use assistive_lens::{ButtonId, EventKind, GestureKind, Level};

mod common;
use common::{Harness, wait_until};

fn gestures(harness: &mut Harness) -> Vec<(ButtonId, GestureKind)> {
    harness
        .drain_events()
        .into_iter()
        .filter_map(|kind| match kind {
            EventKind::GestureDetected { button, gesture } => Some((button, gesture)),
            _ => None,
        })
        .collect()
}

fn tap(harness: &Harness, button: ButtonId) {
    assert!(harness.device.on_edge(button, Level::Low));
    sleep(Duration::from_millis(15));
    assert!(harness.device.on_edge(button, Level::High));
}

#[test]
fn test_single_press_runs_mapped_command() {
    let mut harness = Harness::basic();

    tap(&harness, ButtonId::Button3);

    assert!(harness.renderer.wait_for("Checking for obstacles..."));
    assert!(harness.renderer.wait_for("Could not get a clear distance reading."));
    assert_eq!(
        gestures(&mut harness),
        vec![(ButtonId::Button3, GestureKind::SinglePress)]
    );
}

#[test]
fn test_double_tap_emits_once() {
    let mut harness = Harness::basic();

    tap(&harness, ButtonId::Button4);
    sleep(Duration::from_millis(15));
    tap(&harness, ButtonId::Button4);

    assert!(harness.renderer.wait_for("No previous response to repeat."));
    sleep(Duration::from_millis(150));
    assert_eq!(
        gestures(&mut harness),
        vec![(ButtonId::Button4, GestureKind::DoubleTap)]
    );
}

#[test]
fn test_long_press_fires_while_held() {
    let mut harness = Harness::basic();

    assert!(harness.device.on_edge(ButtonId::Button1, Level::Low));
    assert!(harness.renderer.wait_for("Detecting objects..."));
    assert!(harness.device.is_pressed(ButtonId::Button1));

    harness.device.on_edge(ButtonId::Button1, Level::High);
    sleep(Duration::from_millis(150));

    assert_eq!(
        gestures(&mut harness),
        vec![(ButtonId::Button1, GestureKind::LongPress)]
    );
    assert!(harness.renderer.wait_for(
        "Cannot detect objects. Internet connection or AI service is unavailable."
    ));
}

#[test]
fn test_channels_are_independent() {
    let mut harness = Harness::basic();

    // Hold button 2 while tapping button 3
    harness.device.on_edge(ButtonId::Button2, Level::Low);
    tap(&harness, ButtonId::Button3);
    sleep(Duration::from_millis(30));
    harness.device.on_edge(ButtonId::Button2, Level::High);

    let mut seen = Vec::new();
    assert!(wait_until(Duration::from_secs(2), || {
        seen.extend(gestures(&mut harness));
        seen.len() >= 2
    }));
    sleep(Duration::from_millis(150));
    seen.extend(gestures(&mut harness));

    seen.sort_by_key(|(button, _)| *button as u8);
    assert_eq!(
        seen,
        vec![
            (ButtonId::Button2, GestureKind::SinglePress),
            (ButtonId::Button3, GestureKind::SinglePress),
        ]
    );
}

#[test]
fn test_release_without_press_is_ignored() {
    let mut harness = Harness::basic();

    harness.device.on_edge(ButtonId::Button1, Level::High);
    sleep(Duration::from_millis(250));

    assert!(gestures(&mut harness).is_empty());
    assert!(harness.renderer.spoken().is_empty());
}

#[test]
fn test_slow_second_tap_is_two_single_presses() {
    let mut harness = Harness::basic();

    // Second press lands inside the window but is released after it
    tap(&harness, ButtonId::Button3);
    sleep(Duration::from_millis(20));
    assert!(harness.device.on_edge(ButtonId::Button3, Level::Low));
    sleep(Duration::from_millis(100));
    assert!(harness.device.on_edge(ButtonId::Button3, Level::High));

    let mut seen = Vec::new();
    assert!(wait_until(Duration::from_secs(2), || {
        seen.extend(gestures(&mut harness));
        seen.len() >= 2
    }));
    sleep(Duration::from_millis(150));
    seen.extend(gestures(&mut harness));

    assert_eq!(
        seen,
        vec![
            (ButtonId::Button3, GestureKind::SinglePress),
            (ButtonId::Button3, GestureKind::SinglePress),
        ]
    );
}

#[test]
fn test_tap_then_hold_is_single_then_long() {
    let mut harness = Harness::basic();

    tap(&harness, ButtonId::Button3);
    sleep(Duration::from_millis(20));
    assert!(harness.device.on_edge(ButtonId::Button3, Level::Low));

    let mut seen = Vec::new();
    assert!(wait_until(Duration::from_secs(2), || {
        seen.extend(gestures(&mut harness));
        seen.len() >= 2
    }));
    harness.device.on_edge(ButtonId::Button3, Level::High);
    sleep(Duration::from_millis(150));
    seen.extend(gestures(&mut harness));

    assert_eq!(
        seen,
        vec![
            (ButtonId::Button3, GestureKind::SinglePress),
            (ButtonId::Button3, GestureKind::LongPress),
        ]
    );
}
