//! Integration tests for the multicast output subject.
//!
//! Covers multicast delivery, the error-path close suppression, composite
//! cleanup failures, dispose idempotence, and re-arming across a simulated
//! reconnect.

use std::sync::Arc;

use futures::stream;
use pinstream::mock::MockController;
use pinstream::{ConnectionState, DigitalOutputSpec, PinBridge, PinError, Subscription};

async fn drain(mut sub: Subscription<bool>) -> (Vec<bool>, Option<PinError>) {
    let mut values = Vec::new();
    while let Some(event) = sub.recv().await {
        match event {
            Ok(value) => values.push(value),
            Err(err) => return (values, Some(err)),
        }
    }
    (values, None)
}

#[tokio::test]
async fn all_observers_see_every_value_and_one_completion() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);

    let a = subject.subscribe();
    let b = subject.subscribe();
    assert_eq!(subject.observer_count(), 2);

    subject.accept(true);
    subject.accept(false);
    subject.signal_complete();

    let ((values_a, err_a), (values_b, err_b)) = tokio::join!(drain(a), drain(b));
    assert_eq!(values_a, vec![true, false]);
    assert_eq!(values_b, values_a);
    assert_eq!(err_a, None);
    assert_eq!(err_b, None);

    assert_eq!(controller.writes(0), vec![true, false]);
    assert_eq!(controller.start_values(0), vec![false]);
    assert_eq!(controller.open_count(0), 1);
    assert_eq!(controller.close_count(0), 1);
}

#[tokio::test]
async fn connection_lost_terminal_skips_the_close() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.accept(true);
    subject.signal_error(PinError::ConnectionLost);

    // later signals and values are ignored: exactly one terminal event
    subject.signal_error(PinError::InvalidArgument("late".into()));
    subject.signal_complete();
    subject.accept(false);

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![true]);
    assert_eq!(err, Some(PinError::ConnectionLost));

    assert_eq!(controller.writes(0), vec![true]);
    // closing a handle whose connection died would fail spuriously
    assert_eq!(controller.close_count(0), 0);
}

#[tokio::test]
async fn other_terminal_errors_close_the_handle_once() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.accept(true);
    subject.signal_error(PinError::InvalidArgument("boom".into()));

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![true]);
    assert_eq!(err, Some(PinError::InvalidArgument("boom".into())));
    assert_eq!(controller.close_count(0), 1);
}

#[tokio::test]
async fn failing_cleanup_reports_both_errors() {
    let controller = MockController::new();
    controller.fail_close(0);
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.accept(true);
    subject.signal_error(PinError::InvalidArgument("boom".into()));

    let (_, err) = drain(observer).await;
    assert_eq!(
        err,
        Some(PinError::CompositeFailure {
            original: Box::new(PinError::InvalidArgument("boom".into())),
            cleanup: Box::new(PinError::HandleCloseFailure(
                "simulated close failure".into()
            )),
        })
    );
    assert_eq!(controller.close_count(0), 1);
}

#[tokio::test]
async fn write_failure_terminates_with_connection_lost() {
    let controller = MockController::new();
    controller.fail_writes_after(0, 1);
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.accept(true);
    subject.accept(false);

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![true]);
    assert_eq!(err, Some(PinError::ConnectionLost));
    assert_eq!(controller.writes(0), vec![true]);
    assert_eq!(controller.close_count(0), 0);
}

#[tokio::test]
async fn dispose_is_idempotent_and_only_detaches_the_upstream() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let mut observer = subject.subscribe();

    subject.drive(stream::pending::<bool>());
    subject.dispose();
    assert!(subject.is_disposed());
    let calls_after_first = controller.total_hardware_calls();

    subject.dispose();
    assert!(subject.is_disposed());
    assert_eq!(controller.total_hardware_calls(), calls_after_first);

    // dispose issued no terminal event; direct feeding still works
    subject.accept(true);
    assert_eq!(observer.recv().await, Some(Ok(true)));
    assert_eq!(controller.writes(0), vec![true]);
}

#[tokio::test]
async fn driving_from_an_upstream_feeds_and_completes() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.drive(stream::iter([true, false, true]));

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![true, false, true]);
    assert_eq!(err, None);
    assert_eq!(controller.writes(0), vec![true, false, true]);
    assert_eq!(controller.close_count(0), 1);
}

#[tokio::test]
async fn reopen_rearms_the_sink_for_a_fresh_connection() {
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(0), false);
    let observer = subject.subscribe();

    subject.accept(true);
    controller.set_state(ConnectionState::Disconnected);
    subject.accept(false); // write fails, subject terminates

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![true]);
    assert_eq!(err, Some(PinError::ConnectionLost));
    assert_eq!(controller.close_count(0), 0);

    // the application reconnects and re-arms the same process-lifetime sink
    controller.set_state(ConnectionState::Connected);
    subject.reopen();
    let observer = subject.subscribe();

    subject.accept(false);
    subject.signal_complete();

    let (values, err) = drain(observer).await;
    assert_eq!(values, vec![false]);
    assert_eq!(err, None);

    // a fresh handle served the new connection, closed cleanly once
    assert_eq!(controller.open_count(0), 2);
    assert_eq!(controller.close_count(0), 1);
    assert_eq!(controller.writes(0), vec![true, false]);
    assert_eq!(controller.start_values(0), vec![false, false]);
}
