//! Blinks a digital output through the reactive bridge, then replays a
//! commanded sink across a simulated reconnect. Mirrors the shape of an
//! application-owned connection loop: set up streams on connect, drive them
//! until the link drops, re-arm on the restored link.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use pinstream::mock::MockController;
use pinstream::{ConnectionState, DigitalOutputSpec, PinBridge, PinError};
use tokio_stream::wrappers::IntervalStream;

const STAT_LED: u32 = 0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // stands in for the real controller link owned by the reconnect loop
    let controller = MockController::new();
    let bridge = PinBridge::new(Arc::new(controller.clone()));

    blink(&bridge).await?;
    reconnect(&bridge, &controller).await;

    println!(
        "levels written to pin {STAT_LED}: {:?}",
        controller.writes(STAT_LED)
    );
    Ok(())
}

/// Drives ten alternating levels through the output operator, one every
/// 200 ms, and waits for the clean completion that closes the handle.
async fn blink(bridge: &PinBridge) -> Result<()> {
    let levels = futures::stream::iter((1..=10).map(|n| n % 2 == 0));
    let ticks = IntervalStream::new(tokio::time::interval(Duration::from_millis(200)));
    let paced = levels.zip(ticks).map(|(level, _)| level);

    let mut driven = bridge
        .digital_output(DigitalOutputSpec::new(STAT_LED), false)
        .apply(paced);
    while let Some(event) = driven.next().await {
        match event {
            Ok(level) => println!("stat LED -> {level}"),
            Err(err) => anyhow::bail!("output stream failed: {err}"),
        }
    }
    println!("blink sequence complete");
    Ok(())
}

/// Feeds a process-lifetime subject, drops the link mid-stream, then
/// re-arms the subject on the restored link.
async fn reconnect(bridge: &PinBridge, controller: &MockController) {
    let subject = bridge.digital_output_subject(DigitalOutputSpec::new(STAT_LED), false);
    let mut observer = subject.subscribe();

    subject.accept(true);
    controller.set_state(ConnectionState::Disconnected);
    subject.accept(false); // the link is gone; this terminates the subject

    while let Some(event) = observer.recv().await {
        match event {
            Ok(level) => println!("observer saw {level}"),
            Err(PinError::ConnectionLost) => println!("observer saw the link drop"),
            Err(err) => println!("observer saw {err}"),
        }
    }

    // link restored: re-arm the sink and feed it again
    controller.set_state(ConnectionState::Connected);
    subject.reopen();
    let mut observer = subject.subscribe();
    subject.accept(true);
    subject.signal_complete();
    while let Some(event) = observer.recv().await {
        println!("after reconnect: {event:?}");
    }
}
