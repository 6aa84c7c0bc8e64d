//! # pinstream
//!
//! Reactive pin-stream bridge for hardware I/O controllers. This crate lets
//! client code treat a controller's digital and analog pins as push-based
//! data streams instead of blocking calls: input pins become shared,
//! backpressure-aware sampled sequences, and output pins become write-through
//! transformers or multicast sinks over commanded-value sequences. Resource
//! acquisition is tied to subscription, resource release to stream
//! termination or cancellation, across three independent lifecycles: the
//! stream subscription, the connection state machine, and the pin handle.
//!
//! The hardware link itself is an external collaborator behind the
//! [`Controller`] trait; this crate never negotiates or reconnects it. The
//! application's reconnect loop owns the controller and decides how streams
//! are re-wired to a fresh handle set (see `demos/blink.rs`).
//!
//! ## Crate Structure
//!
//! - **`bridge`**: The [`PinBridge`] facade binding one controller and
//!   handing out pin-addressed stream constructors.
//! - **`controller`**: The collaborator contract: [`Controller`],
//!   [`PinHandle`], [`ConnectionState`], and the typed-sample conversion.
//! - **`spec`**: Immutable pin specifications with direction-specific modes.
//! - **`input`**: The polling input source; one shared poll loop and one
//!   handle per constructed [`SampledStream`].
//! - **`output`**: The output operator, a `Stream` transformer with
//!   write-through semantics.
//! - **`subject`**: The hot multicast [`OutputSubject`] with direct-feed
//!   entry points, built to survive hardware reconnects.
//! - **`stream`**: Multicast events and the per-consumer [`Subscription`].
//! - **`config`**: Declarative TOML pin maps.
//! - **`error`**: The [`PinError`] taxonomy.
//! - **`validation`**: Construction-time argument checks.
//! - **`mock`**: A scripted [`mock::MockController`] for tests and demos.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod mock;
pub mod output;
pub mod spec;
pub mod stream;
pub mod subject;
pub mod validation;

pub use bridge::PinBridge;
pub use controller::{ConnectionState, Controller, PinHandle, PinSample, PinValue};
pub use error::{PinError, PinResult};
pub use input::SampledStream;
pub use output::{OutputOperator, OutputStream};
pub use spec::{
    DigitalInputMode, DigitalInputSpec, DigitalOutputMode, DigitalOutputSpec, PinNumber,
};
pub use stream::{StreamEvent, Subscription};
pub use subject::OutputSubject;
