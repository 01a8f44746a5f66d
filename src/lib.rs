//! Edge-Timing Decoder for DHT22/DHT11 Sensors
//!
//! This crate decodes the single-wire protocol of the DHT22 (AM2302) and
//! DHT11 temperature and humidity sensors from a trace of timestamped line
//! transitions, and ships a blocking acquisition driver built on the
//! [`embedded-hal`] traits.
//!
//! The decoder itself owns no hardware: it is a set of pure functions over
//! an [`EdgeTrace`], so the same logic serves both an interrupt-driven
//! capture (fill an [`EdgeCapture`] from a level-change handler, decode
//! from the waiting context) and the bundled busy-polling driver [`Dht`].
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits
//! - Pure, reentrant decode logic with a classified error taxonomy
//! - Fixed-capacity edge arena, safe to fill from interrupt context
//! - Designed for `no_std` environments
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! This driver depends on the following `embedded-hal` traits:
//! - [`InputPin`] and [`OutputPin`] for GPIO access
//! - [`DelayNs`] for accurate timing
//!
//! Timestamping needs a monotonic nanosecond clock, which `embedded-hal`
//! does not model; implement the crate's own [`MonotonicClock`] trait for
//! your platform.
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` for logging support
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod capture;
pub mod clock;
pub mod decoder;
pub mod dht;
pub mod error;
pub mod trace;

pub use capture::{CaptureStatus, EdgeCapture};
pub use clock::MonotonicClock;
pub use decoder::{RawPayload, Reading, Resolution};
pub use dht::Dht;
pub use error::{CaptureError, DecodeError, DhtError};
pub use trace::{Edge, EdgeTrace};
