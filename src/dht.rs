use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::capture::{CaptureStatus, EdgeCapture};
use crate::clock::MonotonicClock;
use crate::decoder::{self, Reading};
use crate::error::{CaptureError, DecodeError, DhtError};

/// Duration of the start-transmission pulse, in milliseconds.
const START_TRANSMISSION_MS: u32 = 18;

/// Maximum time to collect edges for one read attempt, in nanoseconds.
const READ_TIMEOUT_NS: u64 = 1_000_000_000;

/// How long a successful reading stays valid, in nanoseconds. Requests
/// inside this window are served from the cache without touching the line.
const DATA_VALID_NS: u64 = 2_000_000_000;

/// Re-acquisitions attempted when a frame arrives with a bad checksum.
const CHECKSUM_RETRIES: u32 = 3;

/// Pause before retrying a corrupted frame, in milliseconds.
const RETRY_HOLDOFF_MS: u32 = 200;

/// Largest plausible humidity, in tenths of a percent.
const MAX_DECI_HUMIDITY: u16 = 1_000;

/// Busy-polling acquisition driver for a DHT22/DHT11 sensor.
///
/// Owns the data line and a reusable edge-capture arena. A read pulls the
/// line low to request a transmission, releases it, then samples the pin in
/// a tight loop, timestamping every level change until the expected edge
/// count is reached or the deadline passes. The captured trace is handed to
/// the pure decoder in [`crate::decoder`].
///
/// One acquisition yields both temperature and humidity, so the last good
/// reading is cached for two seconds and returned as-is for any request
/// inside that window.
pub struct Dht<PIN, DELAY, CLK> {
    pin: PIN,
    delay: DELAY,
    clock: CLK,
    capture: EdgeCapture,
    cache: Option<Reading>,
}

impl<PIN, DELAY, CLK, E> Dht<PIN, DELAY, CLK>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    DELAY: DelayNs,
    CLK: MonotonicClock,
{
    /// Creates a new driver instance.
    ///
    /// # Arguments
    ///
    /// * `pin` - The GPIO pin connected to the sensor's data line. Must
    ///   support both input and output; releasing it (`set_high`) must let
    ///   the pull-up take over so the sensor can drive the line.
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    /// * `clock` - Monotonic nanosecond clock used to timestamp edges.
    pub fn new(pin: PIN, delay: DELAY, clock: CLK) -> Self {
        Dht {
            pin,
            delay,
            clock,
            capture: EdgeCapture::new(),
            cache: None,
        }
    }

    /// Reads a temperature and humidity measurement from the sensor.
    ///
    /// Returns the cached reading when it is still inside its validity
    /// window. Otherwise performs a full acquisition, retrying a few times
    /// when the frame arrives corrupted; every other failure is returned
    /// immediately, with the driver left idle and ready for the next
    /// request.
    ///
    /// # Returns
    ///
    /// * `Ok(Reading)` on a validated measurement.
    /// * `Err(DhtError)` on timeout, a busy line, a decode failure, or a
    ///   pin error.
    pub fn read(&mut self) -> Result<Reading, DhtError<E>> {
        let now = self.clock.now_ns();
        if let Some(cached) = self.cache {
            if now < cached.timestamp_ns + DATA_VALID_NS {
                return Ok(cached);
            }
        }

        let mut attempts = 0;
        loop {
            match self.acquire() {
                Ok(reading) => {
                    if reading.deci_humidity > MAX_DECI_HUMIDITY {
                        // A humidity past 100 % means the frame was
                        // misinterpreted, not noisy.
                        return Err(DhtError::Decode(DecodeError::UnknownEncoding));
                    }
                    self.cache = Some(reading);
                    return Ok(reading);
                }
                Err(DhtError::Decode(DecodeError::Checksum { .. }))
                    if attempts < CHECKSUM_RETRIES =>
                {
                    attempts += 1;
                    self.delay.delay_ms(RETRY_HOLDOFF_MS);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs one full acquisition: start pulse, edge collection, decode.
    fn acquire(&mut self) -> Result<Reading, DhtError<E>> {
        self.capture.arm().map_err(|_| DhtError::LineBusy)?;

        if let Err(e) = self.sample_edges() {
            self.capture.abort();
            return Err(e);
        }

        let (trace, offset) = match self.capture.finish() {
            Ok(closed) => closed,
            Err(CaptureError::Incomplete { edges }) => {
                return Err(DhtError::Timeout { edges });
            }
            Err(CaptureError::Busy) => return Err(DhtError::LineBusy),
        };

        decoder::decode(trace, offset).map_err(DhtError::Decode)
    }

    /// Requests a transmission and records edges until the capture
    /// completes or the deadline passes.
    ///
    /// The deadline is checked on every loop iteration so a stuck line can
    /// never hang the caller. A deadline expiry is not an error here; the
    /// capture itself decides whether enough edges arrived.
    fn sample_edges(&mut self) -> Result<(), DhtError<E>> {
        // MCU start request, then release the line to the sensor.
        self.pin.set_low()?;
        self.delay.delay_ms(START_TRANSMISSION_MS);
        self.pin.set_high()?;

        let deadline = self.clock.now_ns().saturating_add(READ_TIMEOUT_NS);
        let mut last = self.pin.is_high()?;

        loop {
            let now = self.clock.now_ns();
            if now >= deadline {
                return Ok(());
            }
            let level = self.pin.is_high()?;
            if level != last {
                last = level;
                if self.capture.record(now, level) == CaptureStatus::Complete {
                    return Ok(());
                }
            }
        }
    }
}
