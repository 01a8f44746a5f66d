//! Pure edge-timing decoder for the DHT22/DHT11 wire protocol.
//!
//! The decoder consumes an [`EdgeTrace`] captured by an acquisition layer
//! and turns it into a validated [`Reading`]. It performs no I/O, never
//! blocks, and is deterministic for identical input, so it is safe to call
//! concurrently for independent sensor lines.
//!
//! The sensor encodes each of its 40 data bits in the duration of one line
//! pulse: roughly 27 µs for a "0" and 70 µs for a "1". Rather than trusting
//! absolute durations, the decoder first measures the trace's own timing
//! resolution (the smallest gap between adjacent edges) and compares pulse
//! lengths in units of that resolution. This makes the decode robust against
//! clock granularity as long as the granularity is fine enough to separate
//! the two durations at all.

use crate::error::DecodeError;
use crate::trace::{BITS_PER_READ, EdgeTrace};

/// Duration of a "0" data bit pulse, in nanoseconds.
pub const DATA_BIT_LOW_NS: u64 = 27_000;

/// Duration of a "1" data bit pulse, in nanoseconds. Doubles as the cutoff
/// that separates the two bit values.
pub const DATA_BIT_HIGH_NS: u64 = 70_000;

/// Duration of one sensor response pulse; seeds the resolution scan.
pub const SENSOR_RESPONSE_NS: u64 = 80_000;

/// Humidity-high values below this mark the fixed-point tenths family.
const FIXED_POINT_HUMIDITY_LIMIT: u8 = 20;

/// Timing resolution of one trace.
///
/// Must be recomputed for every trace; a resolution from an earlier capture
/// is meaningless for a later one.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Smallest strictly-positive gap between adjacent edges, in nanoseconds.
    pub gap_ns: u64,
    /// Normalized gap count separating a long ("1") pulse from a short ("0")
    /// pulse.
    pub threshold: u64,
    /// True when the two bit durations are barely distinguishable at this
    /// resolution. Decoding proceeds, but the margin is thin.
    pub ambiguous: bool,
}

/// The five raw payload bytes of one transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawPayload {
    pub bytes: [u8; 5],
}

impl RawPayload {
    pub fn humidity_high(&self) -> u8 {
        self.bytes[0]
    }

    pub fn humidity_low(&self) -> u8 {
        self.bytes[1]
    }

    pub fn temperature_high(&self) -> u8 {
        self.bytes[2]
    }

    pub fn temperature_low(&self) -> u8 {
        self.bytes[3]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[4]
    }

    /// Checksum the four data bytes should add up to.
    pub fn computed_checksum(&self) -> u8 {
        self.bytes[..4]
            .iter()
            .fold(0u8, |sum, v| sum.wrapping_add(*v))
    }
}

/// Validated reading decoded from one transmission.
///
/// Values are kept as exact tenths so the sensor's 0.1-unit precision and
/// the temperature sign survive untouched; use [`Reading::temperature`] and
/// [`Reading::relative_humidity`] for floating-point views.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reading {
    /// Temperature in tenths of a degree Celsius.
    pub deci_celsius: i16,
    /// Relative humidity in tenths of a percent.
    pub deci_humidity: u16,
    /// Timestamp of the last edge of the capture, in nanoseconds.
    pub timestamp_ns: u64,
}

impl Reading {
    /// Temperature in degrees Celsius.
    pub fn temperature(&self) -> f32 {
        f32::from(self.deci_celsius) / 10.0
    }

    /// Relative humidity in percent.
    pub fn relative_humidity(&self) -> f32 {
        f32::from(self.deci_humidity) / 10.0
    }
}

/// Measures the timing resolution of a trace.
///
/// The resolution is the smallest strictly-positive gap between adjacent
/// edges. Fails when the clock behind the trace is too coarse: once
/// `2 * resolution` exceeds the "1"-pulse duration, a single clock step
/// cannot separate the two bit values and any decode would be guesswork.
pub fn calibrate(trace: &EdgeTrace) -> Result<Resolution, DecodeError> {
    let mut gap_ns = SENSOR_RESPONSE_NS;
    for pair in trace.as_slice().windows(2) {
        let gap = pair[1].timestamp_ns - pair[0].timestamp_ns;
        if gap > 0 && gap < gap_ns {
            gap_ns = gap;
        }
    }

    if 2 * gap_ns > DATA_BIT_HIGH_NS {
        return Err(DecodeError::Calibration {
            resolution_ns: gap_ns,
        });
    }

    let threshold = DATA_BIT_HIGH_NS / gap_ns;
    let ambiguous = DATA_BIT_LOW_NS / gap_ns + 1 >= threshold;
    if ambiguous {
        #[cfg(feature = "defmt")]
        defmt::warn!("bit decoding ambiguous at resolution {} ns", gap_ns);
    }

    Ok(Resolution {
        gap_ns,
        threshold,
        ambiguous,
    })
}

/// Decodes eight normalized gap measurements into one byte, MSB first.
///
/// A gap meeting the threshold reads as a "1"; the comparison is ordinal,
/// so ties go to "1".
pub fn decode_byte(timing: &[u64], threshold: u64) -> u8 {
    timing
        .iter()
        .fold(0u8, |byte, &gap| (byte << 1) | u8::from(gap >= threshold))
}

/// Extracts the five payload bytes from a trace.
///
/// `offset` marks where the data bits start: [`EDGES_PREAMBLE`] when the
/// full acknowledgement preamble was captured, two less when the sensor
/// skipped one preamble edge pair. Bit `i` is the gap between the edges at
/// `offset + 2i + 1` (the low marker opening the bit) and `offset + 2i + 2`.
///
/// [`EDGES_PREAMBLE`]: crate::trace::EDGES_PREAMBLE
pub fn decode_payload(
    trace: &EdgeTrace,
    offset: usize,
    resolution: Resolution,
) -> Result<RawPayload, DecodeError> {
    let edges = trace.as_slice();
    let mut timing = [0u64; BITS_PER_READ];

    for (i, slot) in timing.iter_mut().enumerate() {
        let marker = offset + 2 * i + 1;
        let (low, high) = match (edges.get(marker), edges.get(marker + 1)) {
            (Some(low), Some(high)) => (low, high),
            _ => return Err(DecodeError::SyncLost { edge: marker }),
        };
        if low.level {
            return Err(DecodeError::SyncLost { edge: marker });
        }
        *slot = (high.timestamp_ns - low.timestamp_ns) / resolution.gap_ns;
    }

    let mut bytes = [0u8; 5];
    for (byte, gaps) in bytes.iter_mut().zip(timing.chunks_exact(8)) {
        *byte = decode_byte(gaps, resolution.threshold);
    }

    Ok(RawPayload { bytes })
}

/// Validates the checksum and interprets the payload bytes.
///
/// Two payload layouts coexist on this wire format. Humidity-high bytes
/// below 20 mark the fixed-point family (16-bit tenths, temperature sign in
/// bit 7 of the high byte). Otherwise, zeroed low bytes mark the
/// whole-integer family, scaled here to tenths with the sign bit honored
/// the same way. The humidity-high boundary is a heuristic inherited from
/// the source driver, not a documented protocol discriminator.
pub fn validate_and_interpret(
    payload: RawPayload,
    timestamp_ns: u64,
) -> Result<Reading, DecodeError> {
    let expected = payload.computed_checksum();
    let actual = payload.checksum();
    if expected != actual {
        return Err(DecodeError::Checksum { expected, actual });
    }

    let [hum_hi, hum_lo, temp_hi, temp_lo, _] = payload.bytes;
    let negative = temp_hi & 0x80 != 0;

    let (deci_celsius, deci_humidity) = if hum_hi < FIXED_POINT_HUMIDITY_LIMIT {
        let magnitude = i16::from(temp_hi & 0x7F) << 8 | i16::from(temp_lo);
        let humidity = u16::from(hum_hi) << 8 | u16::from(hum_lo);
        (magnitude, humidity)
    } else if temp_lo == 0 && hum_lo == 0 {
        let magnitude = i16::from(temp_hi & 0x7F) * 10;
        (magnitude, u16::from(hum_hi) * 10)
    } else {
        return Err(DecodeError::UnknownEncoding);
    };

    Ok(Reading {
        deci_celsius: if negative { -deci_celsius } else { deci_celsius },
        deci_humidity,
        timestamp_ns,
    })
}

/// Runs the full pipeline: calibration, payload extraction, validation.
///
/// The reading's timestamp is taken from the last edge of the trace.
pub fn decode(trace: &EdgeTrace, offset: usize) -> Result<Reading, DecodeError> {
    let resolution = calibrate(trace)?;
    let payload = decode_payload(trace, offset, resolution)?;
    let timestamp_ns = trace.last().map(|e| e.timestamp_ns).unwrap_or(0);
    validate_and_interpret(payload, timestamp_ns)
}
