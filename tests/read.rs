//! End-to-end acquisition tests against a simulated sensor.
//!
//! The simulator models the shared data line as a queue of waveform frames.
//! Pulling the line low resets the frame; releasing it arms the next frame
//! at the current simulated time. The clock advances one microsecond per
//! sample, so edge timestamps land within one tick of the true waveform.

use std::cell::RefCell;
use std::rc::Rc;

use dht_edge::{DecodeError, Dht, DhtError, MonotonicClock};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

const TICK_NS: u64 = 1_000;

#[derive(Clone, Copy)]
struct Segment {
    duration_ns: u64,
    level: bool,
}

fn seg(duration_ns: u64, level: bool) -> Segment {
    Segment { duration_ns, level }
}

struct Frame {
    segments: Vec<Segment>,
}

/// A full transmission: release blip, two response pulses, then one pulse
/// pair per data bit. Produces 85 line transitions.
fn full_frame(bytes: [u8; 5]) -> Frame {
    let mut segments = vec![
        seg(5_000, false),
        seg(20_000, true),
        seg(80_000, false),
        seg(80_000, true),
        seg(50_000, false),
    ];
    push_bits(&mut segments, bytes);
    Frame { segments }
}

/// A transmission missing one preamble edge pair: the line never floats
/// high before the sensor responds. Produces 83 transitions.
fn reduced_preamble_frame(bytes: [u8; 5]) -> Frame {
    let mut segments = vec![seg(100_000, false), seg(80_000, true), seg(50_000, false)];
    push_bits(&mut segments, bytes);
    Frame { segments }
}

/// A dead line: the sensor never answers.
fn silent_frame() -> Frame {
    Frame {
        segments: Vec::new(),
    }
}

fn push_bits(segments: &mut Vec<Segment>, bytes: [u8; 5]) {
    for byte in bytes {
        for i in 0..8 {
            let bit = (byte >> (7 - i)) & 1;
            segments.push(seg(50_000, true));
            segments.push(seg(if bit == 1 { 70_000 } else { 27_000 }, false));
        }
    }
}

struct Bus {
    now_ns: u64,
    host_level: bool,
    anchor_ns: Option<u64>,
    frames: Vec<Frame>,
    active: Option<Frame>,
}

impl Bus {
    fn new(frames: Vec<Frame>) -> Rc<RefCell<Bus>> {
        Rc::new(RefCell::new(Bus {
            now_ns: 0,
            host_level: true,
            anchor_ns: None,
            frames,
            active: None,
        }))
    }

    fn level_at(&self, t: u64) -> bool {
        let (Some(anchor), Some(frame)) = (self.anchor_ns, self.active.as_ref()) else {
            return self.host_level;
        };
        let mut start = anchor;
        for segment in &frame.segments {
            if t < start + segment.duration_ns {
                return segment.level;
            }
            start += segment.duration_ns;
        }
        // Line idles high once the transmission is over.
        true
    }
}

#[derive(Clone)]
struct SimPin(Rc<RefCell<Bus>>);

impl ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        bus.host_level = false;
        bus.anchor_ns = None;
        bus.active = None;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        bus.host_level = true;
        if !bus.frames.is_empty() {
            let frame = bus.frames.remove(0);
            bus.anchor_ns = Some(bus.now_ns);
            bus.active = Some(frame);
        }
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let bus = self.0.borrow();
        Ok(bus.level_at(bus.now_ns))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|level| !level)
    }
}

#[derive(Clone)]
struct SimClock(Rc<RefCell<Bus>>);

impl MonotonicClock for SimClock {
    fn now_ns(&mut self) -> u64 {
        let mut bus = self.0.borrow_mut();
        bus.now_ns += TICK_NS;
        bus.now_ns
    }
}

#[derive(Clone)]
struct SimDelay(Rc<RefCell<Bus>>);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now_ns += u64::from(ns);
    }
}

fn driver(frames: Vec<Frame>) -> Dht<SimPin, SimDelay, SimClock> {
    let bus = Bus::new(frames);
    Dht::new(
        SimPin(Rc::clone(&bus)),
        SimDelay(Rc::clone(&bus)),
        SimClock(bus),
    )
}

const VALID: [u8; 5] = [0x02, 0x8C, 0x01, 0x08, 0x97];

#[test]
fn reads_a_full_transmission() {
    let mut dht = driver(vec![full_frame(VALID)]);

    let reading = dht.read().unwrap();
    assert_eq!(reading.deci_humidity, 652);
    assert_eq!(reading.deci_celsius, 264);
    assert_eq!(reading.relative_humidity(), 65.2);
    assert_eq!(reading.temperature(), 26.4);
}

#[test]
fn reads_a_reduced_preamble_transmission() {
    let mut dht = driver(vec![reduced_preamble_frame(VALID)]);

    let reading = dht.read().unwrap();
    assert_eq!(reading.deci_humidity, 652);
    assert_eq!(reading.deci_celsius, 264);
}

#[test]
fn second_read_is_served_from_cache() {
    // Only one frame is queued; a second acquisition would time out, so a
    // matching second reading proves the cache answered.
    let mut dht = driver(vec![full_frame(VALID)]);

    let first = dht.read().unwrap();
    let second = dht.read().unwrap();
    assert_eq!(first, second);
}

#[test]
fn corrupted_frame_is_retried() {
    let mut corrupted = VALID;
    corrupted[4] = corrupted[4].wrapping_add(1);
    let mut dht = driver(vec![full_frame(corrupted), full_frame(VALID)]);

    let reading = dht.read().unwrap();
    assert_eq!(reading.deci_humidity, 652);
    assert_eq!(reading.deci_celsius, 264);
}

#[test]
fn negative_temperature_reading() {
    let bytes = [0x0A, 0x00, 0x85, 0x14, 0xA3];
    let mut dht = driver(vec![full_frame(bytes)]);

    let reading = dht.read().unwrap();
    assert_eq!(reading.deci_celsius, -((5 << 8) + 0x14));
    assert!(reading.temperature() < 0.0);
}

#[test]
fn out_of_range_humidity_is_rejected() {
    // 100.1 %: checksum-valid but physically impossible.
    let bytes = [0x03, 0xE9, 0x00, 0x64, 0x50];
    let mut dht = driver(vec![full_frame(bytes)]);

    assert_eq!(
        dht.read().unwrap_err(),
        DhtError::Decode(DecodeError::UnknownEncoding)
    );
}

#[test]
fn dead_line_times_out_and_driver_recovers() {
    let mut dht = driver(vec![silent_frame(), full_frame(VALID)]);

    assert_eq!(dht.read().unwrap_err(), DhtError::Timeout { edges: 0 });

    // The timeout must leave the driver idle and ready; the next request
    // acquires normally.
    let reading = dht.read().unwrap();
    assert_eq!(reading.deci_humidity, 652);
}
