/// Failures of the pure edge-trace decoder.
///
/// All of these are recoverable by re-acquiring the line; none is meant to
/// reach a user as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The trace's timing resolution is too coarse to tell the two bit
    /// durations apart.
    Calibration {
        /// Smallest strictly-positive inter-edge gap found, in nanoseconds.
        resolution_ns: u64,
    },
    /// An edge expected to mark the start of a data bit was missing or had
    /// the wrong level; the bit stream is misaligned.
    SyncLost {
        /// Index of the offending edge position.
        edge: usize,
    },
    /// The payload checksum did not match the received data.
    Checksum { expected: u8, actual: u8 },
    /// The payload bytes match neither known sensor family.
    UnknownEncoding,
}

/// Failures of the edge capture state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureError {
    /// A capture is already in flight for this sensor line.
    Busy,
    /// Too few edges were collected before the capture was closed.
    Incomplete {
        /// Number of edges actually recorded.
        edges: usize,
    },
}

/// Possible errors from the acquisition driver.
#[derive(Debug, PartialEq, Eq)]
pub enum DhtError<E> {
    /// The sensor did not produce enough edges before the deadline.
    Timeout {
        /// Number of edges collected when the deadline expired.
        edges: usize,
    },
    /// A reading is already in progress on this line.
    LineBusy,
    /// The collected trace could not be decoded.
    Decode(DecodeError),
    /// Error from the GPIO pin (input/output).
    Pin(E),
}

impl<E> From<E> for DhtError<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}
