/// Errors that result from invalid scan parameters
///
/// These are detected before any connection is opened and abort the scan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// data bits must be in the range [5, 8]
    #[error("data bits must be 5, 6, 7 or 8 (received {0})")]
    BadDataBits(u32),
    /// parity must be one of N, E or O
    #[error("parity must be N, E or O (received '{0}')")]
    BadParity(String),
    /// stop bits must be 1 or 2
    #[error("stop bits must be 1 or 2 (received {0})")]
    BadStopBits(u32),
    /// one of the device id bounds exceeds 255
    #[error("device id bounds must be <= 255 (received {lo} and {hi})")]
    DeviceIdOutOfRange {
        /// lower bound as supplied
        lo: u32,
        /// upper bound as supplied
        hi: u32,
    },
    /// lower device id bound is greater than the upper bound
    #[error("device id range is inverted ({lo} > {hi})")]
    InvertedDeviceIdRange {
        /// lower bound
        lo: u8,
        /// upper bound
        hi: u8,
    },
    /// register quantity of zero
    #[error("register quantity must be at least 1")]
    ZeroQuantity,
    /// endpoint could not be interpreted for the selected transport
    #[error("bad endpoint '{endpoint}': {reason}")]
    BadEndpoint {
        /// endpoint as supplied
        endpoint: String,
        /// why it was rejected
        reason: &'static str,
    },
}

/// The link to a device could not be established
///
/// Never fatal to the scan, it is recorded against the device id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// the link did not come up before the read timeout elapsed
    #[error("link not established within {0} ms")]
    Timeout(u128),
    /// the link reported a failure while connecting or opening
    #[error("link failed: {0}")]
    Failed(String),
    /// the task servicing the link shut down
    #[error("link task shut down")]
    Shutdown,
}

/// A single read operation failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// no response was received within the read timeout
    #[error("timeout occurred before receiving a response from the device")]
    Timeout,
    /// no link exists to the device
    #[error("no connection exists to the device")]
    NoConnection,
    /// the device replied with a Modbus exception
    #[error("device exception: {0}")]
    Exception(String),
    /// the request was rejected locally before being sent
    #[error("bad request: {0}")]
    BadRequest(String),
    /// any other transport fault, including malformed responses
    #[error("{0}")]
    Transport(String),
    /// the link could not be established and reads were not attempted
    #[error("not attempted, {0}")]
    NotAttempted(ConnectionError),
}

/// A successful read could not be interpreted as the configured type
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// fewer bytes than the width of the decode type
    #[error("insufficient data: {needed} bytes required, {actual} received")]
    InsufficientData {
        /// width of the decode type
        needed: usize,
        /// number of bytes actually read
        actual: usize,
    },
}

/// Errors that prevent a scan from producing a report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// parameters failed validation, nothing was probed
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// the scan was cancelled between two device ids
    #[error("scan cancelled after probing {probed} device(s)")]
    Cancelled {
        /// number of device ids fully probed before cancellation
        probed: usize,
    },
}

impl ReadError {
    /// true if the error indicates the device never answered
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            ReadError::Timeout | ReadError::NoConnection | ReadError::NotAttempted(_)
        )
    }
}
