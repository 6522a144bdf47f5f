use std::net::IpAddr;
use std::time::Duration;

use crate::decode::DecodeType;
use crate::error::ConfigError;
use crate::types::{DeviceIdRange, ReadOperation, RegisterWindow};

/// Which variant of the protocol is used to reach the devices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// RTU over a serial line
    Serial,
    /// Modbus TCP (MBAP framing)
    Tcp,
}

/// Number of data bits per serial character
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataBits {
    /// 5 bits
    Five,
    /// 6 bits
    Six,
    /// 7 bits
    Seven,
    /// 8 bits
    Eight,
}

/// Serial parity checking mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// no parity bit
    None,
    /// even parity
    Even,
    /// odd parity
    Odd,
}

/// Number of serial stop bits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    /// 1 stop bit
    One,
    /// 2 stop bits
    Two,
}

/// Serial line parameters, ignored by the TCP transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialParams {
    /// baud rate of the port
    pub baud_rate: u32,
    /// data bits per character
    pub data_bits: DataBits,
    /// parity mode
    pub parity: Parity,
    /// stop bits
    pub stop_bits: StopBits,
}

/// Where the devices are reached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// path or name of a serial port (e.g. `/dev/ttyUSB0`, `COM1`)
    Serial(String),
    /// TCP host (IP address or DNS name) and port
    Tcp {
        /// IP address or host name
        host: String,
        /// TCP port
        port: u16,
    },
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Serial(path) => f.write_str(path),
            Endpoint::Tcp { host, port } => match host.parse::<IpAddr>() {
                Ok(IpAddr::V6(_)) => write!(f, "[{host}]:{port}"),
                _ => write!(f, "{host}:{port}"),
            },
        }
    }
}

/// What to do with the four reads of a device whose link could not be established
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectFailurePolicy {
    /// log the connection error and still issue the reads, letting each one fail on its own
    #[default]
    AttemptReads,
    /// record all four reads as failed with the connection error, without issuing them
    FailFast,
}

/// Raw, unvalidated scan parameters as supplied by a user
///
/// Wide integer types are used so that out of range input can be represented and rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanParams {
    /// transport variant
    pub transport: TransportKind,
    /// serial port name or `host:port`
    pub endpoint: String,
    /// serial baud rate
    pub baud_rate: u32,
    /// serial data bits, valid values are 5 through 8
    pub data_bits: u32,
    /// serial parity: `N`, `E` or `O`
    pub parity: String,
    /// serial stop bits, 1 or 2
    pub stop_bits: u32,
    /// maximum time to wait for the link to come up and for each response
    pub read_timeout: Duration,
    /// first device id to probe
    pub device_id_lo: u32,
    /// last device id to probe
    pub device_id_hi: u32,
    /// start address of the window read from each data class
    pub address: u16,
    /// number of coils/registers read from each data class
    pub quantity: u16,
    /// interpretation of successful payloads
    pub decode_type: DecodeType,
    /// handling of reads after a failed connect
    pub on_connect_failure: ConnectFailurePolicy,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            transport: TransportKind::Serial,
            endpoint: "COM1".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: "N".to_string(),
            stop_bits: 1,
            read_timeout: Duration::from_secs(2),
            device_id_lo: 1,
            device_id_hi: 3,
            address: 0,
            quantity: 8,
            decode_type: DecodeType::Uint16,
            on_connect_failure: ConnectFailurePolicy::AttemptReads,
        }
    }
}

/// Validated scan configuration
///
/// Can only be obtained from [`ScanParams::validate`] and cannot be modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanConfig {
    endpoint: Endpoint,
    serial: SerialParams,
    read_timeout: Duration,
    device_ids: DeviceIdRange,
    window: RegisterWindow,
    decode_type: DecodeType,
    on_connect_failure: ConnectFailurePolicy,
}

impl ScanParams {
    /// Validate the parameters, failing on the first field that is out of range
    ///
    /// Fields are checked in this order: data bits, parity, stop bits, device id bounds,
    /// device id ordering, quantity, endpoint.
    pub fn validate(self) -> Result<ScanConfig, ConfigError> {
        let data_bits = match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            x => return Err(ConfigError::BadDataBits(x)),
        };

        let parity = match self.parity.as_str() {
            "N" => Parity::None,
            "E" => Parity::Even,
            "O" => Parity::Odd,
            _ => return Err(ConfigError::BadParity(self.parity)),
        };

        let stop_bits = match self.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            x => return Err(ConfigError::BadStopBits(x)),
        };

        let (lo, hi) = match (
            u8::try_from(self.device_id_lo),
            u8::try_from(self.device_id_hi),
        ) {
            (Ok(lo), Ok(hi)) => (lo, hi),
            _ => {
                return Err(ConfigError::DeviceIdOutOfRange {
                    lo: self.device_id_lo,
                    hi: self.device_id_hi,
                })
            }
        };

        if lo > hi {
            return Err(ConfigError::InvertedDeviceIdRange { lo, hi });
        }

        if self.quantity == 0 {
            return Err(ConfigError::ZeroQuantity);
        }

        let endpoint = parse_endpoint(self.transport, &self.endpoint)?;

        if !self.decode_type.is_recognized() {
            tracing::warn!(
                "unrecognized decode type '{}', successful reads will have an empty value",
                self.decode_type
            );
        }

        Ok(ScanConfig {
            endpoint,
            serial: SerialParams {
                baud_rate: self.baud_rate,
                data_bits,
                parity,
                stop_bits,
            },
            read_timeout: self.read_timeout,
            device_ids: DeviceIdRange { lo, hi },
            window: RegisterWindow::new(self.address, self.quantity),
            decode_type: self.decode_type,
            on_connect_failure: self.on_connect_failure,
        })
    }
}

fn parse_endpoint(transport: TransportKind, endpoint: &str) -> Result<Endpoint, ConfigError> {
    let bad = |reason| ConfigError::BadEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    match transport {
        TransportKind::Serial => {
            if endpoint.trim().is_empty() {
                return Err(bad("serial port name is empty"));
            }
            Ok(Endpoint::Serial(endpoint.to_string()))
        }
        TransportKind::Tcp => {
            let (host, port) = endpoint
                .rsplit_once(':')
                .ok_or_else(|| bad("expected host:port"))?;
            let port = port.parse::<u16>().map_err(|_| bad("invalid port"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(bad("host is empty"));
            }
            Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            })
        }
    }
}

impl ScanConfig {
    /// transport variant used to reach the devices
    pub fn transport(&self) -> TransportKind {
        match self.endpoint {
            Endpoint::Serial(_) => TransportKind::Serial,
            Endpoint::Tcp { .. } => TransportKind::Tcp,
        }
    }

    /// where the devices are reached
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// serial line parameters
    pub fn serial(&self) -> SerialParams {
        self.serial
    }

    /// maximum time to wait for a link or a response
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// device ids probed, ascending
    pub fn device_ids(&self) -> DeviceIdRange {
        self.device_ids
    }

    /// window read from each data class
    pub fn window(&self) -> RegisterWindow {
        self.window
    }

    /// interpretation of successful payloads
    pub fn decode_type(&self) -> &DecodeType {
        &self.decode_type
    }

    /// handling of reads after a failed connect
    pub fn on_connect_failure(&self) -> ConnectFailurePolicy {
        self.on_connect_failure
    }

    /// Upper bound on the wall-clock duration of a scan in which no device answers
    ///
    /// Every one of the four reads of every device id may block for the full read timeout.
    pub fn worst_case_duration(&self) -> Duration {
        let reads = self.device_ids.len() * ReadOperation::ALL.len();
        self.read_timeout.saturating_mul(reads as u32)
    }
}
