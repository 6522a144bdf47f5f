//! Connections backed by [rodbus](https://docs.rs/rodbus) channels
//!
//! Each device id gets its own channel: TCP channels connect to the configured host, RTU
//! channels open the configured serial port. The channel is dropped when the connection is
//! closed, which terminates the task that services it.

use std::net::IpAddr;
use std::time::Duration;

use rodbus::client::*;
use rodbus::*;
use tokio::sync::mpsc;

use crate::config::{self, Endpoint, ScanConfig, SerialParams};
use crate::error::{ConnectionError, ReadError};
use crate::transport::{pack_bits, registers_to_bytes, Connection, ConnectionFactory};
use crate::types::RegisterWindow;

use self::listener::{wait_for_link, StateListener};

mod listener;

/// Creates rodbus backed connections
#[derive(Clone, Copy, Debug)]
pub struct RodbusFactory {
    decode: DecodeLevel,
}

impl RodbusFactory {
    /// A factory that does not log protocol traffic
    pub fn new() -> Self {
        Self {
            decode: DecodeLevel::default(),
        }
    }

    /// Log decoded requests, responses and frame payloads at INFO
    pub fn with_frame_logging(mut self) -> Self {
        self.decode = DecodeLevel::new(
            AppDecodeLevel::DataValues,
            FrameDecodeLevel::Payload,
            PhysDecodeLevel::Nothing,
        );
        self
    }
}

impl Default for RodbusFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFactory for RodbusFactory {
    type Connection = RodbusConnection;

    fn open(&mut self, config: &ScanConfig, device_id: u8) -> RodbusConnection {
        RodbusConnection {
            endpoint: config.endpoint().clone(),
            serial: config.serial(),
            timeout: config.read_timeout(),
            decode: self.decode,
            param: RequestParam::new(UnitId::new(device_id), config.read_timeout()),
            channel: None,
        }
    }
}

/// A rodbus channel bound to one unit id
pub struct RodbusConnection {
    endpoint: Endpoint,
    serial: SerialParams,
    timeout: Duration,
    decode: DecodeLevel,
    param: RequestParam,
    channel: Option<Channel>,
}

enum LinkEvents {
    Tcp(mpsc::Receiver<ClientState>),
    Serial(mpsc::Receiver<PortState>),
}

impl RodbusConnection {
    fn spawn(&self) -> (Channel, LinkEvents) {
        match &self.endpoint {
            Endpoint::Tcp { host, port } => {
                let (listener, rx) = StateListener::create();
                let addr = match host.parse::<IpAddr>() {
                    Ok(ip) => HostAddr::ip(ip, *port),
                    Err(_) => HostAddr::dns(host.clone(), *port),
                };
                let channel = spawn_tcp_client_task(
                    addr,
                    1,
                    default_retry_strategy(),
                    self.decode,
                    Some(Box::new(listener)),
                );
                (channel, LinkEvents::Tcp(rx))
            }
            Endpoint::Serial(path) => {
                let (listener, rx) = StateListener::create();
                let channel = spawn_rtu_client_task(
                    path,
                    serial_settings(self.serial),
                    1,
                    default_retry_strategy(),
                    self.decode,
                    Some(Box::new(listener)),
                );
                (channel, LinkEvents::Serial(rx))
            }
        }
    }

    fn channel(&mut self) -> Result<&mut Channel, ReadError> {
        self.channel.as_mut().ok_or(ReadError::NoConnection)
    }

    async fn read_bits(
        &mut self,
        window: RegisterWindow,
        discrete: bool,
    ) -> Result<Vec<u8>, ReadError> {
        let param = self.param;
        let range = address_range(window)?;
        let channel = self.channel()?;
        let values = if discrete {
            channel.read_discrete_inputs(param, range).await
        } else {
            channel.read_coils(param, range).await
        }
        .map_err(read_error)?;
        Ok(pack_bits(values.into_iter().map(|x| x.value)))
    }

    async fn read_registers(
        &mut self,
        window: RegisterWindow,
        input: bool,
    ) -> Result<Vec<u8>, ReadError> {
        let param = self.param;
        let range = address_range(window)?;
        let channel = self.channel()?;
        let values = if input {
            channel.read_input_registers(param, range).await
        } else {
            channel.read_holding_registers(param, range).await
        }
        .map_err(read_error)?;
        Ok(registers_to_bytes(values.into_iter().map(|x| x.value)))
    }
}

impl Connection for RodbusConnection {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let (channel, events) = self.spawn();
        let enabled = channel.enable().await;
        self.channel = Some(channel);
        if enabled.is_err() {
            return Err(ConnectionError::Shutdown);
        }

        match events {
            LinkEvents::Tcp(mut rx) => wait_for_link(&mut rx, self.timeout).await,
            LinkEvents::Serial(mut rx) => wait_for_link(&mut rx, self.timeout).await,
        }
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(err) = channel.disable().await {
                tracing::debug!("channel already stopped: {err:?}");
            }
        }
    }

    async fn read_coils(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read_bits(window, false).await
    }

    async fn read_discrete_inputs(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read_bits(window, true).await
    }

    async fn read_input_registers(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read_registers(window, true).await
    }

    async fn read_holding_registers(
        &mut self,
        window: RegisterWindow,
    ) -> Result<Vec<u8>, ReadError> {
        self.read_registers(window, false).await
    }
}

fn address_range(window: RegisterWindow) -> Result<AddressRange, ReadError> {
    AddressRange::try_from(window.address, window.quantity)
        .map_err(|err| ReadError::BadRequest(err.to_string()))
}

fn read_error(err: RequestError) -> ReadError {
    match err {
        RequestError::ResponseTimeout => ReadError::Timeout,
        RequestError::NoConnection => ReadError::NoConnection,
        RequestError::Exception(code) => ReadError::Exception(code.to_string()),
        RequestError::BadRequest(err) => ReadError::BadRequest(err.to_string()),
        other => ReadError::Transport(other.to_string()),
    }
}

fn serial_settings(params: SerialParams) -> SerialSettings {
    SerialSettings {
        baud_rate: params.baud_rate,
        data_bits: match params.data_bits {
            config::DataBits::Five => rodbus::DataBits::Five,
            config::DataBits::Six => rodbus::DataBits::Six,
            config::DataBits::Seven => rodbus::DataBits::Seven,
            config::DataBits::Eight => rodbus::DataBits::Eight,
        },
        flow_control: rodbus::FlowControl::None,
        stop_bits: match params.stop_bits {
            config::StopBits::One => rodbus::StopBits::One,
            config::StopBits::Two => rodbus::StopBits::Two,
        },
        parity: match params.parity {
            config::Parity::None => rodbus::Parity::None,
            config::Parity::Even => rodbus::Parity::Even,
            config::Parity::Odd => rodbus::Parity::Odd,
        },
    }
}
