//! In-memory device population implementing [`ConnectionFactory`]
//!
//! Useful for exercising a scan without hardware and for embedding the engine in tests.
//! Every open, connect, read and close is recorded in a [`Journal`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::config::ScanConfig;
use crate::error::{ConnectionError, ReadError};
use crate::transport::{pack_bits, registers_to_bytes, Connection, ConnectionFactory};
use crate::types::{ReadOperation, RegisterWindow};

/// Something that happened on the simulated bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    /// a connection handle was created for the device id
    Open(u8),
    /// connect was called for the device id
    Connect(u8),
    /// a read was issued to the device id
    Read(u8, ReadOperation),
    /// the connection for the device id was closed
    Close(u8),
}

/// Shared, append-only record of bus events
#[derive(Clone, Debug, Default)]
pub struct Journal {
    inner: Rc<RefCell<Vec<BusEvent>>>,
}

impl Journal {
    fn push(&self, event: BusEvent) {
        self.inner.borrow_mut().push(event);
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<BusEvent> {
        self.inner.borrow().clone()
    }

    /// Number of reads issued so far
    pub fn read_count(&self) -> usize {
        self.inner
            .borrow()
            .iter()
            .filter(|x| matches!(x, BusEvent::Read(..)))
            .count()
    }
}

/// Data tables of one simulated device
///
/// A table that was never set answers with an illegal function exception.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimDevice {
    coils: Option<Vec<bool>>,
    discrete_inputs: Option<Vec<bool>>,
    input_registers: Option<Vec<u16>>,
    holding_registers: Option<Vec<u16>>,
}

impl SimDevice {
    /// A device that answers every read with an exception
    pub fn new() -> Self {
        Self::default()
    }

    /// set the coil table, starting at address 0
    pub fn coils(mut self, values: &[bool]) -> Self {
        self.coils = Some(values.to_vec());
        self
    }

    /// set the discrete input table, starting at address 0
    pub fn discrete_inputs(mut self, values: &[bool]) -> Self {
        self.discrete_inputs = Some(values.to_vec());
        self
    }

    /// set the input register table, starting at address 0
    pub fn input_registers(mut self, values: &[u16]) -> Self {
        self.input_registers = Some(values.to_vec());
        self
    }

    /// set the holding register table, starting at address 0
    pub fn holding_registers(mut self, values: &[u16]) -> Self {
        self.holding_registers = Some(values.to_vec());
        self
    }

    fn read(&self, operation: ReadOperation, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        match operation {
            ReadOperation::ReadCoils => {
                select(self.coils.as_deref(), window).map(|x| pack_bits(x.iter().copied()))
            }
            ReadOperation::ReadDiscreteInputs => select(self.discrete_inputs.as_deref(), window)
                .map(|x| pack_bits(x.iter().copied())),
            ReadOperation::ReadInputRegisters => select(self.input_registers.as_deref(), window)
                .map(|x| registers_to_bytes(x.iter().copied())),
            ReadOperation::ReadHoldingRegisters => {
                select(self.holding_registers.as_deref(), window)
                    .map(|x| registers_to_bytes(x.iter().copied()))
            }
        }
    }
}

fn select<T>(table: Option<&[T]>, window: RegisterWindow) -> Result<&[T], ReadError> {
    let table = table.ok_or_else(|| ReadError::Exception("illegal function".to_string()))?;
    let start = window.address as usize;
    let end = start + window.quantity as usize;
    table
        .get(start..end)
        .ok_or_else(|| ReadError::Exception("illegal data address".to_string()))
}

/// A simulated bus holding any number of devices
///
/// Ids with no device never answer (reads time out). Unreachable ids fail to connect.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    devices: BTreeMap<u8, SimDevice>,
    unreachable: BTreeSet<u8>,
    journal: Journal,
}

impl SimulatedBus {
    /// An empty bus on which no id answers
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a device at `device_id`
    pub fn with_device(mut self, device_id: u8, device: SimDevice) -> Self {
        self.devices.insert(device_id, device);
        self
    }

    /// Make connecting to `device_id` fail
    pub fn with_unreachable(mut self, device_id: u8) -> Self {
        self.unreachable.insert(device_id);
        self
    }

    /// Handle on the event journal, shared with every connection opened afterwards
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

/// Connection to one id on a [`SimulatedBus`]
#[derive(Debug)]
pub struct SimConnection {
    device_id: u8,
    device: Option<SimDevice>,
    reachable: bool,
    journal: Journal,
}

impl ConnectionFactory for SimulatedBus {
    type Connection = SimConnection;

    fn open(&mut self, _config: &ScanConfig, device_id: u8) -> SimConnection {
        self.journal.push(BusEvent::Open(device_id));
        SimConnection {
            device_id,
            device: self.devices.get(&device_id).cloned(),
            reachable: !self.unreachable.contains(&device_id),
            journal: self.journal.clone(),
        }
    }
}

impl SimConnection {
    fn read(&mut self, operation: ReadOperation, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.journal.push(BusEvent::Read(self.device_id, operation));
        if !self.reachable {
            return Err(ReadError::NoConnection);
        }
        match &self.device {
            Some(device) => device.read(operation, window),
            None => Err(ReadError::Timeout),
        }
    }
}

impl Connection for SimConnection {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.journal.push(BusEvent::Connect(self.device_id));
        if self.reachable {
            Ok(())
        } else {
            Err(ConnectionError::Failed("connection refused".to_string()))
        }
    }

    async fn close(&mut self) {
        self.journal.push(BusEvent::Close(self.device_id));
    }

    async fn read_coils(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read(ReadOperation::ReadCoils, window)
    }

    async fn read_discrete_inputs(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read(ReadOperation::ReadDiscreteInputs, window)
    }

    async fn read_input_registers(&mut self, window: RegisterWindow) -> Result<Vec<u8>, ReadError> {
        self.read(ReadOperation::ReadInputRegisters, window)
    }

    async fn read_holding_registers(
        &mut self,
        window: RegisterWindow,
    ) -> Result<Vec<u8>, ReadError> {
        self.read(ReadOperation::ReadHoldingRegisters, window)
    }
}
