use std::future::Future;

use crate::config::ScanConfig;
use crate::error::{ConnectionError, ReadError};
use crate::types::RegisterWindow;

/// A logical session with exactly one device id
///
/// Reads return the raw payload octets: registers as big-endian 16-bit words, coils and
/// discrete inputs packed LSB-first, eight per byte.
pub trait Connection {
    /// Establish the link. A failure here is recorded but does not end the scan.
    fn connect(&mut self) -> impl Future<Output = Result<(), ConnectionError>>;

    /// Release the link. Called exactly once per connection, whatever the sweep did.
    fn close(&mut self) -> impl Future<Output = ()>;

    /// read coils (0x01)
    fn read_coils(
        &mut self,
        window: RegisterWindow,
    ) -> impl Future<Output = Result<Vec<u8>, ReadError>>;

    /// read discrete inputs (0x02)
    fn read_discrete_inputs(
        &mut self,
        window: RegisterWindow,
    ) -> impl Future<Output = Result<Vec<u8>, ReadError>>;

    /// read input registers (0x04)
    fn read_input_registers(
        &mut self,
        window: RegisterWindow,
    ) -> impl Future<Output = Result<Vec<u8>, ReadError>>;

    /// read holding registers (0x03)
    fn read_holding_registers(
        &mut self,
        window: RegisterWindow,
    ) -> impl Future<Output = Result<Vec<u8>, ReadError>>;
}

/// Produces a [`Connection`] bound to a single device id
pub trait ConnectionFactory {
    /// Connection type produced by the factory
    type Connection: Connection;

    /// Create an unconnected handle for `device_id`
    fn open(&mut self, config: &ScanConfig, device_id: u8) -> Self::Connection;
}

/// Pack bit values LSB-first into bytes, the layout used on the wire for coils
pub fn pack_bits<I>(bits: I) -> Vec<u8>
where
    I: IntoIterator<Item = bool>,
{
    let mut bytes = Vec::new();
    for (i, bit) in bits.into_iter().enumerate() {
        if i % 8 == 0 {
            bytes.push(0);
        }
        if bit {
            if let Some(last) = bytes.last_mut() {
                *last |= 1 << (i % 8);
            }
        }
    }
    bytes
}

/// Serialize registers as big-endian words
pub fn registers_to_bytes<I>(registers: I) -> Vec<u8>
where
    I: IntoIterator<Item = u16>,
{
    registers
        .into_iter()
        .flat_map(|x| x.to_be_bytes())
        .collect()
}
