use crate::error::{ConnectionError, ReadError};
use crate::transport::Connection;
use crate::types::{ReadOperation, RegisterWindow};

/// Result of one read operation against one device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadOutcome {
    /// operation that was attempted
    pub operation: ReadOperation,
    /// raw payload on success, the transport error otherwise
    pub result: Result<Vec<u8>, ReadError>,
}

impl ReadOutcome {
    /// Create an outcome from its fields
    pub fn new(operation: ReadOperation, result: Result<Vec<u8>, ReadError>) -> Self {
        Self { operation, result }
    }

    /// True if the read succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Attempt the four reads against one connection, strictly in [`ReadOperation::ALL`] order
///
/// Every operation is attempted exactly once, whatever happened to the previous ones.
pub async fn sweep<C>(connection: &mut C, window: RegisterWindow) -> [ReadOutcome; 4]
where
    C: Connection,
{
    [
        ReadOutcome::new(
            ReadOperation::ReadCoils,
            connection.read_coils(window).await,
        ),
        ReadOutcome::new(
            ReadOperation::ReadDiscreteInputs,
            connection.read_discrete_inputs(window).await,
        ),
        ReadOutcome::new(
            ReadOperation::ReadInputRegisters,
            connection.read_input_registers(window).await,
        ),
        ReadOutcome::new(
            ReadOperation::ReadHoldingRegisters,
            connection.read_holding_registers(window).await,
        ),
    ]
}

/// Four failed outcomes carrying a connection error, used when reads are skipped
pub fn not_attempted(err: &ConnectionError) -> [ReadOutcome; 4] {
    ReadOperation::ALL.map(|op| ReadOutcome::new(op, Err(ReadError::NotAttempted(err.clone()))))
}
