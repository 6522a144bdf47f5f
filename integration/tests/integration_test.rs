//! Sweeps against a rodbus TCP server running in the same process

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use modscan::client::RodbusFactory;
use modscan::*;
use rodbus::server::*;
use rodbus::{DecodeLevel, ExceptionCode, UnitId};

struct Handler {
    coils: [bool; 10],
    input_registers: [u16; 10],
    holding_registers: [u16; 10],
}

impl Handler {
    fn new() -> Self {
        let mut device = Self {
            coils: [false; 10],
            input_registers: [0; 10],
            holding_registers: [0; 10],
        };

        device.coils[0] = true;
        device.coils[2] = true;
        device.input_registers[0] = 0xFFFF;
        device.holding_registers[0] = 0x002A;

        device
    }
}

// discrete inputs keep the default handler and answer with an exception
impl RequestHandler for Handler {
    fn read_coil(&self, address: u16) -> Result<bool, ExceptionCode> {
        match self.coils.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn read_holding_register(&self, address: u16) -> Result<u16, ExceptionCode> {
        match self.holding_registers.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn read_input_register(&self, address: u16) -> Result<u16, ExceptionCode> {
        match self.input_registers.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }
}

fn tcp_params(addr: SocketAddr, lo: u32, hi: u32) -> ScanParams {
    ScanParams {
        transport: TransportKind::Tcp,
        endpoint: addr.to_string(),
        read_timeout: Duration::from_millis(500),
        device_id_lo: lo,
        device_id_hi: hi,
        quantity: 2,
        decode_type: DecodeType::Int16,
        ..ScanParams::default()
    }
}

#[tokio::test]
async fn sweeps_a_tcp_server() {
    let addr = SocketAddr::from_str("127.0.0.1:40100").unwrap();

    let _server = spawn_tcp_server_task(
        4,
        addr,
        ServerHandlerMap::single(UnitId::new(1), Handler::new().wrap()),
        AddressFilter::Any,
        DecodeLevel::default(),
    )
    .await
    .unwrap();

    let report = run(tcp_params(addr, 1, 2), RodbusFactory::new())
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.responsive, vec![1]);

    let device_1 = &report.rows[0];
    assert_eq!(device_1.device_id, 1);
    assert_eq!(device_1.connection_error, None);
    // coils 0 and 2 set: one packed byte, too short for int16
    assert_eq!(
        device_1.cell(ReadOperation::ReadCoils),
        &ProbeCell::Success(Err(DecodeError::InsufficientData {
            needed: 2,
            actual: 1
        }))
    );
    assert!(device_1
        .cell(ReadOperation::ReadDiscreteInputs)
        .text()
        .starts_with("device exception"));
    assert_eq!(device_1.cell(ReadOperation::ReadInputRegisters).text(), "-1");
    assert_eq!(device_1.cell(ReadOperation::ReadHoldingRegisters).text(), "42");

    // the server only maps unit id 1, other ids never answer
    let device_2 = &report.rows[1];
    assert_eq!(device_2.device_id, 2);
    assert!(!device_2.is_responsive());
    assert!(device_2.cells.iter().all(|x| x.status() == "Fail"));

    let table = report.render_table();
    assert!(table.contains("ReadHoldingRegisters 4x"));
    assert!(table.contains("Time-consuming"));
    assert!(report.summary().ends_with("responsive devices: 1"));
}

#[tokio::test]
async fn records_connect_failures_and_completes() {
    // nothing listens on this port
    let addr = SocketAddr::from_str("127.0.0.1:40101").unwrap();

    let report = run(tcp_params(addr, 5, 6), RodbusFactory::new())
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 2);
    assert!(report.responsive.is_empty());
    for row in &report.rows {
        assert!(row.connection_error.is_some());
        assert!(!row.is_responsive());
    }
    assert!(report.summary().ends_with("responsive devices: none"));
}

#[tokio::test]
async fn fail_fast_marks_reads_as_not_attempted() {
    let addr = SocketAddr::from_str("127.0.0.1:40102").unwrap();

    let report = run(
        ScanParams {
            on_connect_failure: ConnectFailurePolicy::FailFast,
            ..tcp_params(addr, 7, 7)
        },
        RodbusFactory::new(),
    )
    .await
    .unwrap();

    let row = &report.rows[0];
    assert!(row.connection_error.is_some());
    assert!(row
        .cells
        .iter()
        .all(|x| x.text().starts_with("not attempted")));
}

#[tokio::test]
async fn invalid_configuration_is_rejected_before_connecting() {
    let addr = SocketAddr::from_str("127.0.0.1:40103").unwrap();

    let result = run(
        ScanParams {
            stop_bits: 3,
            ..tcp_params(addr, 1, 1)
        },
        RodbusFactory::new(),
    )
    .await;

    assert_eq!(
        result,
        Err(ScanError::Config(ConfigError::BadStopBits(3)))
    );
}
