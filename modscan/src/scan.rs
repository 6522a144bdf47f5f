use tokio_util::sync::CancellationToken;

use crate::config::{ConnectFailurePolicy, ScanConfig, ScanParams};
use crate::error::ScanError;
use crate::report::{DeviceProbeRow, ProbeCell, ReportBuilder, ScanReport};
use crate::sweep::{not_attempted, sweep, ReadOutcome};
use crate::transport::{Connection, ConnectionFactory};

/// Drives a sweep of every device id in the configured range
///
/// Device ids are probed one at a time in ascending order. Each id gets its own connection
/// which is opened immediately before its four reads and closed immediately after.
/// A scan in which no device answers takes up to [`ScanConfig::worst_case_duration`].
pub struct Scanner<F> {
    config: ScanConfig,
    factory: F,
    cancel: Option<CancellationToken>,
}

impl<F> Scanner<F>
where
    F: ConnectionFactory,
{
    /// Create a scanner from a validated configuration
    pub fn new(config: ScanConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            cancel: None,
        }
    }

    /// Check `token` before each device id, abandoning the scan once it is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// configuration the scanner runs with
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Probe every device id and return the report
    ///
    /// Individual connection and read failures are recorded in the report and never end
    /// the scan early. Only cancellation does, in which case no report is produced.
    pub async fn run(mut self) -> Result<ScanReport, ScanError> {
        let ids = self.config.device_ids();

        tracing::info!(
            "scanning device ids {}..={} on {} ({}), decode type: {}",
            ids.lo,
            ids.hi,
            self.config.endpoint(),
            self.config.window(),
            self.config.decode_type()
        );

        let mut report = ReportBuilder::start(ids.len());

        for device_id in ids.iter() {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    tracing::warn!("scan cancelled before device id {device_id}");
                    return Err(ScanError::Cancelled {
                        probed: report.len(),
                    });
                }
            }

            let row = self.probe(device_id).await;
            report.push(row);
        }

        let report = report.finish();
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    async fn probe(&mut self, device_id: u8) -> DeviceProbeRow {
        let mut connection = self.factory.open(&self.config, device_id);
        tracing::debug!("device {device_id}: opened connection");

        let connection_error = match connection.connect().await {
            Ok(()) => None,
            Err(err) => {
                tracing::error!("device {device_id}: connect error: {err}");
                Some(err)
            }
        };

        let outcomes = match (&connection_error, self.config.on_connect_failure()) {
            (Some(err), ConnectFailurePolicy::FailFast) => not_attempted(err),
            _ => sweep(&mut connection, self.config.window()).await,
        };

        connection.close().await;
        tracing::debug!("device {device_id}: closed connection");

        let row = DeviceProbeRow::new(
            device_id,
            &outcomes,
            self.config.decode_type(),
            connection_error,
        );

        for (outcome, cell) in outcomes.iter().zip(row.cells.iter()) {
            log_outcome(device_id, outcome, cell);
        }

        row
    }
}

fn log_outcome(device_id: u8, outcome: &ReadOutcome, cell: &ProbeCell) {
    let op = outcome.operation;
    match &outcome.result {
        Ok(raw) => tracing::info!(
            "device {device_id}: {op} succeeded ({} bytes), value: {}",
            raw.len(),
            cell.text()
        ),
        Err(err) if err.is_silent() => {
            tracing::warn!("device {device_id}: {op} failed: {err}")
        }
        Err(err) => tracing::warn!("device {device_id}: {op} rejected: {err}"),
    }
}

/// Validate `params` and, if they are valid, scan with connections from `factory`
///
/// Nothing is opened or read when validation fails.
pub async fn run<F>(params: ScanParams, factory: F) -> Result<ScanReport, ScanError>
where
    F: ConnectionFactory,
{
    let config = params.validate()?;
    Scanner::new(config, factory).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ConnectionError, ReadError};
    use crate::sim::{BusEvent, SimDevice, SimulatedBus};
    use crate::types::ReadOperation;
    use crate::DecodeType;

    fn params(lo: u32, hi: u32) -> ScanParams {
        ScanParams {
            device_id_lo: lo,
            device_id_hi: hi,
            quantity: 2,
            ..ScanParams::default()
        }
    }

    fn population() -> SimulatedBus {
        SimulatedBus::new()
            .with_device(
                2,
                SimDevice::new()
                    .coils(&[true, true])
                    .holding_registers(&[0x002A, 0x0000]),
            )
            .with_device(
                4,
                SimDevice::new()
                    .discrete_inputs(&[false, true])
                    .input_registers(&[0xFFFF, 0x0000]),
            )
            .with_unreachable(3)
    }

    #[tokio::test]
    async fn invalid_configuration_issues_no_reads() {
        let bus = population();
        let journal = bus.journal();

        let result = run(
            ScanParams {
                data_bits: 4,
                ..params(1, 5)
            },
            bus,
        )
        .await;

        assert_eq!(result, Err(ScanError::Config(ConfigError::BadDataBits(4))));
        assert!(journal.events().is_empty());
    }

    #[tokio::test]
    async fn one_row_per_device_id_in_ascending_order() {
        let report = run(params(1, 5), population()).await.unwrap();

        let ids: Vec<u8> = report.rows.iter().map(|x| x.device_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.responsive, vec![2, 4]);
    }

    #[tokio::test]
    async fn successful_reads_are_decoded_with_the_configured_type() {
        let report = run(
            ScanParams {
                decode_type: DecodeType::Int16,
                ..params(2, 4)
            },
            population(),
        )
        .await
        .unwrap();

        let device_2 = &report.rows[0];
        assert_eq!(
            device_2.cell(ReadOperation::ReadHoldingRegisters),
            &ProbeCell::Success(Ok("42".to_string()))
        );
        assert!(!device_2.cell(ReadOperation::ReadDiscreteInputs).is_success());

        let device_4 = &report.rows[2];
        assert_eq!(
            device_4.cell(ReadOperation::ReadInputRegisters),
            &ProbeCell::Success(Ok("-1".to_string()))
        );
        // two discrete inputs pack into a single byte, too short for int16
        assert!(matches!(
            device_4.cell(ReadOperation::ReadDiscreteInputs),
            ProbeCell::Success(Err(_))
        ));
    }

    #[tokio::test]
    async fn failed_connect_still_attempts_the_reads_and_moves_on() {
        let bus = population();
        let journal = bus.journal();

        let report = run(params(3, 4), bus).await.unwrap();

        let device_3 = &report.rows[0];
        assert_eq!(
            device_3.connection_error,
            Some(ConnectionError::Failed("connection refused".to_string()))
        );
        assert!(device_3.cells.iter().all(|x| !x.is_success()));
        assert_eq!(
            device_3.cell(ReadOperation::ReadCoils),
            &ProbeCell::Fail(ReadError::NoConnection.to_string())
        );
        assert!(!report.responsive.contains(&3));
        assert_eq!(report.responsive, vec![4]);

        assert_eq!(
            journal.events(),
            vec![
                BusEvent::Open(3),
                BusEvent::Connect(3),
                BusEvent::Read(3, ReadOperation::ReadCoils),
                BusEvent::Read(3, ReadOperation::ReadDiscreteInputs),
                BusEvent::Read(3, ReadOperation::ReadInputRegisters),
                BusEvent::Read(3, ReadOperation::ReadHoldingRegisters),
                BusEvent::Close(3),
                BusEvent::Open(4),
                BusEvent::Connect(4),
                BusEvent::Read(4, ReadOperation::ReadCoils),
                BusEvent::Read(4, ReadOperation::ReadDiscreteInputs),
                BusEvent::Read(4, ReadOperation::ReadInputRegisters),
                BusEvent::Read(4, ReadOperation::ReadHoldingRegisters),
                BusEvent::Close(4),
            ]
        );
    }

    #[tokio::test]
    async fn fail_fast_skips_reads_after_a_failed_connect() {
        let bus = population();
        let journal = bus.journal();

        let report = run(
            ScanParams {
                on_connect_failure: ConnectFailurePolicy::FailFast,
                ..params(3, 3)
            },
            bus,
        )
        .await
        .unwrap();

        assert_eq!(
            journal.events(),
            vec![BusEvent::Open(3), BusEvent::Connect(3), BusEvent::Close(3)]
        );
        assert!(report.rows[0]
            .cells
            .iter()
            .all(|x| x.text().starts_with("not attempted")));
        assert!(report.responsive.is_empty());
    }

    #[tokio::test]
    async fn each_connection_is_closed_before_the_next_is_opened() {
        let bus = population();
        let journal = bus.journal();

        run(params(0, 255), bus).await.unwrap();

        let mut open = None;
        for event in journal.events() {
            match event {
                BusEvent::Open(id) => {
                    assert_eq!(open, None, "device {id} opened while another was open");
                    open = Some(id);
                }
                BusEvent::Close(id) => {
                    assert_eq!(open, Some(id));
                    open = None;
                }
                _ => {}
            }
        }
        assert_eq!(open, None);
        assert_eq!(journal.read_count(), 256 * 4);
    }

    #[tokio::test]
    async fn repeated_scans_produce_identical_reports() {
        let mut first = run(params(1, 5), population()).await.unwrap();
        let mut second = run(params(1, 5), population()).await.unwrap();

        first.elapsed = std::time::Duration::ZERO;
        second.elapsed = std::time::Duration::ZERO;

        assert_eq!(first, second);
        assert_eq!(first.render_table(), second.render_table());
    }

    /// Cancels the token while opening the connection of one device id
    struct CancelOnOpen {
        bus: SimulatedBus,
        at: u8,
        token: CancellationToken,
    }

    impl ConnectionFactory for CancelOnOpen {
        type Connection = <SimulatedBus as ConnectionFactory>::Connection;

        fn open(&mut self, config: &ScanConfig, device_id: u8) -> Self::Connection {
            if device_id == self.at {
                self.token.cancel();
            }
            self.bus.open(config, device_id)
        }
    }

    #[tokio::test]
    async fn cancelling_mid_scan_finishes_the_current_device_then_stops() {
        let token = CancellationToken::new();
        let bus = population();
        let journal = bus.journal();
        let factory = CancelOnOpen {
            bus,
            at: 3,
            token: token.clone(),
        };

        let result = Scanner::new(params(1, 5).validate().unwrap(), factory)
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(result, Err(ScanError::Cancelled { probed: 3 }));

        let events = journal.events();
        assert_eq!(events.last(), Some(&BusEvent::Close(3)));
        assert!(!events.contains(&BusEvent::Open(4)));
        assert_eq!(journal.read_count(), 3 * 4);
    }

    #[tokio::test]
    async fn cancelled_scan_produces_no_report() {
        let token = CancellationToken::new();
        token.cancel();

        let bus = population();
        let journal = bus.journal();
        let config = params(1, 5).validate().unwrap();

        let result = Scanner::new(config, bus)
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(result, Err(ScanError::Cancelled { probed: 0 }));
        assert!(journal.events().is_empty());
    }
}
