use std::time::{Duration, Instant};

use tabled::builder::Builder;
use tabled::settings::Style;

use crate::decode::{decode, DecodeType};
use crate::error::{ConnectionError, DecodeError};
use crate::sweep::ReadOutcome;
use crate::types::ReadOperation;

/// Status and value of one operation for one device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeCell {
    /// the read succeeded, the payload was decoded (or failed to decode)
    Success(Result<String, DecodeError>),
    /// the read failed, textual description of the error
    Fail(String),
}

impl ProbeCell {
    /// Decode a read outcome into a cell
    pub fn from_outcome(outcome: &ReadOutcome, decode_type: &DecodeType) -> Self {
        match &outcome.result {
            Ok(raw) => ProbeCell::Success(decode(raw, decode_type)),
            Err(err) => ProbeCell::Fail(err.to_string()),
        }
    }

    /// True if the read succeeded, regardless of decoding
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeCell::Success(_))
    }

    /// `Success` or `Fail`
    pub fn status(&self) -> &'static str {
        match self {
            ProbeCell::Success(_) => "Success",
            ProbeCell::Fail(_) => "Fail",
        }
    }

    /// Decoded value, decode error or read error as text
    pub fn text(&self) -> String {
        match self {
            ProbeCell::Success(Ok(value)) => value.clone(),
            ProbeCell::Success(Err(err)) => format!("decode error: {err}"),
            ProbeCell::Fail(err) => err.clone(),
        }
    }
}

/// Everything recorded for one device id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProbeRow {
    /// device id that was probed
    pub device_id: u8,
    /// one cell per operation, in [`ReadOperation::ALL`] order
    pub cells: [ProbeCell; 4],
    /// error reported while establishing the link, if any
    pub connection_error: Option<ConnectionError>,
}

impl DeviceProbeRow {
    /// Assemble a row from the outcomes of a sweep
    pub fn new(
        device_id: u8,
        outcomes: &[ReadOutcome; 4],
        decode_type: &DecodeType,
        connection_error: Option<ConnectionError>,
    ) -> Self {
        Self {
            device_id,
            cells: outcomes
                .each_ref()
                .map(|x| ProbeCell::from_outcome(x, decode_type)),
            connection_error,
        }
    }

    /// Cell of a specific operation
    pub fn cell(&self, operation: ReadOperation) -> &ProbeCell {
        &self.cells[operation.index()]
    }

    /// True if at least one of the four reads succeeded
    pub fn is_responsive(&self) -> bool {
        self.cells.iter().any(ProbeCell::is_success)
    }
}

/// Final result of a scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// one row per device id, ascending
    pub rows: Vec<DeviceProbeRow>,
    /// ids with at least one successful read, in probe order
    pub responsive: Vec<u8>,
    /// wall-clock time from scan start to completion
    pub elapsed: Duration,
}

/// Builds a [`ScanReport`] one device at a time
#[derive(Debug)]
pub struct ReportBuilder {
    rows: Vec<DeviceProbeRow>,
    responsive: Vec<u8>,
    start: Instant,
}

impl ReportBuilder {
    /// Start the clock on a new report
    pub fn start(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            responsive: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Append the row of the device that was just probed
    pub fn push(&mut self, row: DeviceProbeRow) {
        if row.is_responsive() {
            self.responsive.push(row.device_id);
        }
        self.rows.push(row);
    }

    /// Number of rows so far
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no device has been recorded
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stop the clock and produce the report
    pub fn finish(self) -> ScanReport {
        ScanReport {
            rows: self.rows,
            responsive: self.responsive,
            elapsed: self.start.elapsed(),
        }
    }
}

const ADDRESS_HEADER: &str = "ADDRESS";
const ELAPSED_LABEL: &str = "Time-consuming";

impl ScanReport {
    /// Responsive ids joined with commas, e.g. `1,2,5`
    pub fn responsive_list(&self) -> String {
        self.responsive
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// One line summary: elapsed time and responsive devices
    pub fn summary(&self) -> String {
        let responsive = if self.responsive.is_empty() {
            "none".to_string()
        } else {
            self.responsive_list()
        };
        format!(
            "scanned {} device(s) in {:?}, responsive devices: {}",
            self.rows.len(),
            self.elapsed,
            responsive
        )
    }

    /// Header row followed by two rows per device: statuses, then values or errors
    pub fn table_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(1 + 2 * self.rows.len());

        let mut header = vec![ADDRESS_HEADER.to_string()];
        header.extend(
            ReadOperation::ALL
                .iter()
                .map(|op| format!("{} {}", op.name(), op.reference())),
        );
        rows.push(header);

        for row in &self.rows {
            let id = row.device_id.to_string();

            let mut status = vec![id.clone()];
            status.extend(row.cells.iter().map(|x| x.status().to_string()));
            rows.push(status);

            let mut values = vec![id];
            values.extend(row.cells.iter().map(ProbeCell::text));
            rows.push(values);
        }

        rows
    }

    /// Render the report as a table with an elapsed time footer
    pub fn render_table(&self) -> String {
        let mut builder = Builder::default();
        for row in self.table_rows() {
            builder.push_record(row);
        }

        let mut footer = vec![String::new(); ReadOperation::ALL.len() - 1];
        footer.push(ELAPSED_LABEL.to_string());
        footer.push(format!("{:?}", self.elapsed));
        builder.push_record(footer);

        let mut table = builder.build();
        table.with(Style::modern());
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadError;

    fn outcomes(results: [Result<Vec<u8>, ReadError>; 4]) -> [ReadOutcome; 4] {
        let [a, b, c, d] = results;
        [
            ReadOutcome::new(ReadOperation::ReadCoils, a),
            ReadOutcome::new(ReadOperation::ReadDiscreteInputs, b),
            ReadOutcome::new(ReadOperation::ReadInputRegisters, c),
            ReadOutcome::new(ReadOperation::ReadHoldingRegisters, d),
        ]
    }

    fn all_failed() -> [ReadOutcome; 4] {
        outcomes([
            Err(ReadError::Timeout),
            Err(ReadError::Timeout),
            Err(ReadError::Timeout),
            Err(ReadError::Timeout),
        ])
    }

    #[test]
    fn successful_reads_are_decoded() {
        let row = DeviceProbeRow::new(
            3,
            &outcomes([
                Ok(vec![0x01]),
                Err(ReadError::Exception("illegal function".to_string())),
                Ok(vec![0x00, 0x2A]),
                Ok(vec![0xFF, 0xFF]),
            ]),
            &DecodeType::Int16,
            None,
        );

        assert!(row.is_responsive());
        assert_eq!(
            row.cell(ReadOperation::ReadCoils),
            &ProbeCell::Success(Err(DecodeError::InsufficientData {
                needed: 2,
                actual: 1
            }))
        );
        assert_eq!(
            row.cell(ReadOperation::ReadDiscreteInputs).text(),
            "device exception: illegal function"
        );
        assert_eq!(row.cell(ReadOperation::ReadInputRegisters).text(), "42");
        assert_eq!(row.cell(ReadOperation::ReadHoldingRegisters).text(), "-1");
    }

    #[test]
    fn responsive_list_only_contains_devices_with_a_success() {
        let mut builder = ReportBuilder::start(3);
        builder.push(DeviceProbeRow::new(1, &all_failed(), &DecodeType::Uint16, None));
        builder.push(DeviceProbeRow::new(
            2,
            &outcomes([
                Err(ReadError::Timeout),
                Err(ReadError::Timeout),
                Err(ReadError::Timeout),
                Ok(vec![0x00, 0x01]),
            ]),
            &DecodeType::Uint16,
            None,
        ));
        builder.push(DeviceProbeRow::new(
            3,
            &outcomes([
                Ok(vec![0x00, 0x01]),
                Ok(vec![0x00, 0x01]),
                Ok(vec![0x00, 0x01]),
                Ok(vec![0x00, 0x01]),
            ]),
            &DecodeType::Uint16,
            None,
        ));
        let report = builder.finish();

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.responsive, vec![2, 3]);
        assert_eq!(report.responsive_list(), "2,3");
    }

    #[test]
    fn summary_names_no_devices_when_nothing_answered() {
        let mut builder = ReportBuilder::start(1);
        builder.push(DeviceProbeRow::new(9, &all_failed(), &DecodeType::Uint16, None));
        let mut report = builder.finish();
        report.elapsed = Duration::from_millis(1500);

        assert_eq!(
            report.summary(),
            "scanned 1 device(s) in 1.5s, responsive devices: none"
        );
    }

    #[test]
    fn table_has_a_status_row_and_a_value_row_per_device() {
        let mut builder = ReportBuilder::start(1);
        builder.push(DeviceProbeRow::new(
            7,
            &outcomes([
                Err(ReadError::Timeout),
                Err(ReadError::Timeout),
                Ok(vec![0x00, 0x2A]),
                Err(ReadError::NoConnection),
            ]),
            &DecodeType::Uint16,
            None,
        ));
        let report = builder.finish();

        let rows = report.table_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            vec![
                "ADDRESS",
                "ReadCoils 0x",
                "ReadDiscreteInputs 1x",
                "ReadInputRegisters 3x",
                "ReadHoldingRegisters 4x"
            ]
        );
        assert_eq!(rows[1], vec!["7", "Fail", "Fail", "Success", "Fail"]);
        assert_eq!(rows[2][0], "7");
        assert_eq!(rows[2][3], "42");
        assert_eq!(rows[2][4], "no connection exists to the device");

        let table = report.render_table();
        assert!(table.contains("ReadHoldingRegisters 4x"));
        assert!(table.contains("Time-consuming"));
        assert!(table.contains("42"));
    }
}
