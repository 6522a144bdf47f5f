//! Command-line Modbus device sweep

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;

use modscan::client::RodbusFactory;
use modscan::{ConnectFailurePolicy, DecodeType, ScanError, ScanParams, Scanner, TransportKind};

mod logging;

use crate::logging::{LogOptions, LogRotation, REPORT_TARGET};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("{0}")]
    Scan(#[from] ScanError),
    #[error("unable to initialize logging: {0}")]
    Logging(String),
}

impl Error {
    fn exit_code(&self) -> ExitCode {
        match self {
            Error::Scan(ScanError::Config(_)) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Modbus RTU over a serial port
    Rtu,
    /// Modbus TCP
    Tcp,
}

impl From<Transport> for TransportKind {
    fn from(value: Transport) -> Self {
        match value {
            Transport::Rtu => TransportKind::Serial,
            Transport::Tcp => TransportKind::Tcp,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "modscan")]
#[command(about = "A command line program that sweeps a range of Modbus unit ids and reports which devices respond")]
#[command(version)]
struct Cli {
    #[arg(short = 'm', long, value_enum, default_value = "rtu", help = "transport kind")]
    transport: Transport,

    #[arg(short = 'e', long, default_value = "COM1", help = "serial port name, or host:port for TCP")]
    endpoint: String,

    #[arg(short = 'b', long, default_value = "9600", help = "serial baud rate")]
    baud: u32,

    #[arg(short = 'd', long, default_value = "8", help = "serial data bits (5-8)")]
    data_bits: u32,

    #[arg(short = 'p', long, default_value = "N", help = "serial parity (N, E or O)")]
    parity: String,

    #[arg(short = 's', long, default_value = "1", help = "serial stop bits (1 or 2)")]
    stop_bits: u32,

    #[arg(long, default_value = "1", help = "first device id to probe")]
    id_start: u32,

    #[arg(long, default_value = "3", help = "last device id to probe")]
    id_end: u32,

    #[arg(short = 'a', long, default_value = "0", help = "register start address")]
    address: u16,

    #[arg(short = 'q', long, default_value = "8", help = "number of coils/registers to read")]
    quantity: u16,

    #[arg(short = 't', long, default_value = "2000", help = "link and response timeout in milliseconds")]
    timeout_ms: u64,

    #[arg(long, default_value = "uint16", help = "decode type: uint16, int16, uint32, int32, uint64, int64, float32, float64")]
    decode_type: String,

    #[arg(long, help = "skip the reads of a device whose link could not be established")]
    fail_fast: bool,

    #[arg(long, help = "log decoded Modbus requests, responses and frames")]
    trace_frames: bool,

    #[arg(long, help = "directory for a rotating log file that also receives the report")]
    log_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "hourly", help = "log file rotation period")]
    log_rotation: LogRotation,

    #[arg(long, default_value = "info", help = "maximum log level (off, error, warn, info, debug, trace)")]
    log_level: LevelFilter,
}

impl Cli {
    fn scan_params(&self) -> ScanParams {
        ScanParams {
            transport: self.transport.into(),
            endpoint: self.endpoint.clone(),
            baud_rate: self.baud,
            data_bits: self.data_bits,
            parity: self.parity.clone(),
            stop_bits: self.stop_bits,
            read_timeout: Duration::from_millis(self.timeout_ms),
            device_id_lo: self.id_start,
            device_id_hi: self.id_end,
            address: self.address,
            quantity: self.quantity,
            decode_type: DecodeType::from_tag(&self.decode_type),
            on_connect_failure: if self.fail_fast {
                ConnectFailurePolicy::FailFast
            } else {
                ConnectFailurePolicy::AttemptReads
            },
        }
    }

    fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level,
            dir: self.log_dir.clone(),
            rotation: self.log_rotation,
        }
    }

    fn factory(&self) -> RodbusFactory {
        if self.trace_frames {
            RodbusFactory::new().with_frame_logging()
        } else {
            RodbusFactory::new()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init(&cli.log_options()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fatal(&err, &mut std::io::stderr()),
    }
}

/// Report a fatal error on `out` whatever the log level, returning the exit status
fn fatal<W: Write>(err: &Error, out: &mut W) -> ExitCode {
    let _ = writeln!(out, "error: {err}");
    err.exit_code()
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = cli.scan_params().validate().map_err(ScanError::from)?;
    tracing::info!(
        "worst case duration with no responsive devices: {:?}",
        config.worst_case_duration()
    );

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current device");
            ctrl_c.cancel();
        }
    });

    let report = Scanner::new(config, cli.factory())
        .with_cancellation(token)
        .run()
        .await?;

    let table = report.render_table();
    println!("{table}");
    println!("{}", report.summary());

    tracing::info!(target: REPORT_TARGET, "\n{table}");
    tracing::info!(target: REPORT_TARGET, "SuccessDevice: {}", report.responsive_list());

    Ok(())
}
