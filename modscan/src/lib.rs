//! A Modbus diagnostic sweep engine built on [rodbus](https://docs.rs/rodbus)
//! and [Tokio](https://docs.rs/tokio).
//!
//! Given a range of unit ids, the engine connects to each id in turn, issues the four
//! standard read functions against the same register window and records which devices
//! answer. Successful payloads are decoded as a configurable numeric type.
//!
//! # Supported transports
//!
//! * Modbus RTU over a serial port
//! * Modbus TCP
//!
//! # Read functions
//!
//! * Read Coils (0x)
//! * Read Discrete Inputs (1x)
//! * Read Input Registers (3x)
//! * Read Holding Registers (4x)
//!
//! # Example
//!
//! ```no_run
//! use modscan::client::RodbusFactory;
//! use modscan::{ScanParams, TransportKind};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params = ScanParams {
//!         transport: TransportKind::Tcp,
//!         endpoint: "127.0.0.1:502".to_string(),
//!         device_id_lo: 1,
//!         device_id_hi: 10,
//!         ..ScanParams::default()
//!     };
//!
//!     let report = modscan::run(params, RodbusFactory::new()).await?;
//!     println!("{}", report.render_table());
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod sim;

mod config;
mod decode;
mod error;
mod report;
mod scan;
mod sweep;
mod transport;
mod types;

pub use crate::config::*;
pub use crate::decode::{decode, DecodeType};
pub use crate::error::*;
pub use crate::report::*;
pub use crate::scan::*;
pub use crate::sweep::*;
pub use crate::transport::*;
pub use crate::types::*;
