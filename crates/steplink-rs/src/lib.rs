//! Serial link layer for stepper boards that speak line-oriented ASCII
//! commands and answer each batch with a `DONE` line.

pub mod cancel;
pub mod cmds;
pub mod dispatcher;
pub mod error;
pub mod ports;

pub use cancel::CancelToken;
pub use cmds::{parse_batch, CommandKind, ParseIssue, ParsedBatch, SubCommand};
pub use dispatcher::{open_port, Ack, BatchDispatcher, SerialConfig};
pub use error::{LinkError, Result};
pub use ports::{list_ports, report_ports, PortEntry};
