//! Roadcall backend: roadside assistance dispatch over a hexagonal core.
//!
//! The crate is organised by dependency direction:
//!
//! - [`domain`] holds entities, ports, and the services behind the driving
//!   ports; it knows nothing about actix or diesel.
//! - [`inbound`] adapts HTTP and WebSocket traffic onto the driving ports.
//! - [`outbound`] implements the driven ports over PostgreSQL.
//! - [`server`] wires the layers together and runs the listener.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

pub use middleware::Trace;
