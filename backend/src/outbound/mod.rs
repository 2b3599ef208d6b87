//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Following the hexagonal pattern, everything the domain asks of the
//! outside world is satisfied here:
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM

pub mod persistence;
