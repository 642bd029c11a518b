//! # Froggy Database Crate
//!
//! The data-access layer for the frog catalog. Everything that touches the
//! database goes through here.
//!
//! ## Layers
//!
//! - **Connection:** `ConnectionProvider` turns explicit settings into a
//!   connection target and hands out one scoped connection per operation.
//!   Failures are classified (`ConnectionCause`) so callers can tell an
//!   unreachable server from a rejected login.
//! - **Executor:** `execute` runs one parameterized statement and returns
//!   driver-neutral rows (`TabularResult`).
//! - **Accessors:** `DbRepository` holds the SQL for each domain query and
//!   maps rows into the typed records from `core-types`.
//!
//! PostgreSQL is the production engine; SQLite is supported through the same
//! code path for tests and local use.

pub mod connection;
pub mod error;
pub mod executor;
pub mod repository;

pub use connection::{ConnectionProvider, Driver, run_migrations};
pub use error::{ConnectionCause, DbError, ValidationError};
pub use executor::{ExecuteOutcome, Param, ResultRow, Statement, StatementKind, TabularResult, Value, execute};
pub use repository::DbRepository;
