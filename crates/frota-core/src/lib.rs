//! frota-core library.
//!
//! Time accounting and lifecycle control for fleet work orders: a per-status
//! dwell ledger with an on-demand projection, the status state machine,
//! advisory edit locks, escalation alerts and per-mechanic productivity.
//!
//! # Conventions
//!
//! - **Errors**: domain failures are `thiserror` enums carrying an
//!   [`error::ErrorCode`]; store plumbing uses `anyhow::Result`.
//! - **Logging**: `tracing` macros only; the binary installs the subscriber.
//! - **Time**: whole seconds in the ledger, `DateTime<Utc>` everywhere else.

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod model;
pub mod productivity;
pub mod service;

pub use error::ErrorCode;
pub use model::{Status, WorkOrder};
pub use service::{ServiceError, WorkOrderService};
