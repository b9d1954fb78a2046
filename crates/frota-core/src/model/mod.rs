//! Work order domain types.

pub mod order;
pub mod status;

pub use order::{CostBreakdown, EditLock, PartRequest, ServiceItem, WorkOrder};
pub use status::{InvalidTransition, ParseEnumError, PartStatus, Priority, Status};
