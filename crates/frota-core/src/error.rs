use std::fmt;

/// Machine-readable error codes shared by the service facade, the CLI and
/// whatever HTTP layer sits in front of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    OrderNotFound,
    ServiceItemNotFound,
    InvalidTransition,
    InvalidEnumValue,
    VersionConflict,
    AlreadyLocked,
    ClockSkewRejected,
    MalformedPayload,
    StoreFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::OrderNotFound => "E2001",
            Self::ServiceItemNotFound => "E2002",
            Self::InvalidTransition => "E2003",
            Self::InvalidEnumValue => "E2004",
            Self::VersionConflict => "E3001",
            Self::AlreadyLocked => "E3002",
            Self::ClockSkewRejected => "E3003",
            Self::MalformedPayload => "E4001",
            Self::StoreFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workshop store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::OrderNotFound => "Work order not found",
            Self::ServiceItemNotFound => "Service item not found",
            Self::InvalidTransition => "Invalid status transition",
            Self::InvalidEnumValue => "Invalid status/priority value",
            Self::VersionConflict => "Work order was modified concurrently",
            Self::AlreadyLocked => "Work order is being edited by another user",
            Self::ClockSkewRejected => "Transition rejected because of clock skew",
            Self::MalformedPayload => "Malformed work order payload",
            Self::StoreFailure => "Work order store failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `frota init` to create the workshop store."),
            Self::ConfigParseError => Some("Fix syntax in .frota/config.toml and retry."),
            Self::OrderNotFound | Self::ServiceItemNotFound => None,
            Self::InvalidTransition => Some(
                "Finalized and cancelled orders are frozen; open statuses move freely between each other.",
            ),
            Self::InvalidEnumValue => Some("Use one of the documented status/priority values."),
            Self::VersionConflict => Some("Reload the work order and retry with its current version."),
            Self::AlreadyLocked => Some("Wait for the other editor to release the order, or for the lock to go stale."),
            Self::ClockSkewRejected => Some("Check the service clock; the last status change is in the future."),
            Self::MalformedPayload => Some("Send an object with at least `id` and a known `status`."),
            Self::StoreFailure => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// HTTP status an API layer should answer with for this code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::OrderNotFound | Self::ServiceItemNotFound => 404,
            Self::InvalidTransition | Self::VersionConflict | Self::ClockSkewRejected => 409,
            Self::AlreadyLocked => 423,
            Self::InvalidEnumValue | Self::MalformedPayload => 422,
            Self::NotInitialized
            | Self::ConfigParseError
            | Self::StoreFailure
            | Self::InternalUnexpected => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
