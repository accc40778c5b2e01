use crate::server::{CoreError, VolumeError};

/// Error category of a failed bus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Argument or property value failed validation
    InvalidArgs,
    /// Named object does not exist
    NotFound,
    /// Property has no value for this object
    Unavailable,
    /// Operation is not permitted, including writes to read-only properties
    AccessDenied,
    /// Operation was valid but the server could not carry it out
    Failed,
    /// No object at the requested path
    UnknownObject,
    /// Object does not implement the interface
    UnknownInterface,
    /// Interface has no such property
    UnknownProperty,
    /// Interface has no such method
    UnknownMethod,
}

impl ErrorKind {
    /// D-Bus error name sent to the caller.
    pub fn bus_name(self) -> &'static str {
        match self {
            Self::InvalidArgs => "org.freedesktop.DBus.Error.InvalidArgs",
            Self::NotFound => "org.PulseAudio.Core1.NotFoundError",
            Self::Unavailable => "org.PulseAudio.Core1.NoSuchPropertyError",
            Self::AccessDenied => "org.freedesktop.DBus.Error.AccessDenied",
            Self::Failed => "org.freedesktop.DBus.Error.Failed",
            Self::UnknownObject => "org.freedesktop.DBus.Error.UnknownObject",
            Self::UnknownInterface => "org.freedesktop.DBus.Error.UnknownInterface",
            Self::UnknownProperty => "org.freedesktop.DBus.Error.UnknownProperty",
            Self::UnknownMethod => "org.freedesktop.DBus.Error.UnknownMethod",
        }
    }
}

/// Error reply to a bus request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .kind.bus_name(), .message)]
pub struct BusError {
    /// Category
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
}

impl BusError {
    /// Error of `kind` with `message`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Validation failure.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgs, message)
    }

    /// Missing object.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Conditional property without a value.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Refused operation.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    /// Write to a read-only property.
    pub fn read_only(interface: &str, property: &str) -> Self {
        Self::access_denied(format!("{interface}.{property}: Property not settable"))
    }

    /// Server-side failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Failed, message)
    }
}

impl From<VolumeError> for BusError {
    fn from(error: VolumeError) -> Self {
        Self::invalid_args(error.to_string())
    }
}

impl From<CoreError> for BusError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NoSuchEntity { .. }
            | CoreError::NoSuchProfile(_)
            | CoreError::NoSuchPort(_) => Self::not_found(error.to_string()),
            CoreError::Volume(volume) => volume.into(),
            CoreError::InvalidModuleArguments(_) => Self::invalid_args(error.to_string()),
            CoreError::DuplicateName(_)
            | CoreError::ProfileInUse(_)
            | CoreError::NoSinks
            | CoreError::SampleNotLoaded(_)
            | CoreError::NoVolume(_)
            | CoreError::MoveFailed { .. }
            | CoreError::ModuleLoadFailed(_) => Self::failed(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_bus_name() {
        let err = BusError::not_found("No such sink.");
        assert_eq!(
            err.to_string(),
            "org.PulseAudio.Core1.NotFoundError: No such sink."
        );
    }

    #[test]
    fn core_errors_map_to_kinds() {
        let missing = CoreError::NoSuchEntity {
            kind: "sink",
            index: 4,
        };
        assert_eq!(BusError::from(missing).kind, ErrorKind::NotFound);
        assert_eq!(
            BusError::from(CoreError::Volume(VolumeError::Empty)).kind,
            ErrorKind::InvalidArgs
        );
        assert_eq!(BusError::from(CoreError::NoSinks).kind, ErrorKind::Failed);
    }
}
