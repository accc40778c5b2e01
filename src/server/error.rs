use super::volume::VolumeError;

/// Errors returned by core mutations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No entity of that kind has the index
    #[error("No such {kind}: {index}")]
    NoSuchEntity {
        /// Entity kind name
        kind: &'static str,
        /// Requested index
        index: u32,
    },

    /// Card has no profile with that name
    #[error("No such profile: {0}")]
    NoSuchProfile(String),

    /// Device has no port with that name
    #[error("No such port: {0}")]
    NoSuchPort(String),

    /// Name already used within the parent
    #[error("Name already in use: {0}")]
    DuplicateName(String),

    /// Active profile cannot be removed
    #[error("Profile {0} is active")]
    ProfileInUse(String),

    /// No sink exists to play to
    #[error("There are no sinks")]
    NoSinks,

    /// Sample cache entry has no audio loaded
    #[error("Sample {0} is not loaded")]
    SampleNotLoaded(u32),

    /// Stream has no volume to change
    #[error("Stream {0} has no volume")]
    NoVolume(u32),

    /// Stream cannot be moved to the requested device
    #[error("Cannot move stream {stream} to {device}")]
    MoveFailed {
        /// Stream index
        stream: u32,
        /// Target device index
        device: u32,
    },

    /// Module argument string could not be built or parsed
    #[error("{0}")]
    InvalidModuleArguments(String),

    /// Module could not be loaded
    #[error("Failed to load module {0}")]
    ModuleLoadFailed(String),

    /// Volume did not fit the entity
    #[error(transparent)]
    Volume(#[from] VolumeError),
}
