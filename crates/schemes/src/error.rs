use lockstep_core::{AccelerationError, Action, Actions, ChannelError, DataError, DataId};

use crate::ConfigError;

/// Errors returned by coupling schemes.
///
/// Apart from collaborator failures, every variant reports a misuse of the
/// scheme by the host. The coupled run should be aborted; the scheme makes no
/// promise of being usable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("coupling scheme is not initialized")]
    NotInitialized,

    #[error("coupling scheme is already initialized")]
    AlreadyInitialized,

    #[error("coupling scheme is finalized")]
    Finalized,

    #[error("initialize_data was already called")]
    InitializeDataTwice,

    #[error("initialize_data must be called before the first advance")]
    InitializeDataAfterAdvance,

    #[error("initial data has to be exchanged with initialize_data before advancing")]
    InitialDataPending,

    #[error("required actions are not fulfilled: {0}")]
    UnfulfilledActions(Actions),

    #[error("action {0} is not required")]
    ActionNotRequired(Action),

    #[error("coupling has already ended")]
    CouplingFinished,

    #[error("time step {0} is negative or not finite")]
    InvalidTimeStep(f64),

    #[error("time step {dt} exceeds the remainder {remainder} of the time window")]
    TimeStepExceedsWindow { dt: f64, remainder: f64 },

    #[error("cannot finalize while coupling is ongoing")]
    StillOngoing,

    #[error("received invalid time window size {0}")]
    InvalidWindowSize(f64),

    #[error("{0} is already coupled by this scheme")]
    DuplicateData(DataId),

    #[error("{0} is not coupled by this scheme")]
    UnknownData(DataId),

    #[error("participant {0} is not a partner of this scheme")]
    UnknownPartner(String),

    #[error("data must be added before initialize")]
    DataAfterInitialize,

    #[error("{0} called out of phase order")]
    PhaseOrder(&'static str),

    #[error("a compositional scheme accepts at most one implicit scheme")]
    MultipleImplicitSchemes,

    #[error("compositional schemes cannot be nested")]
    NestedComposition,

    #[error("compositional scheme has no schemes")]
    EmptyComposition,

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("channel failure")]
    Channel(#[from] ChannelError),

    #[error("acceleration failure")]
    Acceleration(#[from] AccelerationError),

    #[error("cannot encode or decode scheme state")]
    State(#[from] bincode::Error),
}
