use thiserror::Error;

/// Crate-wide fatal error taxonomy (spec §7).
///
/// Per-term problems are not represented here — those are recorded as
/// [`crate::job::Warning`]s and do not abort the job.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RevigoError {
    #[error("term {0} has no ID or namespace")]
    OntologyMalformed(u32),

    #[error("obsolete term {0} replacement {1} does not resolve to a known ID")]
    OntologyDanglingReplacement(u32, u32),

    #[error("p-value {0} is out of the [0, 1] range")]
    InputPValueOutOfRange(f64),

    #[error("value {0} must be > 0 for a HigherAbsLog2 transform")]
    InputNonPositiveForLog2(f64),

    #[error("namespace {0:?} has {1} terms, exceeding the 2000-term limit")]
    CapacityExceeded(crate::ontology::Namespace, usize),

    #[error("no terms survived parsing in any namespace")]
    CapacityEmptyResult,

    #[error("job was cancelled before completion")]
    StateCancelled,

    #[error("job did not finish in a timely fashion")]
    StateTimedOut,

    #[error("similarity matrix not initialized for this namespace")]
    InternalMatrixMissing,

    #[error("ontology was not initialized before use")]
    InternalOntologyUninitialized,
}

pub type Result<T> = std::result::Result<T, RevigoError>;
