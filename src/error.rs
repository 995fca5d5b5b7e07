#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when an analytic (single-point) acquisition function is
    /// configured together with a candidate batch size other than 1.
    #[error(
        "analytic acquisition functions score one point at a time: num_candidates must be 1, got {num_candidates}"
    )]
    AnalyticBatchSize {
        /// The configured candidate batch size.
        num_candidates: usize,
    },

    /// Returned when a fixed noise variance and a per-point noise array are
    /// both supplied for the same model.
    #[error("fixed noise variance and per-point noise variances are mutually exclusive")]
    ConflictingNoise,

    /// Returned when the projection function is requested with too few
    /// initial measurements.
    #[error("projection function needs at least {required} initial points, got {got}")]
    InsufficientProjectionPoints {
        /// Minimum number of points.
        required: usize,
        /// Number of points supplied.
        got: usize,
    },

    /// Returned when a stopping-criterion method name is not recognized.
    #[error("unknown stopping criterion method '{0}'")]
    UnknownStoppingMethod(String),

    /// Returned when `suggest`/`update` are called before `build`.
    #[error("experiment guide has not been built")]
    NotBuilt,

    /// Returned when the guide is driven after the stopping criterion fired.
    #[error("experiment guide has stopped")]
    GuideStopped,

    /// Returned when a coordinate transform is used before it was fit.
    #[error("coordinate transform used before fitting")]
    TransformNotFitted,

    /// Returned when a point has the wrong number of coordinates.
    #[error("dimension mismatch: expected {expected} coordinates, got {got}")]
    DimensionMismatch {
        /// The expected dimensionality.
        expected: usize,
        /// The dimensionality received.
        got: usize,
    },

    /// Returned when feature and observation sequences differ in length.
    #[error("length mismatch: {x} points but {y} observations")]
    LengthMismatch {
        /// Number of input points.
        x: usize,
        /// Number of observations.
        y: usize,
    },

    /// Returned when an operation needs at least one data point.
    #[error("no data points supplied")]
    EmptyData,

    /// Returned when no gradient peak qualifies as the absorption edge.
    #[error("absorption edge not detected: {0}")]
    EdgeNotDetected(&'static str),

    /// Returned when kernel hyperparameter fitting fails.
    #[error("model fitting failed: {0}")]
    ModelFit(String),

    /// Returned when the kernel matrix is not positive definite.
    #[error("kernel matrix is not positive definite")]
    Cholesky,

    /// Returned when a lower bound exceeds its upper bound.
    #[error("invalid bounds in dimension {dim}: low ({low}) must not exceed high ({high})")]
    InvalidBounds {
        /// The offending dimension.
        dim: usize,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Returned when local refinement of acquisition candidates fails.
    #[error("candidate refinement failed: {0}")]
    CandidateRefinement(String),

    /// Returned when the candidate optimizer produced no candidate.
    #[error("candidate optimizer produced no candidate")]
    NoCandidate,

    /// Returned when a persistence operation fails.
    #[cfg(feature = "serde")]
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<argmin::core::Error> for Error {
    fn from(err: argmin::core::Error) -> Self {
        Error::ModelFit(err.to_string())
    }
}
