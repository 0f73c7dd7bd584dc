//! Error types for displacement transfer with rich diagnostics.
//!
//! Each error carries a machine-readable code in the format `XFER-XXXX`:
//! - `XFER-1xxx`: input errors (configuration, snapshot shape)
//! - `XFER-2xxx`: geometry validation errors
//! - `XFER-3xxx`: transfer-stage errors (matching, operators, solves)
//!
//! Geometry-local failures (a single island, a degenerate triangle) degrade
//! gracefully inside the pipeline and are reported per island; only global
//! failures (no matches at all, invalid configuration) surface as a
//! `TransferError` from [`crate::transfer`].

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Machine-readable error codes for transfer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors (1xxx)
    /// XFER-1001: Configuration value out of range
    InvalidConfig = 1001,
    /// XFER-1002: Snapshot has no vertices or faces
    EmptySnapshot = 1002,
    /// XFER-1003: Displacement field length does not match its mesh
    FieldSizeMismatch = 1003,
    /// XFER-1004: Requested shape key does not exist on the provider
    UnknownShapeKey = 1004,

    // Geometry validation errors (2xxx)
    /// XFER-2001: Face references invalid vertex index
    InvalidVertexIndex = 2001,
    /// XFER-2002: Vertex has NaN or Infinity coordinate
    InvalidCoordinate = 2002,

    // Transfer-stage errors (3xxx)
    /// XFER-3001: No target vertex passed correspondence validation
    NoCorrespondenceFound = 3001,
    /// XFER-3002: Too many degenerate triangles for the cotangent operator
    DegenerateGeometry = 3002,
    /// XFER-3003: Per-island linear system could not be solved
    SingularSystem = 3003,
    /// XFER-3004: Not enough points for the k-NN point-cloud operator
    InsufficientPoints = 3004,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `XFER-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "XFER-1001",
            ErrorCode::EmptySnapshot => "XFER-1002",
            ErrorCode::FieldSizeMismatch => "XFER-1003",
            ErrorCode::UnknownShapeKey => "XFER-1004",
            ErrorCode::InvalidVertexIndex => "XFER-2001",
            ErrorCode::InvalidCoordinate => "XFER-2002",
            ErrorCode::NoCorrespondenceFound => "XFER-3001",
            ErrorCode::DegenerateGeometry => "XFER-3002",
            ErrorCode::SingularSystem => "XFER-3003",
            ErrorCode::InsufficientPoints => "XFER-3004",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during displacement transfer.
#[derive(Debug, Error, Diagnostic)]
pub enum TransferError {
    /// Configuration value out of range, rejected before any computation.
    #[error("invalid transfer configuration: {details}")]
    #[diagnostic(
        code(transfer::config::invalid),
        help("distance_threshold must be > 0, normal_threshold in [0, 1], island_size_threshold >= 1")
    )]
    InvalidConfig { details: String },

    /// Snapshot has no vertices or no faces.
    #[error("{which} snapshot is empty: {details}")]
    #[diagnostic(
        code(transfer::snapshot::empty),
        help("A snapshot needs at least one vertex and one triangle")
    )]
    EmptySnapshot {
        which: &'static str,
        details: String,
    },

    /// Displacement field length does not match the mesh it belongs to.
    #[error("displacement field has {actual} entries but the mesh has {expected} vertices")]
    #[diagnostic(
        code(transfer::field::size_mismatch),
        help("The field must carry exactly one offset vector per source vertex")
    )]
    FieldSizeMismatch { expected: usize, actual: usize },

    /// Requested shape key does not exist on the provider.
    #[error("unknown shape key: {key:?}")]
    #[diagnostic(
        code(transfer::provider::unknown_key),
        help("List available keys with MeshDataProvider::shape_keys")
    )]
    UnknownShapeKey { key: String },

    /// Face references a vertex index outside the vertex array.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but the snapshot only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(transfer::snapshot::vertex_index),
        help("Check the triangulation export; every face index must be < vertex count")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Vertex position or normal carries a NaN or infinite component.
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(transfer::snapshot::coordinate),
        help("Check the source data for numerical issues; NaN normals often come from degenerate faces")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// No target vertex passed both the distance and the normal test.
    /// There is nothing to anchor the harmonic solve, so the whole
    /// transfer aborts.
    #[error(
        "no valid correspondence: 0 of {target_vertices} target vertices matched (distance <= {distance_threshold}, |normal dot| >= {normal_threshold})"
    )]
    #[diagnostic(
        code(transfer::correspondence::none),
        help("Relax distance_threshold and/or normal_threshold, or check that both meshes are in the same world space")
    )]
    NoCorrespondenceFound {
        target_vertices: usize,
        distance_threshold: f64,
        normal_threshold: f64,
    },

    /// Too many degenerate triangles to build a meaningful cotangent
    /// operator. Triggers the uniform-weight fallback inside the pipeline;
    /// surfaces only when no operator variant can be built.
    #[error(
        "degenerate geometry: {degenerate_triangles} of {total_triangles} triangles have near-zero area"
    )]
    #[diagnostic(
        code(transfer::laplacian::degenerate),
        help("Weld duplicate vertices and remove zero-area triangles, or set force_point_cloud")
    )]
    DegenerateGeometry {
        degenerate_triangles: usize,
        total_triangles: usize,
    },

    /// A per-island linear solve failed. Recoverable: recorded in the
    /// island's report while the remaining islands proceed.
    #[error("singular system on island {island_id}: solve over {unknown_count} unknowns failed")]
    #[diagnostic(
        code(transfer::solve::singular),
        help("Enable auto_island_handling so fully-unmatched islands get the Exclude/Average policy instead of an ill-posed solve")
    )]
    SingularSystem {
        island_id: usize,
        unknown_count: usize,
    },

    /// The point-cloud operator needs more points than the mesh provides.
    #[error("point-cloud operator needs at least {needed} points, mesh has {points}")]
    #[diagnostic(
        code(transfer::laplacian::insufficient_points),
        help("Disable force_point_cloud for very small meshes")
    )]
    InsufficientPoints { points: usize, needed: usize },
}

impl TransferError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransferError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            TransferError::EmptySnapshot { .. } => ErrorCode::EmptySnapshot,
            TransferError::FieldSizeMismatch { .. } => ErrorCode::FieldSizeMismatch,
            TransferError::UnknownShapeKey { .. } => ErrorCode::UnknownShapeKey,
            TransferError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            TransferError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            TransferError::NoCorrespondenceFound { .. } => ErrorCode::NoCorrespondenceFound,
            TransferError::DegenerateGeometry { .. } => ErrorCode::DegenerateGeometry,
            TransferError::SingularSystem { .. } => ErrorCode::SingularSystem,
            TransferError::InsufficientPoints { .. } => ErrorCode::InsufficientPoints,
        }
    }

    /// Returns a short recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TransferError::InvalidConfig { .. } => "fix the out-of-range parameter",
            TransferError::EmptySnapshot { .. } => "export the mesh with geometry",
            TransferError::FieldSizeMismatch { .. } => {
                "re-extract the displacement field from the source mesh"
            }
            TransferError::UnknownShapeKey { .. } => "check the shape key name",
            TransferError::InvalidVertexIndex { .. } | TransferError::InvalidCoordinate { .. } => {
                "repair the mesh before transferring"
            }
            TransferError::NoCorrespondenceFound { .. } => {
                "relax distance_threshold / normal_threshold"
            }
            TransferError::DegenerateGeometry { .. } => {
                "remove degenerate triangles or set force_point_cloud"
            }
            TransferError::SingularSystem { .. } => "enable auto_island_handling",
            TransferError::InsufficientPoints { .. } => "disable force_point_cloud",
        }
    }

    // Constructor helpers for common error patterns

    /// Create an InvalidConfig error.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        TransferError::InvalidConfig {
            details: details.into(),
        }
    }

    /// Create an EmptySnapshot error.
    pub fn empty_snapshot(which: &'static str, details: impl Into<String>) -> Self {
        TransferError::EmptySnapshot {
            which,
            details: details.into(),
        }
    }
}
