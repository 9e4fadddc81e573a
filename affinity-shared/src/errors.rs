use serde::{Deserialize, Serialize};

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E2xxx: Profile errors
/// - E3xxx: Matching errors
/// - E6xxx: Moderation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Conflict,
    DependencyUnavailable,

    // Profile (E2xxx)
    ProfileNotFound,
    AgeOutOfRange,
    NotEnoughInterests,
    PersonalityLengthMismatch,

    // Matching (E3xxx)
    ProposalNotFound,
    ProposalAlreadyActive,
    ProposalExpired,
    NotYourProposal,
    NotEligible,
    AlreadyMatched,

    // Moderation (E6xxx)
    ReportNotFound,
    CannotReportSelf,
    ReportAlreadyReviewed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Conflict => "E0004",
            Self::DependencyUnavailable => "E0005",

            // Profile
            Self::ProfileNotFound => "E2001",
            Self::AgeOutOfRange => "E2002",
            Self::NotEnoughInterests => "E2003",
            Self::PersonalityLengthMismatch => "E2004",

            // Matching
            Self::ProposalNotFound => "E3001",
            Self::ProposalAlreadyActive => "E3002",
            Self::ProposalExpired => "E3003",
            Self::NotYourProposal => "E3004",
            Self::NotEligible => "E3005",
            Self::AlreadyMatched => "E3006",

            // Moderation
            Self::ReportNotFound => "E6001",
            Self::CannotReportSelf => "E6002",
            Self::ReportAlreadyReviewed => "E6003",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("dependency unavailable: {0}")]
    Dependency(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency(message.into())
    }

    /// Error code of this error, `E0001`/`E0002` for the opaque arms.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Known { code, .. } => code.code(),
            Self::Internal(_) => ErrorCode::InternalError.code(),
            Self::Validation(_) => ErrorCode::ValidationError.code(),
            Self::Dependency(_) => ErrorCode::DependencyUnavailable.code(),
        }
    }

    pub fn is(&self, expected: ErrorCode) -> bool {
        matches!(self, Self::Known { code, .. } if *code == expected)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
