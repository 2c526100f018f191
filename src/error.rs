//! Error taxonomy for the disposal verification path
//!
//! Every terminal outcome of a submission carries a stable reason code and a
//! fixed user-facing message. Infrastructure failures are wrapped in
//! `VerifyError::Internal` and surfaced as `SERVER_ERROR` at the API boundary.

use std::fmt;

use thiserror::Error;

/// Why the classifier rejected a disposal video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Waste was not placed in a proper receptacle
    Littering,
    /// Item appears new or usable, not waste
    WasteUsable,
    /// Item too small to matter
    ObjectTooSmall,
    /// Action not clearly visible
    Unclear,
    /// Unrecognized rejection code from the classifier
    Other(String),
}

impl RejectReason {
    pub fn from_code(code: &str) -> Self {
        match code {
            "FAIL_LITTERING" => Self::Littering,
            "FAIL_WASTE_USABLE" => Self::WasteUsable,
            "FAIL_OBJECT_TOO_SMALL" => Self::ObjectTooSmall,
            "FAIL_UNCLEAR" => Self::Unclear,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Littering => "FAIL_LITTERING",
            Self::WasteUsable => "FAIL_WASTE_USABLE",
            Self::ObjectTooSmall => "FAIL_OBJECT_TOO_SMALL",
            Self::Unclear => "FAIL_UNCLEAR",
            Self::Other(code) => code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Littering => {
                "The waste was not disposed of in a proper receptacle. \
                 Please use a trash bin or recycling container."
            }
            Self::WasteUsable => {
                "The item appears to be new or usable. \
                 Please only dispose of actual waste items."
            }
            Self::ObjectTooSmall => {
                "The item is too small to be meaningful for our cleanup goals."
            }
            Self::Unclear => {
                "The disposal action was unclear. Please ensure good lighting \
                 and clear visibility of the waste disposal."
            }
            Self::Other(_) => {
                "Disposal validation failed. Please try again with a clearer recording."
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal failure of a disposal submission.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("missing or malformed submission fields")]
    InvalidInput,

    #[error("user not found")]
    UserNotFound,

    #[error("video payload could not be decoded")]
    InvalidVideo,

    #[error("disposal too close to the previous one")]
    TooClose,

    #[error("classification rejected: {0}")]
    Rejected(RejectReason),

    #[error("offline queue write failed")]
    OfflineStore(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VerifyError {
    /// Stable reason code reported to the submitter.
    pub fn reason_code(&self) -> &str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidVideo => "INVALID_VIDEO",
            Self::TooClose => "FAIL_TOO_CLOSE",
            Self::Rejected(reason) => reason.code(),
            Self::OfflineStore(_) => "OFFLINE_ERROR",
            Self::Internal(_) => "SERVER_ERROR",
        }
    }

    /// Fixed user-facing message for this failure.
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidInput => "Missing required fields.",
            Self::UserNotFound => "User not found.",
            Self::InvalidVideo => "Invalid video data.",
            Self::TooClose => {
                "Please move to a different location before your next disposal."
            }
            Self::Rejected(reason) => reason.message(),
            Self::OfflineStore(_) => "Unable to cache disposal offline. Please try again.",
            Self::Internal(_) => {
                "An error occurred processing your disposal. Please try again."
            }
        }
    }
}
