use interest_vault::error::VaultError;
use solana_program::program_error::ProgramError;
use thiserror::Error;

use crate::ledger::{Rejection, SubmissionId};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Submission conflicted with a concurrent write")]
    Conflict,

    /// `pending` is the id whose fate is still open, if one was submitted
    #[error("No confirmation after {attempts} attempts")]
    ConfirmationTimeout {
        attempts: u32,
        pending: Option<SubmissionId>,
    },

    #[error("Ledger rejected the submission: {0}")]
    Rejected(ProgramError),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the same call may succeed later without the caller changing
    /// its request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict | Self::ConfirmationTimeout { .. } | Self::Unavailable(_) => true,
            Self::Vault(error) => error.is_recoverable(),
            Self::Rejected(_) | Self::Config(_) => false,
        }
    }

    /// Submission that may still land; look it up before submitting the
    /// same operation again.
    pub fn pending_submission(&self) -> Option<SubmissionId> {
        match self {
            Self::ConfirmationTimeout { pending, .. } => *pending,
            _ => None,
        }
    }

    pub fn vault_error(&self) -> Option<VaultError> {
        match self {
            Self::Vault(error) => Some(*error),
            _ => None,
        }
    }
}

impl From<ProgramError> for ClientError {
    fn from(error: ProgramError) -> Self {
        match VaultError::from_program_error(&error) {
            Some(vault_error) => Self::Vault(vault_error),
            None => Self::Rejected(error),
        }
    }
}

impl From<Rejection> for ClientError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Program(error) => error.into(),
            Rejection::Conflict => Self::Conflict,
            Rejection::Timeout => Self::ConfirmationTimeout {
                attempts: 1,
                pending: None,
            },
            Rejection::Unavailable(reason) => Self::Unavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_rejections_are_classified() {
        let rejection = Rejection::Program(VaultError::TooEarlyToClaim.into());
        assert_eq!(
            ClientError::from(rejection),
            ClientError::Vault(VaultError::TooEarlyToClaim)
        );

        let foreign = Rejection::Program(ProgramError::MissingRequiredSignature);
        assert_eq!(
            ClientError::from(foreign),
            ClientError::Rejected(ProgramError::MissingRequiredSignature)
        );
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ClientError::Conflict.is_retryable());
        assert!(ClientError::ConfirmationTimeout {
            attempts: 3,
            pending: None
        }
        .is_retryable());
        assert!(ClientError::Vault(VaultError::InsufficientFundsInContractTreasury).is_retryable());
        assert!(ClientError::Vault(VaultError::TooEarlyToClaim).is_retryable());

        assert!(!ClientError::Vault(VaultError::Unauthorized).is_retryable());
        assert!(!ClientError::Vault(VaultError::DerivationExhausted).is_retryable());
        assert!(!ClientError::Rejected(ProgramError::InvalidAccountData).is_retryable());
    }

    #[test]
    fn test_pending_submission_only_on_timeout() {
        let id = solana_program::hash::hash(b"deposit");
        let timeout = ClientError::ConfirmationTimeout {
            attempts: 2,
            pending: Some(id),
        };
        assert_eq!(timeout.pending_submission(), Some(id));
        assert_eq!(ClientError::from(Rejection::Timeout).pending_submission(), None);
        assert_eq!(ClientError::Conflict.pending_submission(), None);
    }
}
