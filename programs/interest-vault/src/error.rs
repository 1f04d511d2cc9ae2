use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum VaultError {
    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("No bump seed yields an off-curve address")]
    DerivationExhausted = 1,

    #[error("Invalid seeds for address derivation")]
    InvalidSeeds = 2,

    #[error("Account does not match its derived address")]
    InvalidPda = 3,

    #[error("Vault is not initialized")]
    VaultNotInitialized = 4,

    #[error("Insufficient funds")]
    InsufficientFunds = 5,

    #[error("Insufficient funds in treasury")]
    InsufficientFundsInTreasury = 6,

    #[error("Insufficient funds in contract treasury to pay interest")]
    InsufficientFundsInContractTreasury = 7,

    #[error("Too early to claim interest (minimum 1 second)")]
    TooEarlyToClaim = 8,

    #[error("No interest to claim yet")]
    NoInterestToClaimYet = 9,

    #[error("Unauthorized")]
    Unauthorized = 10,

    #[error("Amount must be greater than zero")]
    InvalidAmount = 11,

    #[error("Invalid transfer destination")]
    InvalidDestination = 12,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 13,

    #[error("Account already initialized")]
    AccountAlreadyInitialized = 14,

    #[error("Treasury config is not initialized")]
    TreasuryConfigNotInitialized = 15,
}

impl VaultError {
    /// Recovers the vault error carried by a `ProgramError::Custom` code.
    pub fn from_program_error(error: &ProgramError) -> Option<Self> {
        match error {
            ProgramError::Custom(code) => Self::from_u32(*code),
            _ => None,
        }
    }

    /// Balance and timing guards clear up once the caller funds or waits.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds
                | Self::InsufficientFundsInTreasury
                | Self::InsufficientFundsInContractTreasury
                | Self::TooEarlyToClaim
                | Self::NoInterestToClaimYet
        )
    }
}

impl PrintProgramError for VaultError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("VaultError: {}", self);
    }
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for VaultError {
    fn type_of() -> &'static str {
        "VaultError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_code_round_trip() {
        let program_error: ProgramError = VaultError::TooEarlyToClaim.into();
        assert_eq!(program_error, ProgramError::Custom(8));
        assert_eq!(
            VaultError::from_program_error(&program_error),
            Some(VaultError::TooEarlyToClaim)
        );
    }

    #[test]
    fn test_foreign_errors_are_not_decoded() {
        assert_eq!(VaultError::from_program_error(&ProgramError::Custom(999)), None);
        assert_eq!(
            VaultError::from_program_error(&ProgramError::InvalidAccountData),
            None
        );
    }
}
