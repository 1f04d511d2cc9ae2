use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;

/// Global contract treasury settings, stored at `["treasury_config"]`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreasuryConfig {
    pub discriminator: [u8; 8],

    /// Only key allowed to withdraw from the contract treasury
    pub admin: Pubkey,

    pub bump: u8,
}

impl TreasuryConfig {
    pub const DISCRIMINATOR: [u8; 8] = *b"TRSYCONF";

    pub const LEN: usize = 8 + 32 + 1;

    pub fn new(admin: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            admin,
            bump,
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        if data.len() < Self::LEN || data[..8] == [0u8; 8] {
            return Err(VaultError::TreasuryConfigNotInitialized.into());
        }
        if data[..8] != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }
        Self::try_from_slice(&data[..Self::LEN]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn pack_into(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() < Self::LEN {
            return Err(ProgramError::AccountDataTooSmall);
        }
        self.serialize(&mut &mut dst[..Self::LEN])
            .map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProgramError> {
        let mut data = vec![0u8; Self::LEN];
        self.pack_into(&mut data)?;
        Ok(data)
    }

    pub fn authorize(&self, caller: &Pubkey) -> Result<(), VaultError> {
        if self.admin != *caller {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_authorize() {
        let admin = Pubkey::new_unique();
        let config = TreasuryConfig::new(admin, 250);
        let data = config.to_bytes().unwrap();
        assert_eq!(data.len(), TreasuryConfig::LEN);

        let loaded = TreasuryConfig::unpack(&data).unwrap();
        assert!(loaded.authorize(&admin).is_ok());
        assert_eq!(loaded.authorize(&Pubkey::new_unique()), Err(VaultError::Unauthorized));
    }

    #[test]
    fn test_missing_config() {
        assert_eq!(
            TreasuryConfig::unpack(&[]),
            Err(VaultError::TreasuryConfigNotInitialized.into())
        );
    }
}
