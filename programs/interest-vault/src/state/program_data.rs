use solana_program::{bpf_loader_upgradeable, program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;

/// Header of the upgradeable loader's `ProgramData` account
///
/// Layout (bincode):
/// - u32 variant tag, `3` for `ProgramData`
/// - u64 deployment slot
/// - u8 option flag, then the 32-byte upgrade authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDataHeader {
    pub slot: u64,
    pub upgrade_authority: Option<Pubkey>,
}

impl ProgramDataHeader {
    const PROGRAM_DATA_TAG: u32 = 3;

    pub const LEN: usize = 4 + 8 + 1 + 32;

    pub fn address(program_id: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[program_id.as_ref()], &bpf_loader_upgradeable::id()).0
    }

    pub fn owner() -> Pubkey {
        bpf_loader_upgradeable::id()
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        if data.len() < Self::LEN {
            return Err(ProgramError::InvalidAccountData);
        }

        let tag = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if tag != Self::PROGRAM_DATA_TAG {
            return Err(ProgramError::InvalidAccountData);
        }

        let mut slot = [0u8; 8];
        slot.copy_from_slice(&data[4..12]);

        let upgrade_authority = match data[12] {
            0 => None,
            1 => Some(Pubkey::new_from_array(
                data[13..Self::LEN]
                    .try_into()
                    .map_err(|_| ProgramError::InvalidAccountData)?,
            )),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Self {
            slot: u64::from_le_bytes(slot),
            upgrade_authority,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; Self::LEN];
        data[..4].copy_from_slice(&Self::PROGRAM_DATA_TAG.to_le_bytes());
        data[4..12].copy_from_slice(&self.slot.to_le_bytes());
        if let Some(authority) = self.upgrade_authority {
            data[12] = 1;
            data[13..].copy_from_slice(authority.as_ref());
        }
        data
    }

    /// Only the program's upgrade authority may act; a frozen program has none.
    pub fn authorize(&self, caller: &Pubkey) -> Result<(), VaultError> {
        match self.upgrade_authority {
            Some(authority) if authority == *caller => Ok(()),
            _ => Err(VaultError::Unauthorized),
        }
    }
}
