use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::VaultError,
    interest::{self, InterestClaim},
    pda::VaultAddresses,
};

/// Bumps cached at initialization so later instructions skip the search
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaultBumps {
    pub vault: u8,
    pub treasury: u8,
    pub contract_treasury: u8,
}

impl From<&VaultAddresses> for VaultBumps {
    fn from(addresses: &VaultAddresses) -> Self {
        Self {
            vault: addresses.vault_bump,
            treasury: addresses.treasury_bump,
            contract_treasury: addresses.contract_treasury_bump,
        }
    }
}

/// Per-owner accounting state, stored at `["vault", authority]`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Owner of the vault, fixed at creation
    pub authority: Pubkey,

    pub bump: u8,
    pub treasury_bump: u8,
    pub contract_treasury_bump: u8,

    /// Principal in lamports; mirrors the treasury balance
    pub total_deposited: u64,

    /// Interest checkpointed but not yet folded into principal
    pub accrued_interest: u64,

    pub last_deposit_time: i64,
    pub last_interest_claim_time: i64,
}

impl VaultRecord {
    pub const DISCRIMINATOR: [u8; 8] = *b"VAULTREC";

    pub const LEN: usize = 8 + // discriminator
        32 + // authority
        1 + // bump
        1 + // treasury_bump
        1 + // contract_treasury_bump
        8 + // total_deposited
        8 + // accrued_interest
        8 + // last_deposit_time
        8; // last_interest_claim_time

    pub fn new(authority: Pubkey, bumps: VaultBumps, now: i64) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            authority,
            bump: bumps.vault,
            treasury_bump: bumps.treasury,
            contract_treasury_bump: bumps.contract_treasury,
            total_deposited: 0,
            accrued_interest: 0,
            last_deposit_time: now,
            last_interest_claim_time: now,
        }
    }

    pub fn bumps(&self) -> VaultBumps {
        VaultBumps {
            vault: self.bump,
            treasury: self.treasury_bump,
            contract_treasury: self.contract_treasury_bump,
        }
    }

    /// Addresses for this vault, rebuilt from the cached bumps.
    pub fn addresses(&self, program_id: &Pubkey) -> Result<VaultAddresses, VaultError> {
        VaultAddresses::with_bumps(
            program_id,
            &self.authority,
            self.bump,
            self.treasury_bump,
            self.contract_treasury_bump,
        )
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        if data.len() < Self::LEN || data[..8] == [0u8; 8] {
            return Err(VaultError::VaultNotInitialized.into());
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

    /// Move interest earned on the current principal into `accrued_interest`.
    ///
    /// A zero or negative interval is a no-op, so this never fails on timing.
    pub fn checkpoint_interest(&mut self, now: i64) -> Result<u64, VaultError> {
        let elapsed = now.saturating_sub(self.last_interest_claim_time);
        if elapsed <= 0 {
            return Ok(0);
        }

        let earned = interest::interest_for(self.total_deposited, elapsed as u64)?;
        self.accrued_interest = self
            .accrued_interest
            .checked_add(earned)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.last_interest_claim_time = now;
        Ok(earned)
    }

    pub fn record_deposit(&mut self, amount: u64, now: i64) -> Result<(), VaultError> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let total_deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;

        self.checkpoint_interest(now)?;
        self.total_deposited = total_deposited;
        self.last_deposit_time = now;
        Ok(())
    }

    pub fn record_transfer(&mut self, amount: u64, now: i64) -> Result<(), VaultError> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }
        if self.total_deposited < amount {
            return Err(VaultError::InsufficientFundsInTreasury);
        }

        self.checkpoint_interest(now)?;
        self.total_deposited -= amount;
        Ok(())
    }

    /// Fold a paid-out claim into principal.
    pub fn apply_claim(&mut self, claim: &InterestClaim) -> Result<(), VaultError> {
        self.total_deposited = self
            .total_deposited
            .checked_add(claim.total_owed)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.accrued_interest = 0;
        self.last_interest_claim_time = self.last_interest_claim_time.max(claim.claimed_at);
        Ok(())
    }
}
