//! Program Derived Address (PDA) utilities
//!
//! Centralized derivation for every account the vault program touches, shared
//! by the on-ledger processor and off-ledger clients so both sides always agree
//! on addresses and bumps.

use solana_program::pubkey::{Pubkey, PubkeyError, MAX_SEEDS, MAX_SEED_LEN};

use crate::error::VaultError;

/// PDA seeds for the vault program's accounts
pub mod seeds {
    pub const VAULT: &[u8] = b"vault";
    pub const TREASURY: &[u8] = b"treasury";
    pub const CONTRACT_TREASURY: &[u8] = b"contract_treasury";
    pub const TREASURY_CONFIG: &[u8] = b"treasury_config";
}

/// Search bump values from 255 down to 0 for the first off-curve address.
///
/// The bump occupies the last seed slot, so at most `MAX_SEEDS - 1` caller
/// seeds are accepted.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), VaultError> {
    if seeds.len() >= MAX_SEEDS || seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(VaultError::InvalidSeeds);
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut candidate: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        candidate.extend_from_slice(seeds);
        candidate.push(&bump_seed);

        match Pubkey::create_program_address(&candidate, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(PubkeyError::InvalidSeeds) => continue,
            Err(_) => return Err(VaultError::InvalidSeeds),
        }
    }

    Err(VaultError::DerivationExhausted)
}

/// Rebuild an address from its seeds and a cached bump.
pub fn create_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Result<Pubkey, VaultError> {
    let bump_seed = [bump];
    let mut candidate: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
    candidate.extend_from_slice(seeds);
    candidate.push(&bump_seed);

    Pubkey::create_program_address(&candidate, program_id).map_err(|_| VaultError::InvalidPda)
}

/// Check that `expected` is the address produced by `seeds` with a cached bump.
pub fn verify_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &Pubkey,
    expected: &Pubkey,
) -> Result<(), VaultError> {
    match create_address(seeds, bump, program_id) {
        Ok(address) if address == *expected => Ok(()),
        _ => Err(VaultError::InvalidPda),
    }
}

pub fn vault_address(program_id: &Pubkey, authority: &Pubkey) -> Result<(Pubkey, u8), VaultError> {
    derive_address(&[seeds::VAULT, authority.as_ref()], program_id)
}

pub fn treasury_address(program_id: &Pubkey, authority: &Pubkey) -> Result<(Pubkey, u8), VaultError> {
    derive_address(&[seeds::TREASURY, authority.as_ref()], program_id)
}

pub fn contract_treasury_address(program_id: &Pubkey) -> Result<(Pubkey, u8), VaultError> {
    derive_address(&[seeds::CONTRACT_TREASURY], program_id)
}

pub fn treasury_config_address(program_id: &Pubkey) -> Result<(Pubkey, u8), VaultError> {
    derive_address(&[seeds::TREASURY_CONFIG], program_id)
}

/// The three addresses every per-owner operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultAddresses {
    pub authority: Pubkey,
    pub vault: Pubkey,
    pub vault_bump: u8,
    pub treasury: Pubkey,
    pub treasury_bump: u8,
    pub contract_treasury: Pubkey,
    pub contract_treasury_bump: u8,
}

impl VaultAddresses {
    pub fn derive(program_id: &Pubkey, authority: &Pubkey) -> Result<Self, VaultError> {
        let (vault, vault_bump) = vault_address(program_id, authority)?;
        let (treasury, treasury_bump) = treasury_address(program_id, authority)?;
        let (contract_treasury, contract_treasury_bump) = contract_treasury_address(program_id)?;

        Ok(Self {
            authority: *authority,
            vault,
            vault_bump,
            treasury,
            treasury_bump,
            contract_treasury,
            contract_treasury_bump,
        })
    }

    /// Rebuild the addresses from bumps cached in a vault record, skipping the
    /// bump search.
    pub fn with_bumps(
        program_id: &Pubkey,
        authority: &Pubkey,
        vault_bump: u8,
        treasury_bump: u8,
        contract_treasury_bump: u8,
    ) -> Result<Self, VaultError> {
        Ok(Self {
            authority: *authority,
            vault: create_address(&[seeds::VAULT, authority.as_ref()], vault_bump, program_id)?,
            vault_bump,
            treasury: create_address(&[seeds::TREASURY, authority.as_ref()], treasury_bump, program_id)?,
            treasury_bump,
            contract_treasury: create_address(
                &[seeds::CONTRACT_TREASURY],
                contract_treasury_bump,
                program_id,
            )?,
            contract_treasury_bump,
        })
    }

    /// Funds may leave a vault for any address except the program's own
    /// accounts and the default key.
    pub fn check_destination(&self, destination: &Pubkey) -> Result<(), VaultError> {
        if *destination == Pubkey::default()
            || *destination == self.vault
            || *destination == self.treasury
            || *destination == self.contract_treasury
        {
            return Err(VaultError::InvalidDestination);
        }
        Ok(())
    }
}
