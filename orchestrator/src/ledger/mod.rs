//! Ledger network boundary
//!
//! The orchestrator only ever talks to the network through [`LedgerNetwork`].
//! Confirmation latency and transport belong to the implementation; the
//! orchestrator decides what to submit and when a retry is safe.

pub mod memory;

use std::sync::Arc;

use solana_program::{
    hash::{hashv, Hash},
    instruction::Instruction,
    program_error::ProgramError,
    pubkey::Pubkey,
};
use thiserror::Error;

/// Stable identity of a submission; resubmitting the same id is deduplicated
/// by the network.
pub type SubmissionId = Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub signer: Pubkey,
    pub instruction: Instruction,
    /// Slot of the state this submission was built against. Writable
    /// accounts changed after it make the network reject with `Conflict`.
    pub read_slot: Option<u64>,
}

impl Submission {
    pub fn new(signer: Pubkey, instruction: Instruction, read_slot: Option<u64>, nonce: u64) -> Self {
        let mut metas = Vec::with_capacity(instruction.accounts.len() * 34);
        for meta in &instruction.accounts {
            metas.extend_from_slice(meta.pubkey.as_ref());
            metas.push(meta.is_signer as u8);
            metas.push(meta.is_writable as u8);
        }

        let id = hashv(&[
            signer.as_ref(),
            instruction.program_id.as_ref(),
            &metas,
            &instruction.data,
            &read_slot.unwrap_or(u64::MAX).to_le_bytes(),
            &nonce.to_le_bytes(),
        ]);

        Self {
            id,
            signer,
            instruction,
            read_slot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub id: SubmissionId,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Committed { slot: u64 },
    Failed(Rejection),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Program error: {0}")]
    Program(ProgramError),

    #[error("A writable account changed after the submission was built")]
    Conflict,

    #[error("Confirmation timed out")]
    Timeout,

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot of one account as observed at `slot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub lamports: u64,
    pub data: Vec<u8>,
    pub owner: Pubkey,
    pub slot: u64,
}

pub trait LedgerNetwork {
    fn submit(&self, submission: &Submission) -> Result<Confirmation, Rejection>;

    /// `Ok(None)` means the network never accepted this id.
    fn status(&self, id: &SubmissionId) -> Result<Option<SubmissionStatus>, Rejection>;

    fn read_balance(&self, address: &Pubkey) -> Result<u64, Rejection>;

    fn read_account(&self, address: &Pubkey) -> Result<Option<AccountView>, Rejection>;

    /// Ledger clock at which `slot` was produced, when the network still
    /// knows it.
    fn block_time(&self, slot: u64) -> Result<Option<i64>, Rejection>;
}

impl<L: LedgerNetwork + ?Sized> LedgerNetwork for Arc<L> {
    fn submit(&self, submission: &Submission) -> Result<Confirmation, Rejection> {
        (**self).submit(submission)
    }

    fn status(&self, id: &SubmissionId) -> Result<Option<SubmissionStatus>, Rejection> {
        (**self).status(id)
    }

    fn read_balance(&self, address: &Pubkey) -> Result<u64, Rejection> {
        (**self).read_balance(address)
    }

    fn read_account(&self, address: &Pubkey) -> Result<Option<AccountView>, Rejection> {
        (**self).read_account(address)
    }

    fn block_time(&self, slot: u64) -> Result<Option<i64>, Rejection> {
        (**self).block_time(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interest_vault::{instruction, pda::VaultAddresses};

    #[test]
    fn test_submission_id_depends_on_nonce_and_payload() {
        let program_id = interest_vault::id();
        let authority = Pubkey::new_unique();
        let addresses = VaultAddresses::derive(&program_id, &authority).unwrap();

        let deposit = instruction::deposit(&program_id, &addresses, 10);
        let first = Submission::new(authority, deposit.clone(), Some(3), 0);
        let same = Submission::new(authority, deposit.clone(), Some(3), 0);
        let next = Submission::new(authority, deposit, Some(3), 1);
        let other_amount =
            Submission::new(authority, instruction::deposit(&program_id, &addresses, 11), Some(3), 0);

        assert_eq!(first.id, same.id);
        assert_ne!(first.id, next.id);
        assert_ne!(first.id, other_amount.id);
    }
}
