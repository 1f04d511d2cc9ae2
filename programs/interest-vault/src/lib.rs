// Interest-bearing custodial vault program
// Native Solana implementation - NO ANCHOR

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
};

pub mod balance;
pub mod error;
pub mod instruction;
pub mod interest;
pub mod pda;
pub mod processor;
pub mod state;

use crate::processor::Processor;

solana_program::declare_id!("4fdAPL4LP42bum23ZbyR4ruUBGrCCourvCQzkW734aEZ");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process);

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    msg!("Interest Vault Program entrypoint");
    Processor::process(program_id, accounts, instruction_data)
}
