use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{pda::VaultAddresses, state::ProgramDataHeader};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum VaultInstruction {
    /// Create the authority's vault record, or leave an existing one untouched
    /// Accounts:
    /// 0. `[signer, writable]` Authority (pays for storage)
    /// 1. `[writable]` Vault PDA
    /// 2. `[]` System program
    Initialize,

    /// Move lamports from the authority into its treasury
    /// Accounts:
    /// 0. `[signer, writable]` Authority
    /// 1. `[writable]` Vault PDA
    /// 2. `[writable]` Treasury PDA
    /// 3. `[]` System program
    Deposit {
        amount: u64,
    },

    /// Move lamports from the treasury to an arbitrary destination
    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Vault PDA
    /// 2. `[writable]` Treasury PDA
    /// 3. `[writable]` Destination
    /// 4. `[]` System program
    Transfer {
        amount: u64,
        destination: Pubkey,
    },

    /// Pay accrued interest from the contract treasury into the vault
    /// Accounts:
    /// 0. `[signer]` Authority
    /// 1. `[writable]` Vault PDA
    /// 2. `[writable]` Treasury PDA
    /// 3. `[writable]` Contract treasury PDA
    /// 4. `[]` System program
    ClaimInterest,

    /// Add lamports to the shared interest pool (anyone may fund)
    /// Accounts:
    /// 0. `[signer, writable]` Sender
    /// 1. `[writable]` Contract treasury PDA
    /// 2. `[]` System program
    FundContractTreasury {
        amount: u64,
    },

    /// Record the admin allowed to withdraw from the contract treasury
    /// Accounts:
    /// 0. `[signer, writable]` Payer, must be the program's upgrade authority
    /// 1. `[writable]` Treasury config PDA
    /// 2. `[]` Program data account of this program
    /// 3. `[]` System program
    InitializeTreasuryConfig {
        admin: Pubkey,
    },

    /// Withdraw from the contract treasury (admin only)
    /// Accounts:
    /// 0. `[signer]` Admin
    /// 1. `[]` Treasury config PDA
    /// 2. `[writable]` Contract treasury PDA
    /// 3. `[writable]` Recipient
    /// 4. `[]` System program
    WithdrawFromContractTreasury {
        amount: u64,
        recipient: Pubkey,
    },
}

impl VaultInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "Initialize",
            Self::Deposit { .. } => "Deposit",
            Self::Transfer { .. } => "Transfer",
            Self::ClaimInterest => "ClaimInterest",
            Self::FundContractTreasury { .. } => "FundContractTreasury",
            Self::InitializeTreasuryConfig { .. } => "InitializeTreasuryConfig",
            Self::WithdrawFromContractTreasury { .. } => "WithdrawFromContractTreasury",
        }
    }
}

// Helper functions to create instructions
pub fn initialize(program_id: &Pubkey, addresses: &VaultAddresses) -> Instruction {
    let accounts = vec![
        AccountMeta::new(addresses.authority, true),
        AccountMeta::new(addresses.vault, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(*program_id, &VaultInstruction::Initialize, accounts)
}

pub fn deposit(program_id: &Pubkey, addresses: &VaultAddresses, amount: u64) -> Instruction {
    let accounts = vec![
        AccountMeta::new(addresses.authority, true),
        AccountMeta::new(addresses.vault, false),
        AccountMeta::new(addresses.treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(*program_id, &VaultInstruction::Deposit { amount }, accounts)
}

pub fn transfer(
    program_id: &Pubkey,
    addresses: &VaultAddresses,
    amount: u64,
    destination: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(addresses.authority, true),
        AccountMeta::new(addresses.vault, false),
        AccountMeta::new(addresses.treasury, false),
        AccountMeta::new(*destination, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(
        *program_id,
        &VaultInstruction::Transfer {
            amount,
            destination: *destination,
        },
        accounts,
    )
}

pub fn claim_interest(program_id: &Pubkey, addresses: &VaultAddresses) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(addresses.authority, true),
        AccountMeta::new(addresses.vault, false),
        AccountMeta::new(addresses.treasury, false),
        AccountMeta::new(addresses.contract_treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(*program_id, &VaultInstruction::ClaimInterest, accounts)
}

pub fn fund_contract_treasury(
    program_id: &Pubkey,
    sender: &Pubkey,
    contract_treasury: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*sender, true),
        AccountMeta::new(*contract_treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(
        *program_id,
        &VaultInstruction::FundContractTreasury { amount },
        accounts,
    )
}

pub fn initialize_treasury_config(
    program_id: &Pubkey,
    payer: &Pubkey,
    treasury_config: &Pubkey,
    admin: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(*treasury_config, false),
        AccountMeta::new_readonly(ProgramDataHeader::address(program_id), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(
        *program_id,
        &VaultInstruction::InitializeTreasuryConfig { admin: *admin },
        accounts,
    )
}

pub fn withdraw_from_contract_treasury(
    program_id: &Pubkey,
    admin: &Pubkey,
    treasury_config: &Pubkey,
    contract_treasury: &Pubkey,
    recipient: &Pubkey,
    amount: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*admin, true),
        AccountMeta::new_readonly(*treasury_config, false),
        AccountMeta::new(*contract_treasury, false),
        AccountMeta::new(*recipient, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction::new_with_borsh(
        *program_id,
        &VaultInstruction::WithdrawFromContractTreasury {
            amount,
            recipient: *recipient,
        },
        accounts,
    )
}
