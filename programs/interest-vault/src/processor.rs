use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    balance::{check_credit, check_debit},
    error::VaultError,
    instruction::VaultInstruction,
    interest,
    pda::{self, seeds, VaultAddresses},
    state::{ProgramDataHeader, TreasuryConfig, VaultBumps, VaultRecord},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = VaultInstruction::unpack(instruction_data)?;
        msg!("Instruction: {}", instruction.name());

        match instruction {
            VaultInstruction::Initialize => Self::process_initialize(program_id, accounts),
            VaultInstruction::Deposit { amount } => {
                Self::process_deposit(program_id, accounts, amount)
            }
            VaultInstruction::Transfer { amount, destination } => {
                Self::process_transfer(program_id, accounts, amount, destination)
            }
            VaultInstruction::ClaimInterest => Self::process_claim_interest(program_id, accounts),
            VaultInstruction::FundContractTreasury { amount } => {
                Self::process_fund_contract_treasury(program_id, accounts, amount)
            }
            VaultInstruction::InitializeTreasuryConfig { admin } => {
                Self::process_initialize_treasury_config(program_id, accounts, admin)
            }
            VaultInstruction::WithdrawFromContractTreasury { amount, recipient } => {
                Self::process_withdraw_from_contract_treasury(program_id, accounts, amount, recipient)
            }
        }
    }

    /// Load the vault owned by `authority` and rebuild its addresses from the
    /// cached bumps.
    fn load_vault(
        program_id: &Pubkey,
        vault_info: &AccountInfo,
        authority: &Pubkey,
    ) -> Result<(VaultRecord, VaultAddresses), ProgramError> {
        if vault_info.owner != program_id || vault_info.data_is_empty() {
            return Err(VaultError::VaultNotInitialized.into());
        }

        let record = VaultRecord::unpack(&vault_info.try_borrow_data()?)?;
        if record.authority != *authority {
            return Err(VaultError::Unauthorized.into());
        }

        let addresses = record.addresses(program_id)?;
        if addresses.vault != *vault_info.key {
            return Err(VaultError::InvalidPda.into());
        }

        Ok((record, addresses))
    }

    /// Create a program-owned PDA. An address that already holds lamports
    /// (sent there before initialization) is topped up to the rent-exempt
    /// minimum, then allocated and assigned in place.
    fn create_pda_account<'a>(
        program_id: &Pubkey,
        payer_info: &AccountInfo<'a>,
        target_info: &AccountInfo<'a>,
        system_program: &AccountInfo<'a>,
        space: usize,
        signer_seeds: &[&[u8]],
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required = rent.minimum_balance(space);
        let current = target_info.lamports();
        let shortfall = required.saturating_sub(current);

        check_debit(
            &rent,
            payer_info.lamports(),
            shortfall,
            payer_info.data_len(),
            VaultError::InsufficientFunds,
        )?;

        if current == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    target_info.key,
                    required,
                    space as u64,
                    program_id,
                ),
                &[payer_info.clone(), target_info.clone(), system_program.clone()],
                &[signer_seeds],
            );
        }

        msg!("Account {} already holds {} lamports", target_info.key, current);
        if shortfall > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, target_info.key, shortfall),
                &[payer_info.clone(), target_info.clone(), system_program.clone()],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(target_info.key, space as u64),
            &[target_info.clone(), system_program.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(target_info.key, program_id),
            &[target_info.clone(), system_program.clone()],
            &[signer_seeds],
        )
    }

    fn process_initialize(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let addresses = VaultAddresses::derive(program_id, authority_info.key)?;
        if addresses.vault != *vault_info.key {
            return Err(VaultError::InvalidPda.into());
        }

        // Re-initialization leaves the existing record untouched
        if vault_info.owner == program_id && !vault_info.data_is_empty() {
            let existing = VaultRecord::unpack(&vault_info.try_borrow_data()?)?;
            msg!("Vault already initialized for authority: {}", existing.authority);
            return Ok(());
        }

        Self::create_pda_account(
            program_id,
            authority_info,
            vault_info,
            system_program,
            VaultRecord::LEN,
            &[seeds::VAULT, authority_info.key.as_ref(), &[addresses.vault_bump]],
        )?;

        let now = Clock::get()?.unix_timestamp;
        let record = VaultRecord::new(*authority_info.key, VaultBumps::from(&addresses), now);
        record.pack_into(&mut vault_info.try_borrow_mut_data()?[..])?;

        msg!("Vault initialized for authority: {}", authority_info.key);
        msg!(
            "Vault bump: {}, Treasury bump: {}, Contract treasury bump: {}",
            record.bump,
            record.treasury_bump,
            record.contract_treasury_bump
        );
        Ok(())
    }

    fn process_deposit(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (mut record, addresses) = Self::load_vault(program_id, vault_info, authority_info.key)?;
        if addresses.treasury != *treasury_info.key {
            return Err(VaultError::InvalidPda.into());
        }

        let rent = Rent::get()?;
        if let Err(error) = check_debit(
            &rent,
            authority_info.lamports(),
            amount,
            authority_info.data_len(),
            VaultError::InsufficientFunds,
        ) {
            msg!("Insufficient funds: {} for a deposit of {}", authority_info.lamports(), amount);
            return Err(error.into());
        }
        if let Err(error) = check_credit(
            &rent,
            treasury_info.lamports(),
            amount,
            0,
            VaultError::InvalidAmount,
        ) {
            msg!("Deposit of {} leaves the treasury below rent exemption", amount);
            return Err(error.into());
        }

        let now = Clock::get()?.unix_timestamp;
        record.record_deposit(amount, now)?;

        invoke(
            &system_instruction::transfer(authority_info.key, treasury_info.key, amount),
            &[
                authority_info.clone(),
                treasury_info.clone(),
                system_program.clone(),
            ],
        )?;

        record.pack_into(&mut vault_info.try_borrow_mut_data()?[..])?;

        msg!("Deposited {} lamports into treasury", amount);
        msg!("Total deposited: {} lamports", record.total_deposited);
        Ok(())
    }

    fn process_transfer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
        destination: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let destination_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (mut record, addresses) = Self::load_vault(program_id, vault_info, authority_info.key)?;
        if addresses.treasury != *treasury_info.key {
            return Err(VaultError::InvalidPda.into());
        }
        if *destination_info.key != destination {
            return Err(VaultError::InvalidDestination.into());
        }
        addresses.check_destination(&destination)?;

        let rent = Rent::get()?;
        if let Err(error) = check_debit(
            &rent,
            treasury_info.lamports(),
            amount,
            0,
            VaultError::InsufficientFundsInTreasury,
        ) {
            msg!("Treasury holds {} lamports, requested {}", treasury_info.lamports(), amount);
            return Err(error.into());
        }
        check_credit(
            &rent,
            destination_info.lamports(),
            amount,
            destination_info.data_len(),
            VaultError::InvalidAmount,
        )?;

        let now = Clock::get()?.unix_timestamp;
        record.record_transfer(amount, now)?;

        invoke_signed(
            &system_instruction::transfer(treasury_info.key, destination_info.key, amount),
            &[
                treasury_info.clone(),
                destination_info.clone(),
                system_program.clone(),
            ],
            &[&[seeds::TREASURY, authority_info.key.as_ref(), &[record.treasury_bump]]],
        )?;

        record.pack_into(&mut vault_info.try_borrow_mut_data()?[..])?;

        msg!("Transferred {} lamports from treasury to {}", amount, destination);
        Ok(())
    }

    fn process_claim_interest(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let contract_treasury_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (mut record, addresses) = Self::load_vault(program_id, vault_info, authority_info.key)?;
        if addresses.treasury != *treasury_info.key
            || addresses.contract_treasury != *contract_treasury_info.key
        {
            return Err(VaultError::InvalidPda.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let claim = interest::evaluate_claim(&record, now, contract_treasury_info.lamports())?;

        let rent = Rent::get()?;
        check_debit(
            &rent,
            contract_treasury_info.lamports(),
            claim.total_owed,
            0,
            VaultError::InsufficientFundsInContractTreasury,
        )?;
        // An emptied treasury needs a payout of at least the rent minimum
        check_credit(
            &rent,
            treasury_info.lamports(),
            claim.total_owed,
            0,
            VaultError::NoInterestToClaimYet,
        )?;

        invoke_signed(
            &system_instruction::transfer(
                contract_treasury_info.key,
                treasury_info.key,
                claim.total_owed,
            ),
            &[
                contract_treasury_info.clone(),
                treasury_info.clone(),
                system_program.clone(),
            ],
            &[&[seeds::CONTRACT_TREASURY, &[record.contract_treasury_bump]]],
        )?;

        record.apply_claim(&claim)?;
        record.pack_into(&mut vault_info.try_borrow_mut_data()?[..])?;

        msg!(
            "Paid {} lamports of interest ({} new) into principal",
            claim.total_owed,
            claim.new_interest
        );
        msg!("Total deposited: {} lamports", record.total_deposited);
        Ok(())
    }

    fn process_fund_contract_treasury(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let sender_info = next_account_info(account_info_iter)?;
        let contract_treasury_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !sender_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }

        let (contract_treasury, _) = pda::contract_treasury_address(program_id)?;
        if contract_treasury != *contract_treasury_info.key {
            return Err(VaultError::InvalidPda.into());
        }

        let rent = Rent::get()?;
        check_debit(
            &rent,
            sender_info.lamports(),
            amount,
            sender_info.data_len(),
            VaultError::InsufficientFunds,
        )?;
        check_credit(
            &rent,
            contract_treasury_info.lamports(),
            amount,
            0,
            VaultError::InvalidAmount,
        )?;

        invoke(
            &system_instruction::transfer(sender_info.key, contract_treasury_info.key, amount),
            &[
                sender_info.clone(),
                contract_treasury_info.clone(),
                system_program.clone(),
            ],
        )?;

        msg!("Funded contract treasury with {} lamports", amount);
        Ok(())
    }

    fn process_initialize_treasury_config(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        admin: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let program_data_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (config_address, bump) = pda::treasury_config_address(program_id)?;
        if config_address != *config_info.key {
            return Err(VaultError::InvalidPda.into());
        }

        if config_info.owner == program_id && !config_info.data_is_empty() {
            return Err(VaultError::AccountAlreadyInitialized.into());
        }

        // Only whoever can upgrade the program may name its admin
        if *program_data_info.key != ProgramDataHeader::address(program_id) {
            return Err(VaultError::InvalidPda.into());
        }
        if *program_data_info.owner != ProgramDataHeader::owner() {
            msg!("Program data account is not owned by the upgradeable loader");
            return Err(VaultError::Unauthorized.into());
        }
        let program_data = ProgramDataHeader::unpack(&program_data_info.try_borrow_data()?)?;
        program_data.authorize(payer_info.key)?;

        Self::create_pda_account(
            program_id,
            payer_info,
            config_info,
            system_program,
            TreasuryConfig::LEN,
            &[seeds::TREASURY_CONFIG, &[bump]],
        )?;

        let config = TreasuryConfig::new(admin, bump);
        config.pack_into(&mut config_info.try_borrow_mut_data()?[..])?;

        msg!("Treasury config initialized with admin: {}", admin);
        Ok(())
    }

    fn process_withdraw_from_contract_treasury(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
        recipient: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let contract_treasury_info = next_account_info(account_info_iter)?;
        let recipient_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (config_address, _) = pda::treasury_config_address(program_id)?;
        if config_address != *config_info.key {
            return Err(VaultError::InvalidPda.into());
        }
        if config_info.owner != program_id {
            return Err(VaultError::TreasuryConfigNotInitialized.into());
        }
        let config = TreasuryConfig::unpack(&config_info.try_borrow_data()?)?;
        config.authorize(admin_info.key)?;

        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }

        let (contract_treasury, contract_treasury_bump) = pda::contract_treasury_address(program_id)?;
        if contract_treasury != *contract_treasury_info.key {
            return Err(VaultError::InvalidPda.into());
        }
        if *recipient_info.key != recipient || recipient == contract_treasury {
            return Err(VaultError::InvalidDestination.into());
        }

        let rent = Rent::get()?;
        check_debit(
            &rent,
            contract_treasury_info.lamports(),
            amount,
            0,
            VaultError::InsufficientFunds,
        )?;
        check_credit(
            &rent,
            recipient_info.lamports(),
            amount,
            recipient_info.data_len(),
            VaultError::InvalidAmount,
        )?;

        invoke_signed(
            &system_instruction::transfer(contract_treasury_info.key, recipient_info.key, amount),
            &[
                contract_treasury_info.clone(),
                recipient_info.clone(),
                system_program.clone(),
            ],
            &[&[seeds::CONTRACT_TREASURY, &[contract_treasury_bump]]],
        )?;

        msg!("Withdrew {} lamports from contract treasury to {}", amount, recipient);
        Ok(())
    }
}
