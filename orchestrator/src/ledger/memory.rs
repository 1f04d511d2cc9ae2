//! In-memory ledger network
//!
//! Executes vault instructions against an account map with the same checks
//! and state transitions as the on-chain processor. Each submission is staged
//! and committed atomically at a new slot. Faults can be queued to exercise
//! the orchestrator's recovery paths.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use interest_vault::{
    balance::{check_credit, check_debit},
    error::VaultError,
    instruction::VaultInstruction,
    interest,
    pda::{self, VaultAddresses},
    state::{ProgramDataHeader, TreasuryConfig, VaultBumps, VaultRecord},
};
use solana_program::{
    instruction::AccountMeta, program_error::ProgramError, pubkey::Pubkey, rent::Rent,
    system_program,
};
use tracing::{debug, info, warn};

use super::{
    AccountView, Confirmation, LedgerNetwork, Rejection, Submission, SubmissionId,
    SubmissionStatus,
};
use crate::clock::TimeSource;

/// Flat fee charged to the signer of every committed submission
pub const DEFAULT_FEE_LAMPORTS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Apply the submission but report a timeout to the submitter
    DropConfirmation,
    /// Drop the submission before it is processed and report a timeout
    LoseSubmission,
    /// Reject the submission as conflicting without applying it
    Conflict,
    /// Reject the submission with a program error without applying it
    Reject(ProgramError),
}

#[derive(Debug, Clone)]
struct StoredAccount {
    lamports: u64,
    data: Vec<u8>,
    owner: Pubkey,
    last_write_slot: u64,
}

impl StoredAccount {
    fn system() -> Self {
        Self {
            lamports: 0,
            data: Vec::new(),
            owner: system_program::id(),
            last_write_slot: 0,
        }
    }
}

struct QueuedFault {
    instruction: Option<&'static str>,
    fault: Fault,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, StoredAccount>,
    slot: u64,
    block_times: HashMap<u64, i64>,
    processed: HashMap<SubmissionId, SubmissionStatus>,
    faults: VecDeque<QueuedFault>,
    received: u64,
}

impl LedgerState {
    fn take_fault(&mut self, instruction: Option<&'static str>) -> Option<Fault> {
        let position = self
            .faults
            .iter()
            .position(|queued| queued.instruction.is_none() || queued.instruction == instruction)?;
        self.faults.remove(position).map(|queued| queued.fault)
    }
}

/// Account changes made by one submission, applied only if it succeeds
struct Staged<'a> {
    base: &'a HashMap<Pubkey, StoredAccount>,
    changes: HashMap<Pubkey, StoredAccount>,
}

impl<'a> Staged<'a> {
    fn new(base: &'a HashMap<Pubkey, StoredAccount>) -> Self {
        Self {
            base,
            changes: HashMap::new(),
        }
    }

    fn get(&self, key: &Pubkey) -> Option<&StoredAccount> {
        self.changes.get(key).or_else(|| self.base.get(key))
    }

    fn lamports(&self, key: &Pubkey) -> u64 {
        self.get(key).map_or(0, |account| account.lamports)
    }

    fn data_len(&self, key: &Pubkey) -> usize {
        self.get(key).map_or(0, |account| account.data.len())
    }

    fn is_program_owned(&self, key: &Pubkey, program_id: &Pubkey) -> bool {
        self.get(key)
            .map_or(false, |account| account.owner == *program_id && !account.data.is_empty())
    }

    fn entry(&mut self, key: &Pubkey) -> &mut StoredAccount {
        let base = self.base;
        self.changes
            .entry(*key)
            .or_insert_with(|| base.get(key).cloned().unwrap_or_else(StoredAccount::system))
    }

    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        let source = self.entry(from);
        source.lamports = source
            .lamports
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;

        let destination = self.entry(to);
        destination.lamports = destination
            .lamports
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }

    fn debit(&mut self, key: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        let account = self.entry(key);
        account.lamports = account
            .lamports
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        Ok(())
    }

    /// Create a program-owned account. Lamports already sitting at `key`
    /// count towards the rent-exempt minimum.
    fn create(
        &mut self,
        rent: &Rent,
        payer: &Pubkey,
        key: &Pubkey,
        data: Vec<u8>,
        owner: &Pubkey,
    ) -> Result<(), ProgramError> {
        let shortfall = rent.minimum_balance(data.len()).saturating_sub(self.lamports(key));
        check_debit(
            rent,
            self.lamports(payer),
            shortfall,
            self.data_len(payer),
            VaultError::InsufficientFunds,
        )?;

        self.transfer(payer, key, shortfall)?;
        let account = self.entry(key);
        account.data = data;
        account.owner = *owner;
        Ok(())
    }

    fn write_data(&mut self, key: &Pubkey, data: Vec<u8>) {
        self.entry(key).data = data;
    }
}

fn meta(accounts: &[AccountMeta], index: usize) -> Result<&AccountMeta, ProgramError> {
    accounts.get(index).ok_or(ProgramError::NotEnoughAccountKeys)
}

fn signer(accounts: &[AccountMeta], index: usize) -> Result<Pubkey, ProgramError> {
    let account = meta(accounts, index)?;
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(account.pubkey)
}

pub struct InMemoryLedger {
    program_id: Pubkey,
    clock: Box<dyn TimeSource>,
    rent: Rent,
    fee_lamports: u64,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(program_id: Pubkey, clock: impl TimeSource + 'static) -> Self {
        Self {
            program_id,
            clock: Box::new(clock),
            rent: Rent::default(),
            fee_lamports: DEFAULT_FEE_LAMPORTS,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn with_fee(mut self, fee_lamports: u64) -> Self {
        self.fee_lamports = fee_lamports;
        self
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn fee_lamports(&self) -> u64 {
        self.fee_lamports
    }

    pub fn rent(&self) -> &Rent {
        &self.rent
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, Rejection> {
        self.state
            .lock()
            .map_err(|_| Rejection::Unavailable("ledger state lock poisoned".to_string()))
    }

    pub fn slot(&self) -> Result<u64, Rejection> {
        Ok(self.state()?.slot)
    }

    /// Install the program's upgradeable-loader data account naming
    /// `authority` as upgrade authority, or none for a frozen program.
    pub fn set_upgrade_authority(&self, authority: Option<&Pubkey>) -> Result<(), Rejection> {
        let header = ProgramDataHeader {
            slot: 0,
            upgrade_authority: authority.copied(),
        };

        let mut guard = self.state()?;
        let state = &mut *guard;
        state.slot += 1;
        let slot = state.slot;
        state.block_times.insert(slot, self.clock.unix_timestamp());
        state.accounts.insert(
            ProgramDataHeader::address(&self.program_id),
            StoredAccount {
                lamports: self.rent.minimum_balance(ProgramDataHeader::LEN),
                data: header.to_bytes(),
                owner: ProgramDataHeader::owner(),
                last_write_slot: slot,
            },
        );
        Ok(())
    }

    /// Number of submissions that reached the network, duplicates and lost
    /// copies included.
    pub fn submissions_received(&self) -> Result<u64, Rejection> {
        Ok(self.state()?.received)
    }

    /// Credit `lamports` to `address` out of thin air.
    pub fn airdrop(&self, address: &Pubkey, lamports: u64) -> Result<(), Rejection> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        state.slot += 1;
        let slot = state.slot;
        state.block_times.insert(slot, self.clock.unix_timestamp());

        let account = state
            .accounts
            .entry(*address)
            .or_insert_with(StoredAccount::system);
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(Rejection::Program(ProgramError::ArithmeticOverflow))?;
        account.last_write_slot = slot;

        debug!(address = %address, lamports, slot, "airdrop");
        Ok(())
    }

    /// Queue a fault for the next submission of any kind.
    pub fn inject(&self, fault: Fault) -> Result<(), Rejection> {
        self.state()?.faults.push_back(QueuedFault {
            instruction: None,
            fault,
        });
        Ok(())
    }

    /// Queue a fault for the next submission of the named instruction,
    /// e.g. `"Deposit"`.
    pub fn inject_on(&self, instruction: &'static str, fault: Fault) -> Result<(), Rejection> {
        self.state()?.faults.push_back(QueuedFault {
            instruction: Some(instruction),
            fault,
        });
        Ok(())
    }

    fn record_failure(
        state: &mut LedgerState,
        id: SubmissionId,
        rejection: Rejection,
    ) -> Result<Confirmation, Rejection> {
        state
            .processed
            .insert(id, SubmissionStatus::Failed(rejection.clone()));
        Err(rejection)
    }

    fn apply(&self, state: &mut LedgerState, submission: &Submission) -> Result<Confirmation, Rejection> {
        let now = self.clock.unix_timestamp();
        let changes = match self.execute(&state.accounts, submission, now) {
            Ok(changes) => changes,
            Err(rejection) => {
                debug!(id = %submission.id, error = %rejection, "submission failed");
                return Self::record_failure(state, submission.id, rejection);
            }
        };

        state.slot += 1;
        let slot = state.slot;
        state.block_times.insert(slot, now);
        for (key, mut account) in changes {
            account.last_write_slot = slot;
            state.accounts.insert(key, account);
        }
        state
            .processed
            .insert(submission.id, SubmissionStatus::Committed { slot });

        debug!(id = %submission.id, slot, "submission committed");
        Ok(Confirmation {
            id: submission.id,
            slot,
        })
    }

    fn execute(
        &self,
        accounts: &HashMap<Pubkey, StoredAccount>,
        submission: &Submission,
        now: i64,
    ) -> Result<HashMap<Pubkey, StoredAccount>, Rejection> {
        let instruction = &submission.instruction;

        if let Some(read_slot) = submission.read_slot {
            let stale = instruction
                .accounts
                .iter()
                .filter(|meta| meta.is_writable)
                .any(|meta| {
                    accounts
                        .get(&meta.pubkey)
                        .map_or(false, |account| account.last_write_slot > read_slot)
                });
            if stale {
                return Err(Rejection::Conflict);
            }
        }

        if instruction.program_id != self.program_id {
            return Err(Rejection::Program(ProgramError::IncorrectProgramId));
        }
        if instruction
            .accounts
            .iter()
            .any(|meta| meta.is_signer && meta.pubkey != submission.signer)
        {
            return Err(Rejection::Program(ProgramError::MissingRequiredSignature));
        }

        let mut staged = Staged::new(accounts);
        staged
            .debit(&submission.signer, self.fee_lamports)
            .map_err(Rejection::Program)?;
        self.process(&mut staged, &instruction.accounts, &instruction.data, now)
            .map_err(Rejection::Program)?;

        Ok(staged.changes)
    }

    fn process(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        data: &[u8],
        now: i64,
    ) -> Result<(), ProgramError> {
        match VaultInstruction::unpack(data)? {
            VaultInstruction::Initialize => self.initialize(staged, accounts, now),
            VaultInstruction::Deposit { amount } => self.deposit(staged, accounts, amount, now),
            VaultInstruction::Transfer {
                amount,
                destination,
            } => self.transfer(staged, accounts, amount, destination, now),
            VaultInstruction::ClaimInterest => self.claim_interest(staged, accounts, now),
            VaultInstruction::FundContractTreasury { amount } => {
                self.fund_contract_treasury(staged, accounts, amount)
            }
            VaultInstruction::InitializeTreasuryConfig { admin } => {
                self.initialize_treasury_config(staged, accounts, admin)
            }
            VaultInstruction::WithdrawFromContractTreasury { amount, recipient } => {
                self.withdraw_from_contract_treasury(staged, accounts, amount, recipient)
            }
        }
    }

    fn load_vault(
        &self,
        staged: &Staged,
        vault: &Pubkey,
        authority: &Pubkey,
    ) -> Result<(VaultRecord, VaultAddresses), ProgramError> {
        let account = staged
            .get(vault)
            .filter(|account| account.owner == self.program_id && !account.data.is_empty())
            .ok_or(VaultError::VaultNotInitialized)?;

        let record = VaultRecord::unpack(&account.data)?;
        if record.authority != *authority {
            return Err(VaultError::Unauthorized.into());
        }

        let addresses = record.addresses(&self.program_id)?;
        if addresses.vault != *vault {
            return Err(VaultError::InvalidPda.into());
        }
        Ok((record, addresses))
    }

    fn initialize(&self, staged: &mut Staged, accounts: &[AccountMeta], now: i64) -> Result<(), ProgramError> {
        let authority = signer(accounts, 0)?;
        let vault = meta(accounts, 1)?.pubkey;

        let addresses = VaultAddresses::derive(&self.program_id, &authority)?;
        if addresses.vault != vault {
            return Err(VaultError::InvalidPda.into());
        }
        if staged.is_program_owned(&vault, &self.program_id) {
            return Ok(());
        }

        let record = VaultRecord::new(authority, VaultBumps::from(&addresses), now);
        staged.create(&self.rent, &authority, &vault, record.to_bytes()?, &self.program_id)
    }

    fn deposit(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        amount: u64,
        now: i64,
    ) -> Result<(), ProgramError> {
        let authority = signer(accounts, 0)?;
        let vault = meta(accounts, 1)?.pubkey;
        let treasury = meta(accounts, 2)?.pubkey;

        let (mut record, addresses) = self.load_vault(staged, &vault, &authority)?;
        if addresses.treasury != treasury {
            return Err(VaultError::InvalidPda.into());
        }
        check_debit(
            &self.rent,
            staged.lamports(&authority),
            amount,
            staged.data_len(&authority),
            VaultError::InsufficientFunds,
        )?;
        check_credit(
            &self.rent,
            staged.lamports(&treasury),
            amount,
            0,
            VaultError::InvalidAmount,
        )?;

        record.record_deposit(amount, now)?;
        staged.transfer(&authority, &treasury, amount)?;
        staged.write_data(&vault, record.to_bytes()?);
        Ok(())
    }

    fn transfer(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        amount: u64,
        destination: Pubkey,
        now: i64,
    ) -> Result<(), ProgramError> {
        let authority = signer(accounts, 0)?;
        let vault = meta(accounts, 1)?.pubkey;
        let treasury = meta(accounts, 2)?.pubkey;
        let destination_key = meta(accounts, 3)?.pubkey;

        let (mut record, addresses) = self.load_vault(staged, &vault, &authority)?;
        if addresses.treasury != treasury {
            return Err(VaultError::InvalidPda.into());
        }
        if destination_key != destination {
            return Err(VaultError::InvalidDestination.into());
        }
        addresses.check_destination(&destination)?;

        check_debit(
            &self.rent,
            staged.lamports(&treasury),
            amount,
            0,
            VaultError::InsufficientFundsInTreasury,
        )?;
        check_credit(
            &self.rent,
            staged.lamports(&destination),
            amount,
            staged.data_len(&destination),
            VaultError::InvalidAmount,
        )?;

        record.record_transfer(amount, now)?;
        staged.transfer(&treasury, &destination, amount)?;
        staged.write_data(&vault, record.to_bytes()?);
        Ok(())
    }

    fn claim_interest(&self, staged: &mut Staged, accounts: &[AccountMeta], now: i64) -> Result<(), ProgramError> {
        let authority = signer(accounts, 0)?;
        let vault = meta(accounts, 1)?.pubkey;
        let treasury = meta(accounts, 2)?.pubkey;
        let contract_treasury = meta(accounts, 3)?.pubkey;

        let (mut record, addresses) = self.load_vault(staged, &vault, &authority)?;
        if addresses.treasury != treasury || addresses.contract_treasury != contract_treasury {
            return Err(VaultError::InvalidPda.into());
        }

        let claim = interest::evaluate_claim(&record, now, staged.lamports(&contract_treasury))?;
        check_debit(
            &self.rent,
            staged.lamports(&contract_treasury),
            claim.total_owed,
            0,
            VaultError::InsufficientFundsInContractTreasury,
        )?;
        check_credit(
            &self.rent,
            staged.lamports(&treasury),
            claim.total_owed,
            0,
            VaultError::NoInterestToClaimYet,
        )?;
        staged.transfer(&contract_treasury, &treasury, claim.total_owed)?;
        record.apply_claim(&claim)?;
        staged.write_data(&vault, record.to_bytes()?);
        Ok(())
    }

    fn fund_contract_treasury(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        amount: u64,
    ) -> Result<(), ProgramError> {
        let sender = signer(accounts, 0)?;
        let contract_treasury = meta(accounts, 1)?.pubkey;

        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }
        let (expected, _) = pda::contract_treasury_address(&self.program_id)?;
        if expected != contract_treasury {
            return Err(VaultError::InvalidPda.into());
        }
        check_debit(
            &self.rent,
            staged.lamports(&sender),
            amount,
            staged.data_len(&sender),
            VaultError::InsufficientFunds,
        )?;
        check_credit(
            &self.rent,
            staged.lamports(&contract_treasury),
            amount,
            0,
            VaultError::InvalidAmount,
        )?;

        staged.transfer(&sender, &contract_treasury, amount)
    }

    fn initialize_treasury_config(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        admin: Pubkey,
    ) -> Result<(), ProgramError> {
        let payer = signer(accounts, 0)?;
        let config = meta(accounts, 1)?.pubkey;
        let program_data = meta(accounts, 2)?.pubkey;

        let (expected, bump) = pda::treasury_config_address(&self.program_id)?;
        if expected != config {
            return Err(VaultError::InvalidPda.into());
        }
        if staged.is_program_owned(&config, &self.program_id) {
            return Err(VaultError::AccountAlreadyInitialized.into());
        }

        if program_data != ProgramDataHeader::address(&self.program_id) {
            return Err(VaultError::InvalidPda.into());
        }
        let program_data_account = staged
            .get(&program_data)
            .filter(|account| account.owner == ProgramDataHeader::owner())
            .ok_or(VaultError::Unauthorized)?;
        ProgramDataHeader::unpack(&program_data_account.data)?.authorize(&payer)?;

        staged.create(
            &self.rent,
            &payer,
            &config,
            TreasuryConfig::new(admin, bump).to_bytes()?,
            &self.program_id,
        )
    }

    fn withdraw_from_contract_treasury(
        &self,
        staged: &mut Staged,
        accounts: &[AccountMeta],
        amount: u64,
        recipient: Pubkey,
    ) -> Result<(), ProgramError> {
        let admin = signer(accounts, 0)?;
        let config = meta(accounts, 1)?.pubkey;
        let contract_treasury = meta(accounts, 2)?.pubkey;
        let recipient_key = meta(accounts, 3)?.pubkey;

        let (expected_config, _) = pda::treasury_config_address(&self.program_id)?;
        if expected_config != config {
            return Err(VaultError::InvalidPda.into());
        }
        let config_account = staged
            .get(&config)
            .filter(|account| account.owner == self.program_id)
            .ok_or(VaultError::TreasuryConfigNotInitialized)?;
        TreasuryConfig::unpack(&config_account.data)?.authorize(&admin)?;

        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }
        let (expected_treasury, _) = pda::contract_treasury_address(&self.program_id)?;
        if expected_treasury != contract_treasury {
            return Err(VaultError::InvalidPda.into());
        }
        if recipient_key != recipient || recipient == contract_treasury {
            return Err(VaultError::InvalidDestination.into());
        }
        check_debit(
            &self.rent,
            staged.lamports(&contract_treasury),
            amount,
            0,
            VaultError::InsufficientFunds,
        )?;
        check_credit(
            &self.rent,
            staged.lamports(&recipient),
            amount,
            staged.data_len(&recipient),
            VaultError::InvalidAmount,
        )?;

        staged.transfer(&contract_treasury, &recipient, amount)
    }
}

impl LedgerNetwork for InMemoryLedger {
    fn submit(&self, submission: &Submission) -> Result<Confirmation, Rejection> {
        let mut guard = self.state()?;
        let state = &mut *guard;
        state.received += 1;

        if let Some(previous) = state.processed.get(&submission.id) {
            debug!(id = %submission.id, "duplicate submission");
            return match previous {
                SubmissionStatus::Committed { slot } => Ok(Confirmation {
                    id: submission.id,
                    slot: *slot,
                }),
                SubmissionStatus::Failed(rejection) => Err(rejection.clone()),
            };
        }

        let name = VaultInstruction::unpack(&submission.instruction.data)
            .map(|instruction| instruction.name())
            .ok();
        let fault = state.take_fault(name);

        match fault {
            Some(Fault::LoseSubmission) => {
                warn!(id = %submission.id, "fault: submission lost");
                Err(Rejection::Timeout)
            }
            Some(Fault::Conflict) => {
                warn!(id = %submission.id, "fault: forced conflict");
                Self::record_failure(state, submission.id, Rejection::Conflict)
            }
            Some(Fault::Reject(error)) => {
                warn!(id = %submission.id, error = %error, "fault: forced rejection");
                Self::record_failure(state, submission.id, Rejection::Program(error))
            }
            Some(Fault::DropConfirmation) => {
                let outcome = self.apply(state, submission);
                info!(id = %submission.id, applied = outcome.is_ok(), "fault: confirmation dropped");
                Err(Rejection::Timeout)
            }
            None => self.apply(state, submission),
        }
    }

    fn status(&self, id: &SubmissionId) -> Result<Option<SubmissionStatus>, Rejection> {
        Ok(self.state()?.processed.get(id).cloned())
    }

    fn block_time(&self, slot: u64) -> Result<Option<i64>, Rejection> {
        Ok(self.state()?.block_times.get(&slot).copied())
    }

    fn read_balance(&self, address: &Pubkey) -> Result<u64, Rejection> {
        Ok(self
            .state()?
            .accounts
            .get(address)
            .map_or(0, |account| account.lamports))
    }

    fn read_account(&self, address: &Pubkey) -> Result<Option<AccountView>, Rejection> {
        let state = self.state()?;
        Ok(state.accounts.get(address).map(|account| AccountView {
            lamports: account.lamports,
            data: account.data.clone(),
            owner: account.owner,
            slot: state.slot,
        }))
    }
}
