//! Vault orchestrator
//!
//! Runs every vault operation against a [`LedgerNetwork`]: derive addresses,
//! read current state, evaluate guards locally, submit, then re-read. A
//! submission is only sent again when the network reports it never accepted
//! the earlier copy, and the resend reuses the same id so the network can
//! deduplicate it.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use backoff::backoff::Backoff;
use interest_vault::{
    balance::{check_credit, check_debit},
    error::VaultError,
    instruction,
    interest::{self, InterestQuote},
    pda::{self, VaultAddresses},
    state::{ProgramDataHeader, TreasuryConfig, VaultRecord},
};
use solana_program::{instruction::Instruction, pubkey::Pubkey, rent::Rent};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    clock::TimeSource,
    config::OrchestratorConfig,
    error::{ClientError, ClientResult},
    identity::Identity,
    ledger::{Confirmation, LedgerNetwork, Rejection, Submission, SubmissionId, SubmissionStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferStep {
    Initialize,
    Deposit,
    Transfer,
}

impl TransferStep {
    fn next(self) -> Option<Self> {
        match self {
            Self::Initialize => Some(Self::Deposit),
            Self::Deposit => Some(Self::Transfer),
            Self::Transfer => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Submitted and confirmed by the network
    Committed,
    /// Nothing to submit; the ledger already had the required state
    AlreadySatisfied,
    /// The network did not apply the step
    NotCommitted,
    /// No confirmation either way; check the ledger before resuming
    Unknown,
}

impl StepState {
    fn of_failure(error: &ClientError) -> Self {
        match error {
            ClientError::ConfirmationTimeout { .. } | ClientError::Unavailable(_) => Self::Unknown,
            _ => Self::NotCommitted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub step: TransferStep,
    pub state: StepState,
    /// Commit slot, when the step was submitted
    pub slot: Option<u64>,
}

/// A deposit-then-transfer sequence, optionally starting part-way through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub amount: u64,
    pub destination: Pubkey,
    pub start_at: TransferStep,
    /// Earlier submission of the `start_at` step whose outcome was never
    /// confirmed. It is looked up before the step runs again.
    pub pending: Option<SubmissionId>,
}

impl TransferPlan {
    pub fn new(amount: u64, destination: Pubkey) -> Self {
        Self {
            amount,
            destination,
            start_at: TransferStep::Initialize,
            pending: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeReceipt {
    pub steps: Vec<StepReport>,
    pub record: VaultRecord,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{failed_step:?} step failed ({failed_step_state:?}): {source}")]
pub struct CompositeError {
    pub plan: TransferPlan,
    pub failed_step: TransferStep,
    pub failed_step_state: StepState,
    pub completed: Vec<StepReport>,
    /// Submission of the failed step that may still land
    pub pending: Option<SubmissionId>,
    #[source]
    pub source: ClientError,
}

impl CompositeError {
    /// Plan that picks up at the failed step, skipping every committed one.
    /// An `Unknown` step carries its pending id, so running the plan first
    /// asks the ledger whether that submission landed.
    pub fn resume_plan(&self) -> TransferPlan {
        TransferPlan {
            start_at: self.failed_step,
            pending: self.pending,
            ..self.plan
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestPayout {
    pub amount: u64,
    pub record: VaultRecord,
}

/// Everything a caller needs to display one vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultOverview {
    pub addresses: VaultAddresses,
    pub record: Option<VaultRecord>,
    pub wallet_balance: u64,
    pub treasury_balance: u64,
    pub contract_treasury_balance: u64,
    pub estimate: Option<InterestQuote>,
}

struct LoadedVault {
    record: VaultRecord,
    addresses: VaultAddresses,
    slot: u64,
}

pub struct VaultOrchestrator<L, T> {
    ledger: L,
    clock: T,
    config: OrchestratorConfig,
    program_id: Pubkey,
    rent: Rent,
    nonce: AtomicU64,
}

impl<L: LedgerNetwork, T: TimeSource> VaultOrchestrator<L, T> {
    pub fn new(ledger: L, clock: T, config: OrchestratorConfig) -> ClientResult<Self> {
        config.validate()?;
        let program_id = config.program_id()?;

        Ok(Self {
            ledger,
            clock,
            config,
            program_id,
            rent: Rent::default(),
            nonce: AtomicU64::new(0),
        })
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn addresses(&self, authority: &impl Identity) -> ClientResult<VaultAddresses> {
        Ok(VaultAddresses::derive(&self.program_id, &authority.public_key())?)
    }

    fn load_vault(&self, addresses: &VaultAddresses) -> ClientResult<Option<LoadedVault>> {
        let view = match self.ledger.read_account(&addresses.vault)? {
            Some(view) if view.owner == self.program_id && !view.data.is_empty() => view,
            _ => return Ok(None),
        };

        let record = VaultRecord::unpack(&view.data)?;
        Ok(Some(LoadedVault {
            record,
            addresses: *addresses,
            slot: view.slot,
        }))
    }

    fn require_vault(&self, addresses: &VaultAddresses) -> ClientResult<LoadedVault> {
        self.load_vault(addresses)?
            .ok_or(ClientError::Vault(VaultError::VaultNotInitialized))
    }

    pub fn fetch(&self, authority: &impl Identity) -> ClientResult<Option<VaultRecord>> {
        let addresses = self.addresses(authority)?;
        Ok(self.load_vault(&addresses)?.map(|vault| vault.record))
    }

    /// Create the vault if it is missing. Every operation that may create a
    /// vault goes through here.
    fn ensure_initialized(&self, authority: &Pubkey) -> ClientResult<(LoadedVault, StepReport)> {
        let addresses = VaultAddresses::derive(&self.program_id, authority)?;
        if let Some(vault) = self.load_vault(&addresses)? {
            debug!(authority = %authority, vault = %addresses.vault, "vault already initialized");
            let report = StepReport {
                step: TransferStep::Initialize,
                state: StepState::AlreadySatisfied,
                slot: None,
            };
            return Ok((vault, report));
        }

        info!(authority = %authority, vault = %addresses.vault, "initializing vault");
        let ix = instruction::initialize(&self.program_id, &addresses);
        let confirmation = self.with_conflict_retry("initialize", || {
            self.submit(*authority, ix.clone(), None)
        })?;

        let vault = self.require_vault(&addresses)?;
        let report = StepReport {
            step: TransferStep::Initialize,
            state: StepState::Committed,
            slot: Some(confirmation.slot),
        };
        Ok((vault, report))
    }

    /// Idempotent: an existing vault is returned unchanged.
    pub fn initialize(&self, authority: &impl Identity) -> ClientResult<VaultRecord> {
        let (vault, _) = self.ensure_initialized(&authority.public_key())?;
        Ok(vault.record)
    }

    pub fn deposit(&self, authority: &impl Identity, amount: u64) -> ClientResult<VaultRecord> {
        let authority = authority.public_key();
        self.deposit_confirmed(&authority, amount)?;
        let addresses = VaultAddresses::derive(&self.program_id, &authority)?;
        Ok(self.require_vault(&addresses)?.record)
    }

    fn deposit_confirmed(&self, authority: &Pubkey, amount: u64) -> ClientResult<Confirmation> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }

        let addresses = VaultAddresses::derive(&self.program_id, authority)?;
        // A missing vault is created first, at the wallet's expense
        let storage = match self.load_vault(&addresses)? {
            Some(_) => 0,
            None => self.rent.minimum_balance(VaultRecord::LEN),
        };
        let required = amount
            .checked_add(self.config.min_reserve_lamports)
            .and_then(|total| total.checked_add(storage))
            .ok_or(VaultError::ArithmeticOverflow)?;
        let balance = self.ledger.read_balance(authority)?;
        if balance < required {
            warn!(authority = %authority, balance, required, storage, "wallet cannot cover deposit");
            return Err(VaultError::InsufficientFunds.into());
        }

        let treasury_balance = self.ledger.read_balance(&addresses.treasury)?;
        if let Err(error) = check_credit(&self.rent, treasury_balance, amount, 0, VaultError::InvalidAmount) {
            warn!(authority = %authority, amount, treasury_balance, "deposit leaves treasury below rent exemption");
            return Err(error.into());
        }

        self.ensure_initialized(authority)?;

        self.with_conflict_retry("deposit", || {
            let vault = self.require_vault(&addresses)?;

            info!(authority = %authority, amount, "depositing");
            let ix = instruction::deposit(&self.program_id, &vault.addresses, amount);
            self.submit(*authority, ix, Some(vault.slot))
        })
    }

    pub fn transfer(
        &self,
        authority: &impl Identity,
        amount: u64,
        destination: &Pubkey,
    ) -> ClientResult<VaultRecord> {
        let authority = authority.public_key();
        self.transfer_confirmed(&authority, amount, destination)?;
        let addresses = VaultAddresses::derive(&self.program_id, &authority)?;
        Ok(self.require_vault(&addresses)?.record)
    }

    fn transfer_confirmed(
        &self,
        authority: &Pubkey,
        amount: u64,
        destination: &Pubkey,
    ) -> ClientResult<Confirmation> {
        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }
        let addresses = VaultAddresses::derive(&self.program_id, authority)?;
        addresses.check_destination(destination)?;

        self.with_conflict_retry("transfer", || {
            let vault = self.require_vault(&addresses)?;
            let treasury_balance = self.ledger.read_balance(&addresses.treasury)?;
            let covered = check_debit(
                &self.rent,
                treasury_balance,
                amount,
                0,
                VaultError::InsufficientFundsInTreasury,
            );
            if vault.record.total_deposited < amount || covered.is_err() {
                warn!(
                    authority = %authority,
                    amount,
                    total_deposited = vault.record.total_deposited,
                    treasury_balance,
                    "treasury cannot cover transfer"
                );
                return Err(VaultError::InsufficientFundsInTreasury.into());
            }

            let destination_data = self
                .ledger
                .read_account(destination)?
                .map_or(0, |view| view.data.len());
            check_credit(
                &self.rent,
                self.ledger.read_balance(destination)?,
                amount,
                destination_data,
                VaultError::InvalidAmount,
            )?;

            info!(authority = %authority, amount, destination = %destination, "transferring");
            let ix = instruction::transfer(&self.program_id, &addresses, amount, destination);
            self.submit(*authority, ix, Some(vault.slot))
        })
    }

    /// Fold accrued interest into principal, paid from the contract treasury.
    pub fn claim_interest(&self, authority: &impl Identity) -> ClientResult<InterestPayout> {
        let authority = authority.public_key();
        let addresses = VaultAddresses::derive(&self.program_id, &authority)?;

        // `before` is exactly the state the claim applied to: any write to
        // the vault after it was read makes the submission conflict.
        let (before, confirmation) = self.with_conflict_retry("claim_interest", || {
            let vault = self.require_vault(&addresses)?;
            let available = self.ledger.read_balance(&addresses.contract_treasury)?;
            let claim =
                interest::evaluate_claim(&vault.record, self.clock.unix_timestamp(), available)?;
            check_debit(
                &self.rent,
                available,
                claim.total_owed,
                0,
                VaultError::InsufficientFundsInContractTreasury,
            )?;
            check_credit(
                &self.rent,
                self.ledger.read_balance(&addresses.treasury)?,
                claim.total_owed,
                0,
                VaultError::NoInterestToClaimYet,
            )?;

            info!(authority = %authority, owed = claim.total_owed, "claiming interest");
            let ix = instruction::claim_interest(&self.program_id, &addresses);
            let confirmation = self.submit(authority, ix, Some(vault.slot))?;
            Ok((vault.record, confirmation))
        })?;

        let record = self.require_vault(&addresses)?.record;
        let paid_at = match self.ledger.block_time(confirmation.slot) {
            Ok(Some(timestamp)) => timestamp,
            outcome => {
                debug!(slot = confirmation.slot, ?outcome, "block time unknown, using record claim time");
                record.last_interest_claim_time
            }
        };
        let amount = interest::quote(&before, paid_at)?.total_owed;

        info!(authority = %authority, amount, total_deposited = record.total_deposited, "interest paid");
        Ok(InterestPayout { amount, record })
    }

    /// Anyone may top up the contract treasury. Returns its new balance.
    pub fn fund_contract_treasury(&self, sender: &impl Identity, amount: u64) -> ClientResult<u64> {
        let sender = sender.public_key();
        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }
        let sender_data = self
            .ledger
            .read_account(&sender)?
            .map_or(0, |view| view.data.len());
        check_debit(
            &self.rent,
            self.ledger.read_balance(&sender)?,
            amount,
            sender_data,
            VaultError::InsufficientFunds,
        )?;

        let (contract_treasury, _) = pda::contract_treasury_address(&self.program_id)?;
        check_credit(
            &self.rent,
            self.ledger.read_balance(&contract_treasury)?,
            amount,
            0,
            VaultError::InvalidAmount,
        )?;
        info!(sender = %sender, amount, "funding contract treasury");
        let ix = instruction::fund_contract_treasury(&self.program_id, &sender, &contract_treasury, amount);
        self.with_conflict_retry("fund_contract_treasury", || self.submit(sender, ix.clone(), None))?;

        Ok(self.ledger.read_balance(&contract_treasury)?)
    }

    fn load_treasury_config(&self) -> ClientResult<(Pubkey, Option<TreasuryConfig>)> {
        let (address, _) = pda::treasury_config_address(&self.program_id)?;
        let config = match self.ledger.read_account(&address)? {
            Some(view) if view.owner == self.program_id && !view.data.is_empty() => {
                Some(TreasuryConfig::unpack(&view.data)?)
            }
            _ => None,
        };
        Ok((address, config))
    }

    pub fn initialize_treasury_config(
        &self,
        payer: &impl Identity,
        admin: &Pubkey,
    ) -> ClientResult<TreasuryConfig> {
        let payer = payer.public_key();
        let (address, existing) = self.load_treasury_config()?;
        if existing.is_some() {
            return Err(VaultError::AccountAlreadyInitialized.into());
        }

        let program_data = self
            .ledger
            .read_account(&ProgramDataHeader::address(&self.program_id))?
            .filter(|view| view.owner == ProgramDataHeader::owner())
            .ok_or(VaultError::Unauthorized)?;
        if let Err(error) = ProgramDataHeader::unpack(&program_data.data)?.authorize(&payer) {
            warn!(payer = %payer, "only the upgrade authority may name the treasury admin");
            return Err(error.into());
        }

        info!(payer = %payer, admin = %admin, "initializing treasury config");
        let ix = instruction::initialize_treasury_config(&self.program_id, &payer, &address, admin);
        self.with_conflict_retry("initialize_treasury_config", || {
            self.submit(payer, ix.clone(), None)
        })?;

        self.load_treasury_config()?
            .1
            .ok_or(ClientError::Vault(VaultError::TreasuryConfigNotInitialized))
    }

    /// Admin-only. Returns the contract treasury's remaining balance.
    pub fn withdraw_from_contract_treasury(
        &self,
        admin: &impl Identity,
        amount: u64,
        recipient: &Pubkey,
    ) -> ClientResult<u64> {
        let admin = admin.public_key();
        let (config_address, config) = self.load_treasury_config()?;
        config
            .ok_or(VaultError::TreasuryConfigNotInitialized)?
            .authorize(&admin)?;

        if amount == 0 {
            return Err(VaultError::InvalidAmount.into());
        }
        let (contract_treasury, _) = pda::contract_treasury_address(&self.program_id)?;
        if *recipient == contract_treasury {
            return Err(VaultError::InvalidDestination.into());
        }
        check_debit(
            &self.rent,
            self.ledger.read_balance(&contract_treasury)?,
            amount,
            0,
            VaultError::InsufficientFunds,
        )?;
        let recipient_data = self
            .ledger
            .read_account(recipient)?
            .map_or(0, |view| view.data.len());
        check_credit(
            &self.rent,
            self.ledger.read_balance(recipient)?,
            amount,
            recipient_data,
            VaultError::InvalidAmount,
        )?;

        info!(admin = %admin, amount, recipient = %recipient, "withdrawing from contract treasury");
        let ix = instruction::withdraw_from_contract_treasury(
            &self.program_id,
            &admin,
            &config_address,
            &contract_treasury,
            recipient,
            amount,
        );
        self.with_conflict_retry("withdraw_from_contract_treasury", || {
            self.submit(admin, ix.clone(), None)
        })?;

        Ok(self.ledger.read_balance(&contract_treasury)?)
    }

    /// Advisory: the ledger's own clock decides the amount actually paid.
    pub fn estimate_interest(&self, authority: &impl Identity) -> ClientResult<InterestQuote> {
        let addresses = self.addresses(authority)?;
        let vault = self.require_vault(&addresses)?;
        Ok(interest::quote(&vault.record, self.clock.unix_timestamp())?)
    }

    pub fn contract_treasury_balance(&self) -> ClientResult<u64> {
        let (contract_treasury, _) = pda::contract_treasury_address(&self.program_id)?;
        Ok(self.ledger.read_balance(&contract_treasury)?)
    }

    pub fn vault_overview(&self, authority: &impl Identity) -> ClientResult<VaultOverview> {
        let addresses = self.addresses(authority)?;
        let record = self.load_vault(&addresses)?.map(|vault| vault.record);
        let estimate = match &record {
            Some(record) => Some(interest::quote(record, self.clock.unix_timestamp())?),
            None => None,
        };

        Ok(VaultOverview {
            wallet_balance: self.ledger.read_balance(&addresses.authority)?,
            treasury_balance: self.ledger.read_balance(&addresses.treasury)?,
            contract_treasury_balance: self.ledger.read_balance(&addresses.contract_treasury)?,
            addresses,
            record,
            estimate,
        })
    }

    /// initialize → deposit → transfer, each as its own submission.
    pub fn auto_transfer(
        &self,
        authority: &impl Identity,
        amount: u64,
        destination: &Pubkey,
    ) -> Result<CompositeReceipt, CompositeError> {
        self.execute_plan(authority, TransferPlan::new(amount, *destination), false)
    }

    /// Same steps as `auto_transfer`, but the transfer is only built once the
    /// deposit is visible on the ledger.
    pub fn direct_transfer(
        &self,
        authority: &impl Identity,
        amount: u64,
        destination: &Pubkey,
    ) -> Result<CompositeReceipt, CompositeError> {
        self.execute_plan(authority, TransferPlan::new(amount, *destination), true)
    }

    /// Run `plan` from its `start_at` step. Committed steps are never rolled
    /// back. A pending submission in the plan is looked up first: if it
    /// landed, its step counts as committed and the plan moves on.
    pub fn execute_plan(
        &self,
        authority: &impl Identity,
        plan: TransferPlan,
        confirm_between_steps: bool,
    ) -> Result<CompositeReceipt, CompositeError> {
        let authority = authority.public_key();
        let mut completed = Vec::with_capacity(3);
        let fail = |step: TransferStep, completed: Vec<StepReport>, source: ClientError| {
            let failed_step_state = StepState::of_failure(&source);
            warn!(
                authority = %authority,
                step = ?step,
                state = ?failed_step_state,
                error = %source,
                "composite transfer stopped"
            );
            CompositeError {
                plan,
                failed_step: step,
                failed_step_state,
                completed,
                pending: source.pending_submission(),
                source,
            }
        };

        let mut next_step = Some(plan.start_at);
        let mut deposit_slot = None;

        if let Some(id) = plan.pending {
            match self.landed_slot(&id) {
                Ok(Some(slot)) => {
                    info!(authority = %authority, step = ?plan.start_at, slot, "pending step had landed");
                    completed.push(StepReport {
                        step: plan.start_at,
                        state: StepState::Committed,
                        slot: Some(slot),
                    });
                    if plan.start_at == TransferStep::Deposit {
                        deposit_slot = Some(slot);
                    }
                    next_step = plan.start_at.next();
                }
                Ok(None) => {
                    debug!(authority = %authority, step = ?plan.start_at, "pending step never landed, running it again");
                }
                Err(e) => {
                    let mut error = fail(plan.start_at, completed, e);
                    error.failed_step_state = StepState::Unknown;
                    error.pending = Some(id);
                    return Err(error);
                }
            }
        }
        let runs = |step: TransferStep| next_step.map_or(false, |start| start <= step);

        if runs(TransferStep::Initialize) {
            match self.ensure_initialized(&authority) {
                Ok((_, report)) => completed.push(report),
                Err(e) => return Err(fail(TransferStep::Initialize, completed, e)),
            }
        }

        if runs(TransferStep::Deposit) {
            let confirmation = match self.deposit_confirmed(&authority, plan.amount) {
                Ok(confirmation) => confirmation,
                Err(e) => return Err(fail(TransferStep::Deposit, completed, e)),
            };
            completed.push(StepReport {
                step: TransferStep::Deposit,
                state: StepState::Committed,
                slot: Some(confirmation.slot),
            });
            deposit_slot = Some(confirmation.slot);
        }

        if let (true, Some(slot)) = (confirm_between_steps, deposit_slot) {
            if let Err(e) = self.await_visible(&authority, slot) {
                // The transfer was never built
                let mut error = fail(TransferStep::Transfer, completed, e);
                error.failed_step_state = StepState::NotCommitted;
                error.pending = None;
                return Err(error);
            }
        }

        if runs(TransferStep::Transfer) {
            let confirmation =
                match self.transfer_confirmed(&authority, plan.amount, &plan.destination) {
                    Ok(confirmation) => confirmation,
                    Err(e) => return Err(fail(TransferStep::Transfer, completed, e)),
                };
            completed.push(StepReport {
                step: TransferStep::Transfer,
                state: StepState::Committed,
                slot: Some(confirmation.slot),
            });
        }

        let record = VaultAddresses::derive(&self.program_id, &authority)
            .map_err(ClientError::from)
            .and_then(|addresses| self.require_vault(&addresses))
            .map(|vault| vault.record)
            .map_err(|e| fail(TransferStep::Transfer, completed.clone(), e))?;

        Ok(CompositeReceipt {
            steps: completed,
            record,
        })
    }

    /// Commit slot of `id` if it landed. A failed or never-seen submission
    /// left no trace, so its step may run again.
    fn landed_slot(&self, id: &SubmissionId) -> ClientResult<Option<u64>> {
        match self.ledger.status(id)? {
            Some(SubmissionStatus::Committed { slot }) => Ok(Some(slot)),
            Some(SubmissionStatus::Failed(rejection)) => {
                debug!(id = %id, error = %rejection, "pending submission had failed");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Wait out the step delay, then poll until the vault is readable at or
    /// after `slot`.
    fn await_visible(&self, authority: &Pubkey, slot: u64) -> ClientResult<()> {
        let addresses = VaultAddresses::derive(&self.program_id, authority)?;
        let polls = self.config.confirmation.max_polls;
        let mut backoff = self.config.retry.backoff();

        thread::sleep(self.config.confirmation.step_delay);
        for poll in 1..=polls {
            if let Some(vault) = self.load_vault(&addresses)? {
                if vault.slot >= slot {
                    debug!(authority = %authority, slot, poll, "deposit visible");
                    return Ok(());
                }
            }
            if poll < polls {
                thread::sleep(backoff.next_backoff().unwrap_or(self.config.retry.max_interval));
            }
        }

        Err(ClientError::ConfirmationTimeout {
            attempts: polls,
            pending: None,
        })
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::Relaxed)
    }

    fn submit(&self, signer: Pubkey, ix: Instruction, read_slot: Option<u64>) -> ClientResult<Confirmation> {
        let submission = Submission::new(signer, ix, read_slot, self.next_nonce());
        self.confirm(&submission)
    }

    /// Submit once, then on timeout ask the network what became of the id
    /// before doing anything else. Only an id the network never saw is sent
    /// again.
    fn confirm(&self, submission: &Submission) -> ClientResult<Confirmation> {
        let max_attempts = self.config.retry.max_attempts;
        let mut backoff = self.config.retry.backoff();
        let mut attempts = 1;
        let mut outcome = self.ledger.submit(submission);

        loop {
            match outcome {
                Ok(confirmation) => {
                    debug!(id = %submission.id, slot = confirmation.slot, attempts, "confirmed");
                    return Ok(confirmation);
                }
                Err(Rejection::Timeout) if attempts < max_attempts => {}
                Err(Rejection::Timeout) => return self.final_lookup(submission, attempts, &mut backoff),
                Err(rejection) => return Err(rejection.into()),
            }

            attempts += 1;
            thread::sleep(backoff.next_backoff().unwrap_or(self.config.retry.max_interval));

            outcome = match self.ledger.status(&submission.id) {
                Ok(Some(SubmissionStatus::Committed { slot })) => Ok(Confirmation {
                    id: submission.id,
                    slot,
                }),
                Ok(Some(SubmissionStatus::Failed(rejection))) => Err(rejection),
                Ok(None) => {
                    warn!(id = %submission.id, attempt = attempts, "submission not seen by ledger, resubmitting");
                    self.ledger.submit(submission)
                }
                Err(Rejection::Unavailable(reason)) => {
                    debug!(id = %submission.id, reason = %reason, "status lookup unavailable");
                    Err(Rejection::Timeout)
                }
                Err(rejection) => Err(rejection),
            };
        }
    }

    /// Out of attempts: one last status lookup, since the final copy may have
    /// landed after its confirmation was lost.
    fn final_lookup(
        &self,
        submission: &Submission,
        attempts: u32,
        backoff: &mut impl Backoff,
    ) -> ClientResult<Confirmation> {
        thread::sleep(backoff.next_backoff().unwrap_or(self.config.retry.max_interval));

        match self.ledger.status(&submission.id) {
            Ok(Some(SubmissionStatus::Committed { slot })) => {
                debug!(id = %submission.id, slot, attempts, "confirmed on final lookup");
                Ok(Confirmation {
                    id: submission.id,
                    slot,
                })
            }
            Ok(Some(SubmissionStatus::Failed(rejection))) => Err(rejection.into()),
            outcome => {
                warn!(id = %submission.id, attempts, ?outcome, "confirmation timed out");
                Err(ClientError::ConfirmationTimeout {
                    attempts,
                    pending: Some(submission.id),
                })
            }
        }
    }

    /// Re-run `attempt` after a `Conflict`; each run re-reads state and
    /// builds a fresh submission.
    fn with_conflict_retry<R>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> ClientResult<R>,
    ) -> ClientResult<R> {
        let max_attempts = self.config.retry.max_attempts;
        let mut backoff = self.config.retry.backoff();

        for round in 1..=max_attempts {
            match attempt() {
                Err(ClientError::Conflict) if round < max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.config.retry.max_interval);
                    warn!(operation, attempt = round, ?delay, "conflicting write, re-reading");
                    thread::sleep(delay);
                }
                outcome => return outcome,
            }
        }

        Err(ClientError::Conflict)
    }
}
