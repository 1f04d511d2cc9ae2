use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use interest_vault::{
    error::VaultError,
    instruction::{self, VaultInstruction},
    interest::SECONDS_PER_YEAR,
    state::VaultRecord,
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};
use vault_orchestrator::{
    AccountView, ClientError, Confirmation, Fault, InMemoryLedger, LedgerNetwork, ManualClock,
    OrchestratorConfig, Rejection, StepReport, StepState, Submission, SubmissionId,
    SubmissionStatus, TransferPlan, TransferStep, VaultOrchestrator,
};

const START: i64 = 1_700_000_000;
const YEAR: i64 = SECONDS_PER_YEAR as i64;
const SOL: u64 = 1_000_000_000;

struct Harness {
    ledger: Arc<InMemoryLedger>,
    clock: ManualClock,
    orchestrator: VaultOrchestrator<Arc<InMemoryLedger>, ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new(START);
        let ledger = Arc::new(InMemoryLedger::new(interest_vault::id(), clock.clone()));

        let mut config = OrchestratorConfig::for_program(&interest_vault::id());
        config.retry.max_attempts = 3;
        config.retry.initial_interval = Duration::from_millis(1);
        config.retry.max_interval = Duration::from_millis(5);
        config.confirmation.step_delay = Duration::from_millis(1);
        config.confirmation.max_polls = 3;

        let orchestrator = VaultOrchestrator::new(ledger.clone(), clock.clone(), config).unwrap();
        Self {
            ledger,
            clock,
            orchestrator,
        }
    }

    fn funded(&self, lamports: u64) -> Pubkey {
        let key = Pubkey::new_unique();
        self.ledger.airdrop(&key, lamports).unwrap();
        key
    }

    fn balance(&self, address: &Pubkey) -> u64 {
        self.ledger.read_balance(address).unwrap()
    }

    fn record(&self, authority: &Pubkey) -> VaultRecord {
        self.orchestrator.fetch(authority).unwrap().expect("vault exists")
    }

    fn received(&self) -> u64 {
        self.ledger.submissions_received().unwrap()
    }
}

fn committed(step: TransferStep) -> (TransferStep, StepState) {
    (step, StepState::Committed)
}

fn states(reports: &[StepReport]) -> Vec<(TransferStep, StepState)> {
    reports.iter().map(|report| (report.step, report.state)).collect()
}

#[test]
fn test_initialize_twice_returns_same_record() {
    let h = Harness::new();
    let authority = h.funded(SOL);

    let first = h.orchestrator.initialize(&authority).unwrap();
    assert_eq!(first.authority, authority);
    assert_eq!(first.total_deposited, 0);
    assert_eq!(first.accrued_interest, 0);
    assert_eq!(first.last_deposit_time, START);
    assert_eq!(first.last_interest_claim_time, START);

    h.clock.advance(60);
    let received = h.received();
    let second = h.orchestrator.initialize(&authority).unwrap();

    assert_eq!(first, second);
    assert_eq!(h.received(), received);
    assert_eq!(h.orchestrator.fetch(&authority).unwrap(), Some(first));
}

#[test]
fn test_one_year_of_interest_compounds_into_principal() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let funder = h.funded(SOL);

    h.orchestrator.deposit(&authority, 100_000_000).unwrap();
    h.orchestrator.fund_contract_treasury(&funder, 10_000_000).unwrap();
    h.clock.advance(YEAR);

    let estimate = h.orchestrator.estimate_interest(&authority).unwrap();
    assert_eq!(estimate.elapsed, YEAR);
    assert_eq!(estimate.total_owed, 5_000_000);

    let payout = h.orchestrator.claim_interest(&authority).unwrap();
    assert_eq!(payout.amount, 5_000_000);
    assert_eq!(payout.record.total_deposited, 105_000_000);
    assert_eq!(payout.record.accrued_interest, 0);
    assert_eq!(payout.record.last_interest_claim_time, START + YEAR);

    let addresses = h.orchestrator.addresses(&authority).unwrap();
    assert_eq!(h.balance(&addresses.treasury), 105_000_000);
    assert_eq!(h.orchestrator.contract_treasury_balance().unwrap(), 5_000_000);
}

#[test]
fn test_empty_contract_treasury_blocks_claim() {
    let h = Harness::new();
    let authority = h.funded(SOL);

    h.orchestrator.deposit(&authority, 100_000_000).unwrap();
    h.clock.advance(86_400);
    let before = h.record(&authority);

    assert_eq!(
        h.orchestrator.claim_interest(&authority),
        Err(ClientError::Vault(VaultError::InsufficientFundsInContractTreasury))
    );
    assert_eq!(h.record(&authority), before);

    // The ledger enforces the same guard when the local check is bypassed
    let addresses = h.orchestrator.addresses(&authority).unwrap();
    let raw = Submission::new(
        authority,
        instruction::claim_interest(&interest_vault::id(), &addresses),
        None,
        u64::MAX,
    );
    assert_eq!(
        h.ledger.submit(&raw),
        Err(Rejection::Program(
            VaultError::InsufficientFundsInContractTreasury.into()
        ))
    );
    assert_eq!(h.record(&authority), before);
}

#[test]
fn test_second_claim_in_same_second_is_too_early() {
    let h = Harness::new();
    let authority = h.funded(2 * SOL);
    let funder = h.funded(SOL);

    h.orchestrator.deposit(&authority, SOL).unwrap();
    h.orchestrator.fund_contract_treasury(&funder, SOL / 2).unwrap();
    h.clock.advance(100);

    let payout = h.orchestrator.claim_interest(&authority).unwrap();
    assert_eq!(payout.amount, 158);

    assert_eq!(
        h.orchestrator.claim_interest(&authority),
        Err(ClientError::Vault(VaultError::TooEarlyToClaim))
    );
    assert_eq!(h.record(&authority), payout.record);
}

#[test]
fn test_auto_transfer_reports_partial_failure_and_resumes() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let addresses = h.orchestrator.addresses(&authority).unwrap();

    // Own treasury is not a valid destination
    let error = h
        .orchestrator
        .auto_transfer(&authority, 50_000_000, &addresses.treasury)
        .unwrap_err();

    assert_eq!(error.failed_step, TransferStep::Transfer);
    assert_eq!(error.failed_step_state, StepState::NotCommitted);
    assert_eq!(error.source, ClientError::Vault(VaultError::InvalidDestination));
    assert_eq!(
        states(&error.completed),
        vec![
            committed(TransferStep::Initialize),
            committed(TransferStep::Deposit)
        ]
    );
    assert_eq!(h.record(&authority).total_deposited, 50_000_000);
    assert_eq!(h.balance(&addresses.treasury), 50_000_000);

    let resume = error.resume_plan();
    assert_eq!(resume.start_at, TransferStep::Transfer);
    assert_eq!(resume.amount, 50_000_000);

    let destination = Pubkey::new_unique();
    let receipt = h
        .orchestrator
        .execute_plan(&authority, TransferPlan { destination, ..resume }, false)
        .unwrap();

    assert_eq!(states(&receipt.steps), vec![committed(TransferStep::Transfer)]);
    assert_eq!(receipt.record.total_deposited, 0);
    assert_eq!(h.balance(&addresses.treasury), 0);
    assert_eq!(h.balance(&destination), 50_000_000);
}

#[test]
fn test_auto_transfer_skips_existing_vault() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();
    h.orchestrator.initialize(&authority).unwrap();

    let receipt = h
        .orchestrator
        .auto_transfer(&authority, 50_000_000, &destination)
        .unwrap();

    assert_eq!(
        states(&receipt.steps),
        vec![
            (TransferStep::Initialize, StepState::AlreadySatisfied),
            committed(TransferStep::Deposit),
            committed(TransferStep::Transfer),
        ]
    );
    assert_eq!(h.balance(&destination), 50_000_000);
}

#[test]
fn test_direct_transfer_waits_for_deposit() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();

    let receipt = h
        .orchestrator
        .direct_transfer(&authority, 25_000_000, &destination)
        .unwrap();

    assert_eq!(
        states(&receipt.steps),
        vec![
            committed(TransferStep::Initialize),
            committed(TransferStep::Deposit),
            committed(TransferStep::Transfer),
        ]
    );
    let slots: Vec<u64> = receipt.steps.iter().filter_map(|report| report.slot).collect();
    assert!(slots.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(receipt.record.total_deposited, 0);
    assert_eq!(h.balance(&destination), 25_000_000);
}

#[test]
fn test_dropped_confirmation_is_resolved_without_resubmitting() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    h.orchestrator.initialize(&authority).unwrap();

    h.ledger.inject_on("Deposit", Fault::DropConfirmation).unwrap();
    let received = h.received();
    let record = h.orchestrator.deposit(&authority, 70_000_000).unwrap();

    assert_eq!(h.received() - received, 1);
    assert_eq!(record.total_deposited, 70_000_000);
}

#[test]
fn test_lost_submission_is_resubmitted_once() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    h.orchestrator.initialize(&authority).unwrap();

    h.ledger.inject_on("Deposit", Fault::LoseSubmission).unwrap();
    let received = h.received();
    let record = h.orchestrator.deposit(&authority, 70_000_000).unwrap();

    assert_eq!(h.received() - received, 2);
    assert_eq!(record.total_deposited, 70_000_000);

    let addresses = h.orchestrator.addresses(&authority).unwrap();
    assert_eq!(h.balance(&addresses.treasury), 70_000_000);
}

#[test]
fn test_confirmation_timeout_marks_step_unknown() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();
    for _ in 0..3 {
        h.ledger.inject_on("Deposit", Fault::LoseSubmission).unwrap();
    }

    let error = h
        .orchestrator
        .auto_transfer(&authority, 40_000_000, &destination)
        .unwrap_err();

    assert_eq!(error.failed_step, TransferStep::Deposit);
    assert_eq!(error.failed_step_state, StepState::Unknown);
    assert!(matches!(
        error.source,
        ClientError::ConfirmationTimeout {
            attempts: 3,
            pending: Some(_)
        }
    ));
    assert!(error.source.is_retryable());
    assert!(error.pending.is_some());
    assert_eq!(states(&error.completed), vec![committed(TransferStep::Initialize)]);
    assert_eq!(h.record(&authority).total_deposited, 0);

    let resume = error.resume_plan();
    assert_eq!(resume.pending, error.pending);

    // The pending deposit never landed, so it runs again
    let receipt = h
        .orchestrator
        .execute_plan(&authority, resume, false)
        .unwrap();
    assert_eq!(
        states(&receipt.steps),
        vec![committed(TransferStep::Deposit), committed(TransferStep::Transfer)]
    );
    assert_eq!(h.balance(&destination), 40_000_000);
}

#[test]
fn test_last_resubmission_landing_is_confirmed() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();
    h.ledger.inject_on("Deposit", Fault::LoseSubmission).unwrap();
    h.ledger.inject_on("Deposit", Fault::LoseSubmission).unwrap();
    h.ledger.inject_on("Deposit", Fault::DropConfirmation).unwrap();

    let receipt = h
        .orchestrator
        .auto_transfer(&authority, 40_000_000, &destination)
        .unwrap();

    assert_eq!(
        states(&receipt.steps),
        vec![
            committed(TransferStep::Initialize),
            committed(TransferStep::Deposit),
            committed(TransferStep::Transfer),
        ]
    );
    let addresses = h.orchestrator.addresses(&authority).unwrap();
    let rent = h.ledger.rent().minimum_balance(VaultRecord::LEN);
    assert_eq!(receipt.record.total_deposited, 0);
    assert_eq!(h.balance(&addresses.treasury), 0);
    assert_eq!(h.balance(&destination), 40_000_000);
    assert_eq!(
        h.balance(&authority),
        SOL - rent - 3 * h.ledger.fee_lamports() - 40_000_000
    );
}

#[test]
fn test_resumed_plan_skips_pending_step_that_landed() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();
    h.orchestrator.initialize(&authority).unwrap();
    let addresses = h.orchestrator.addresses(&authority).unwrap();

    // A deposit whose confirmation the caller never saw
    let deposit = Submission::new(
        authority,
        instruction::deposit(&interest_vault::id(), &addresses, 40_000_000),
        None,
        u64::MAX,
    );
    let landed = h.ledger.submit(&deposit).unwrap();

    let plan = TransferPlan {
        start_at: TransferStep::Deposit,
        pending: Some(deposit.id),
        ..TransferPlan::new(40_000_000, destination)
    };
    let received = h.received();
    let receipt = h.orchestrator.execute_plan(&authority, plan, false).unwrap();

    assert_eq!(
        receipt.steps,
        vec![
            StepReport {
                step: TransferStep::Deposit,
                state: StepState::Committed,
                slot: Some(landed.slot),
            },
            StepReport {
                step: TransferStep::Transfer,
                state: StepState::Committed,
                slot: receipt.steps[1].slot,
            },
        ]
    );
    assert_eq!(h.received() - received, 1);
    assert_eq!(receipt.record.total_deposited, 0);
    assert_eq!(h.balance(&addresses.treasury), 0);
    assert_eq!(h.balance(&destination), 40_000_000);
}

#[test]
fn test_deposit_into_new_vault_reserves_its_rent() {
    let h = Harness::new();
    let reserve = h.orchestrator.config().min_reserve_lamports;
    let amount = 50_000_000;
    let authority = h.funded(amount + reserve);
    let received = h.received();

    assert_eq!(
        h.orchestrator.deposit(&authority, amount),
        Err(ClientError::Vault(VaultError::InsufficientFunds))
    );
    assert_eq!(h.received(), received);
    assert_eq!(h.orchestrator.fetch(&authority).unwrap(), None);

    let rent = h.ledger.rent().minimum_balance(VaultRecord::LEN);
    h.ledger.airdrop(&authority, rent).unwrap();
    let record = h.orchestrator.deposit(&authority, amount).unwrap();

    assert_eq!(record.total_deposited, amount);
    assert_eq!(h.balance(&authority), reserve - 2 * h.ledger.fee_lamports());
}

#[test]
fn test_transfer_respects_rent_exemption() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();
    let minimum = h.ledger.rent().minimum_balance(0);
    h.orchestrator.deposit(&authority, 2 * minimum).unwrap();
    let before = h.record(&authority);
    let received = h.received();

    assert_eq!(
        h.orchestrator.transfer(&authority, 2 * minimum - 1, &destination),
        Err(ClientError::Vault(VaultError::InsufficientFundsInTreasury))
    );
    assert_eq!(
        h.orchestrator.transfer(&authority, minimum - 1, &destination),
        Err(ClientError::Vault(VaultError::InvalidAmount))
    );
    assert_eq!(h.received(), received);
    assert_eq!(h.record(&authority), before);

    h.orchestrator.transfer(&authority, minimum, &destination).unwrap();
    assert_eq!(h.balance(&destination), minimum);
    assert_eq!(h.balance(&h.orchestrator.addresses(&authority).unwrap().treasury), minimum);
}

#[test]
fn test_treasury_config_is_reserved_for_upgrade_authority() {
    let h = Harness::new();
    let deployer = h.funded(SOL);
    let intruder = h.funded(SOL);
    h.ledger.set_upgrade_authority(Some(&deployer)).unwrap();

    assert_eq!(
        h.orchestrator.initialize_treasury_config(&intruder, &intruder),
        Err(ClientError::Vault(VaultError::Unauthorized))
    );

    // The ledger refuses it too
    let (config, _) = interest_vault::pda::treasury_config_address(&interest_vault::id()).unwrap();
    let raw = Submission::new(
        intruder,
        instruction::initialize_treasury_config(&interest_vault::id(), &intruder, &config, &intruder),
        None,
        u64::MAX,
    );
    assert_eq!(
        h.ledger.submit(&raw),
        Err(Rejection::Program(VaultError::Unauthorized.into()))
    );
    assert_eq!(h.ledger.read_account(&config).unwrap(), None);

    let admin = Pubkey::new_unique();
    let created = h.orchestrator.initialize_treasury_config(&deployer, &admin).unwrap();
    assert_eq!(created.admin, admin);
}

/// Lands a queued submission right after the next claim commits, so the
/// claimant's re-read sees both.
struct DepositAfterClaim {
    inner: Arc<InMemoryLedger>,
    queued: Mutex<Option<Submission>>,
}

impl LedgerNetwork for DepositAfterClaim {
    fn submit(&self, submission: &Submission) -> Result<Confirmation, Rejection> {
        let outcome = self.inner.submit(submission);
        let is_claim = matches!(
            VaultInstruction::unpack(&submission.instruction.data),
            Ok(VaultInstruction::ClaimInterest)
        );
        if outcome.is_ok() && is_claim {
            if let Some(queued) = self.queued.lock().unwrap().take() {
                self.inner.submit(&queued)?;
            }
        }
        outcome
    }

    fn status(&self, id: &SubmissionId) -> Result<Option<SubmissionStatus>, Rejection> {
        self.inner.status(id)
    }

    fn read_balance(&self, address: &Pubkey) -> Result<u64, Rejection> {
        self.inner.read_balance(address)
    }

    fn read_account(&self, address: &Pubkey) -> Result<Option<AccountView>, Rejection> {
        self.inner.read_account(address)
    }

    fn block_time(&self, slot: u64) -> Result<Option<i64>, Rejection> {
        self.inner.block_time(slot)
    }
}

#[test]
fn test_claim_payout_ignores_later_deposits() {
    let h = Harness::new();
    let authority = h.funded(3 * SOL);
    let funder = h.funded(SOL);
    h.orchestrator.deposit(&authority, SOL).unwrap();
    h.orchestrator.fund_contract_treasury(&funder, SOL / 2).unwrap();
    h.clock.advance(100);

    let addresses = h.orchestrator.addresses(&authority).unwrap();
    let racing = Arc::new(DepositAfterClaim {
        inner: h.ledger.clone(),
        queued: Mutex::new(Some(Submission::new(
            authority,
            instruction::deposit(&interest_vault::id(), &addresses, 7_000_000),
            None,
            u64::MAX,
        ))),
    });
    let orchestrator =
        VaultOrchestrator::new(racing.clone(), h.clock.clone(), h.orchestrator.config().clone())
            .unwrap();

    let payout = orchestrator.claim_interest(&authority).unwrap();

    assert_eq!(payout.amount, 158);
    assert_eq!(payout.record.total_deposited, SOL + 158 + 7_000_000);
    assert!(racing.queued.lock().unwrap().is_none());
}

#[test]
fn test_conflict_is_retried_after_rereading() {
    let h = Harness::new();
    let authority = h.funded(2 * SOL);
    let funder = h.funded(SOL);
    h.orchestrator.deposit(&authority, SOL).unwrap();
    h.orchestrator.fund_contract_treasury(&funder, SOL / 2).unwrap();
    h.clock.advance(100);

    h.ledger.inject_on("ClaimInterest", Fault::Conflict).unwrap();
    let payout = h.orchestrator.claim_interest(&authority).unwrap();

    assert_eq!(payout.amount, 158);
    assert_eq!(payout.record.total_deposited, SOL + 158);
}

#[test]
fn test_concurrent_claims_conflict_once() {
    let h = Harness::new();
    let authority = h.funded(2 * SOL);
    let funder = h.funded(SOL);
    h.orchestrator.deposit(&authority, SOL).unwrap();
    h.orchestrator.fund_contract_treasury(&funder, SOL / 2).unwrap();
    h.clock.advance(100);

    let addresses = h.orchestrator.addresses(&authority).unwrap();
    let stale_slot = h.ledger.read_account(&addresses.vault).unwrap().unwrap().slot;

    let payout = h.orchestrator.claim_interest(&authority).unwrap();

    // A claim built against the pre-claim state loses the race
    let stale = Submission::new(
        authority,
        instruction::claim_interest(&interest_vault::id(), &addresses),
        Some(stale_slot),
        u64::MAX,
    );
    assert_eq!(h.ledger.submit(&stale), Err(Rejection::Conflict));
    assert_eq!(h.record(&authority), payout.record);

    // Re-reading shows the interest was already paid this second
    assert_eq!(
        h.orchestrator.claim_interest(&authority),
        Err(ClientError::Vault(VaultError::TooEarlyToClaim))
    );
}

#[test]
fn test_local_guards() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    let destination = Pubkey::new_unique();

    assert_eq!(
        h.orchestrator.transfer(&authority, 10, &destination),
        Err(ClientError::Vault(VaultError::VaultNotInitialized))
    );
    assert_eq!(
        h.orchestrator.deposit(&authority, 0),
        Err(ClientError::Vault(VaultError::InvalidAmount))
    );
    // Whole balance leaves no fee reserve
    assert_eq!(
        h.orchestrator.deposit(&authority, SOL),
        Err(ClientError::Vault(VaultError::InsufficientFunds))
    );
    assert_eq!(h.orchestrator.fetch(&authority).unwrap(), None);

    h.orchestrator.deposit(&authority, 1_000_000).unwrap();
    let before = h.record(&authority);

    assert_eq!(
        h.orchestrator.transfer(&authority, 1_000_001, &destination),
        Err(ClientError::Vault(VaultError::InsufficientFundsInTreasury))
    );
    assert_eq!(
        h.orchestrator.transfer(&authority, 10, &Pubkey::default()),
        Err(ClientError::Vault(VaultError::InvalidDestination))
    );
    assert_eq!(h.record(&authority), before);
}

#[test]
fn test_ledger_rejections_are_surfaced() {
    let h = Harness::new();
    let authority = h.funded(SOL);
    h.orchestrator.deposit(&authority, 2_000_000).unwrap();

    h.ledger
        .inject_on("Transfer", Fault::Reject(ProgramError::InvalidAccountData))
        .unwrap();
    let error = h
        .orchestrator
        .transfer(&authority, 1_000_000, &Pubkey::new_unique())
        .unwrap_err();

    assert_eq!(error, ClientError::Rejected(ProgramError::InvalidAccountData));
    assert!(!error.is_retryable());
    assert_eq!(h.record(&authority).total_deposited, 2_000_000);
}

#[test]
fn test_contract_treasury_withdrawals_are_admin_only() {
    let h = Harness::new();
    let admin = h.funded(2 * SOL);
    let intruder = h.funded(SOL);
    let recipient = Pubkey::new_unique();

    assert_eq!(
        h.orchestrator.withdraw_from_contract_treasury(&admin, 1, &recipient),
        Err(ClientError::Vault(VaultError::TreasuryConfigNotInitialized))
    );

    h.ledger.set_upgrade_authority(Some(&admin)).unwrap();
    let config = h.orchestrator.initialize_treasury_config(&admin, &admin).unwrap();
    assert_eq!(config.admin, admin);
    assert_eq!(
        h.orchestrator.initialize_treasury_config(&intruder, &intruder),
        Err(ClientError::Vault(VaultError::AccountAlreadyInitialized))
    );

    assert_eq!(h.orchestrator.fund_contract_treasury(&admin, SOL).unwrap(), SOL);

    assert_eq!(
        h.orchestrator
            .withdraw_from_contract_treasury(&intruder, SOL / 2, &recipient),
        Err(ClientError::Vault(VaultError::Unauthorized))
    );

    let remaining = h
        .orchestrator
        .withdraw_from_contract_treasury(&admin, 400_000_000, &recipient)
        .unwrap();
    assert_eq!(remaining, 600_000_000);
    assert_eq!(h.balance(&recipient), 400_000_000);

    assert_eq!(
        h.orchestrator.withdraw_from_contract_treasury(&admin, SOL, &recipient),
        Err(ClientError::Vault(VaultError::InsufficientFunds))
    );
}

#[test]
fn test_vault_overview() {
    let h = Harness::new();
    let authority = h.funded(SOL);

    let empty = h.orchestrator.vault_overview(&authority).unwrap();
    assert_eq!(empty.record, None);
    assert_eq!(empty.estimate, None);
    assert_eq!(empty.wallet_balance, SOL);

    h.orchestrator.deposit(&authority, 100_000_000).unwrap();
    h.clock.advance(YEAR / 2);

    let overview = h.orchestrator.vault_overview(&authority).unwrap();
    let rent = h.ledger.rent().minimum_balance(VaultRecord::LEN);
    let fees = 2 * h.ledger.fee_lamports();

    assert_eq!(overview.wallet_balance, SOL - rent - fees - 100_000_000);
    assert_eq!(overview.treasury_balance, 100_000_000);
    assert_eq!(overview.contract_treasury_balance, 0);
    assert_eq!(overview.record.map(|record| record.total_deposited), Some(100_000_000));
    assert_eq!(overview.estimate.map(|quote| quote.total_owed), Some(2_500_000));
}
