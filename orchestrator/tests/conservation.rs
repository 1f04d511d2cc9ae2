use std::{sync::Arc, time::Duration};

use proptest::prelude::*;
use solana_program::pubkey::Pubkey;
use vault_orchestrator::{
    InMemoryLedger, LedgerNetwork, ManualClock, OrchestratorConfig, VaultOrchestrator,
};

const SOL: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
enum Op {
    Deposit(u64),
    Transfer(u64),
    Claim,
    Wait(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..2 * SOL).prop_map(Op::Deposit),
        (1u64..2 * SOL).prop_map(Op::Transfer),
        Just(Op::Claim),
        (0i64..30 * 86_400).prop_map(Op::Wait),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn treasury_always_matches_principal(ops in prop::collection::vec(op(), 1..25)) {
        let clock = ManualClock::new(1_700_000_000);
        let ledger = Arc::new(InMemoryLedger::new(interest_vault::id(), clock.clone()));
        let mut config = OrchestratorConfig::for_program(&interest_vault::id());
        config.retry.initial_interval = Duration::from_millis(1);
        config.retry.max_interval = Duration::from_millis(1);
        let orchestrator = VaultOrchestrator::new(ledger.clone(), clock.clone(), config).unwrap();

        let authority = Pubkey::new_unique();
        let funder = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        ledger.airdrop(&authority, 20 * SOL).unwrap();
        ledger.airdrop(&funder, 2 * SOL).unwrap();
        orchestrator.initialize(&authority).unwrap();
        orchestrator.fund_contract_treasury(&funder, SOL).unwrap();

        let addresses = orchestrator.addresses(&authority).unwrap();
        let minimum = ledger.rent().minimum_balance(0);
        let mut paid_out = 0u64;

        for op in ops {
            let before = orchestrator.fetch(&authority).unwrap().unwrap();
            let pool_before = orchestrator.contract_treasury_balance().unwrap();

            let outcome = match op {
                Op::Deposit(amount) => orchestrator.deposit(&authority, amount).map(|_| ()),
                Op::Transfer(amount) => orchestrator
                    .transfer(&authority, amount, &destination)
                    .map(|_| paid_out += amount),
                Op::Claim => orchestrator.claim_interest(&authority).map(|_| ()),
                Op::Wait(seconds) => {
                    clock.advance(seconds);
                    Ok(())
                }
            };

            let after = orchestrator.fetch(&authority).unwrap().unwrap();
            let treasury = ledger.read_balance(&addresses.treasury).unwrap();
            prop_assert_eq!(treasury, after.total_deposited);
            for lamports in [treasury, ledger.read_balance(&destination).unwrap()] {
                prop_assert!(lamports == 0 || lamports >= minimum);
            }
            prop_assert!(after.last_interest_claim_time >= before.last_interest_claim_time);

            if outcome.is_err() {
                prop_assert_eq!(&after, &before);
                prop_assert_eq!(orchestrator.contract_treasury_balance().unwrap(), pool_before);
            }
        }

        prop_assert_eq!(ledger.read_balance(&destination).unwrap(), paid_out);
    }
}
