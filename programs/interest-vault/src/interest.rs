//! Interest accrual engine
//!
//! Simple interest at a fixed 5% nominal annual rate, accrued per second and
//! computed with integer arithmetic that truncates toward zero. The ledger's
//! result is authoritative; `quote` is advisory.

use crate::{error::VaultError, state::VaultRecord};

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Annual rate in basis points (500 = 5%)
pub const ANNUAL_RATE_BPS: u64 = 500;
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A claim needs at least one whole second since the last checkpoint.
pub const MIN_CLAIM_INTERVAL: i64 = 1;

/// Interest owed on `principal` lamports held for `elapsed` seconds.
///
/// principal × elapsed × rate_bps / (10_000 × seconds_per_year), truncated.
pub fn interest_for(principal: u64, elapsed: u64) -> Result<u64, VaultError> {
    let numerator = (principal as u128)
        .checked_mul(elapsed as u128)
        .and_then(|v| v.checked_mul(ANNUAL_RATE_BPS as u128))
        .ok_or(VaultError::ArithmeticOverflow)?;
    let denominator = BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128;

    u64::try_from(numerator / denominator).map_err(|_| VaultError::ArithmeticOverflow)
}

/// Advisory view of what a claim at `now` would pay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestQuote {
    pub elapsed: i64,
    pub new_interest: u64,
    pub total_owed: u64,
}

/// Estimate interest without applying any claim guard.
pub fn quote(record: &VaultRecord, now: i64) -> Result<InterestQuote, VaultError> {
    let elapsed = now.saturating_sub(record.last_interest_claim_time).max(0);
    let new_interest = interest_for(record.total_deposited, elapsed as u64)?;
    let total_owed = record
        .accrued_interest
        .checked_add(new_interest)
        .ok_or(VaultError::ArithmeticOverflow)?;

    Ok(InterestQuote {
        elapsed,
        new_interest,
        total_owed,
    })
}

/// A claim that passed every guard and can be applied as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestClaim {
    pub claimed_at: i64,
    pub new_interest: u64,
    pub total_owed: u64,
}

/// Evaluate a claim at `now` against the contract treasury's balance.
///
/// Guards run in order: minimum interval, non-zero amount, treasury coverage.
/// Nothing is mutated; apply the result with `VaultRecord::apply_claim`.
pub fn evaluate_claim(
    record: &VaultRecord,
    now: i64,
    contract_treasury_balance: u64,
) -> Result<InterestClaim, VaultError> {
    let elapsed = now.saturating_sub(record.last_interest_claim_time);
    if elapsed < MIN_CLAIM_INTERVAL {
        return Err(VaultError::TooEarlyToClaim);
    }

    let new_interest = interest_for(record.total_deposited, elapsed as u64)?;
    let total_owed = record
        .accrued_interest
        .checked_add(new_interest)
        .ok_or(VaultError::ArithmeticOverflow)?;

    if total_owed == 0 {
        return Err(VaultError::NoInterestToClaimYet);
    }

    if contract_treasury_balance < total_owed {
        return Err(VaultError::InsufficientFundsInContractTreasury);
    }

    Ok(InterestClaim {
        claimed_at: now,
        new_interest,
        total_owed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::pubkey::Pubkey;

    use crate::state::VaultBumps;

    fn record_with(total_deposited: u64, since: i64) -> VaultRecord {
        let mut record = VaultRecord::new(Pubkey::new_unique(), VaultBumps::default(), since);
        record.total_deposited = total_deposited;
        record
    }

    #[test]
    fn test_one_year_at_five_percent() {
        assert_eq!(interest_for(100_000_000, SECONDS_PER_YEAR).unwrap(), 5_000_000);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // 1 SOL for one second is ~1.585 lamports
        assert_eq!(interest_for(1_000_000_000, 1).unwrap(), 1);
        assert_eq!(interest_for(100, 1).unwrap(), 0);
        assert_eq!(interest_for(0, SECONDS_PER_YEAR).unwrap(), 0);
    }

    #[test]
    fn test_large_principal_does_not_overflow_intermediate() {
        let interest = interest_for(u64::MAX / 2, SECONDS_PER_YEAR).unwrap();
        assert_eq!(interest, (u64::MAX / 2) / 20);
    }

    #[test]
    fn test_claim_too_early() {
        let record = record_with(1_000_000_000, 100);
        assert_eq!(
            evaluate_claim(&record, 100, u64::MAX),
            Err(VaultError::TooEarlyToClaim)
        );
        // A clock behind the checkpoint is treated the same way
        assert_eq!(
            evaluate_claim(&record, 50, u64::MAX),
            Err(VaultError::TooEarlyToClaim)
        );
    }

    #[test]
    fn test_claim_with_nothing_owed() {
        let record = record_with(100, 0);
        assert_eq!(
            evaluate_claim(&record, 10, u64::MAX),
            Err(VaultError::NoInterestToClaimYet)
        );
    }

    #[test]
    fn test_claim_includes_accrued_interest() {
        let mut record = record_with(100, 0);
        record.accrued_interest = 42;

        let claim = evaluate_claim(&record, 10, 1_000).unwrap();
        assert_eq!(claim.new_interest, 0);
        assert_eq!(claim.total_owed, 42);
    }

    #[test]
    fn test_claim_requires_contract_treasury_coverage() {
        let record = record_with(100_000_000, 0);
        assert_eq!(
            evaluate_claim(&record, SECONDS_PER_YEAR as i64, 0),
            Err(VaultError::InsufficientFundsInContractTreasury)
        );
        assert_eq!(
            evaluate_claim(&record, SECONDS_PER_YEAR as i64, 4_999_999),
            Err(VaultError::InsufficientFundsInContractTreasury)
        );

        let claim = evaluate_claim(&record, SECONDS_PER_YEAR as i64, 5_000_000).unwrap();
        assert_eq!(claim.total_owed, 5_000_000);
        assert_eq!(claim.claimed_at, SECONDS_PER_YEAR as i64);
    }

    #[test]
    fn test_quote_has_no_guards() {
        let record = record_with(100_000_000, 1_000);
        let same_second = quote(&record, 1_000).unwrap();
        assert_eq!(same_second.total_owed, 0);

        let backwards = quote(&record, 0).unwrap();
        assert_eq!(backwards.elapsed, 0);

        let later = quote(&record, 1_000 + SECONDS_PER_YEAR as i64).unwrap();
        assert_eq!(later.new_interest, 5_000_000);
    }
}
