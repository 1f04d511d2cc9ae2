//! Lamport movement rules
//!
//! The runtime refuses to leave a system account holding a balance between
//! zero and its rent-exempt minimum. Every debit and credit is checked here
//! first so the caller sees a vault error instead of a transaction-level
//! rent failure.

use solana_program::rent::Rent;

use crate::error::VaultError;

/// Empty, or rent exempt for `data_len` bytes
pub fn is_rent_settled(rent: &Rent, lamports: u64, data_len: usize) -> bool {
    lamports == 0 || rent.is_exempt(lamports, data_len)
}

/// Balance left after taking `amount`, failing with `error` when the account
/// cannot cover it or would be left below the rent-exempt minimum.
pub fn check_debit(
    rent: &Rent,
    balance: u64,
    amount: u64,
    data_len: usize,
    error: VaultError,
) -> Result<u64, VaultError> {
    let remaining = balance.checked_sub(amount).ok_or(error)?;
    if !is_rent_settled(rent, remaining, data_len) {
        return Err(error);
    }
    Ok(remaining)
}

/// Balance after receiving `amount`. An empty account must receive at least
/// its rent-exempt minimum.
pub fn check_credit(
    rent: &Rent,
    balance: u64,
    amount: u64,
    data_len: usize,
    error: VaultError,
) -> Result<u64, VaultError> {
    let total = balance
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow)?;
    if !is_rent_settled(rent, total, data_len) {
        return Err(error);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_settled_balances() {
        let rent = Rent::default();
        let minimum = rent.minimum_balance(0);

        assert!(is_rent_settled(&rent, 0, 0));
        assert!(is_rent_settled(&rent, minimum, 0));
        assert!(!is_rent_settled(&rent, minimum - 1, 0));
        assert!(!is_rent_settled(&rent, 1, 0));
    }

    #[test]
    fn test_debit_may_empty_but_not_strand_dust() {
        let rent = Rent::default();
        let minimum = rent.minimum_balance(0);
        let error = VaultError::InsufficientFundsInTreasury;

        assert_eq!(check_debit(&rent, 5 * minimum, 5 * minimum, 0, error), Ok(0));
        assert_eq!(check_debit(&rent, 5 * minimum, 4 * minimum, 0, error), Ok(minimum));
        assert_eq!(check_debit(&rent, 5 * minimum, 5 * minimum - 1, 0, error), Err(error));
        assert_eq!(check_debit(&rent, minimum, minimum + 1, 0, error), Err(error));
    }

    #[test]
    fn test_credit_into_empty_account() {
        let rent = Rent::default();
        let minimum = rent.minimum_balance(0);
        let error = VaultError::InvalidAmount;

        assert_eq!(check_credit(&rent, 0, minimum, 0, error), Ok(minimum));
        assert_eq!(check_credit(&rent, 0, minimum - 1, 0, error), Err(error));
        assert_eq!(check_credit(&rent, minimum, 1, 0, error), Ok(minimum + 1));
        assert_eq!(
            check_credit(&rent, u64::MAX, 1, 0, error),
            Err(VaultError::ArithmeticOverflow)
        );
    }
}
