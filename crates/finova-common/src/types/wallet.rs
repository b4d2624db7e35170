//! FIN holdings - mined balance and staked balance
//!
//! Key characteristics:
//! - Mined FIN is credited to the available balance when a session closes
//! - Staking moves FIN from available to staked
//! - Early unstaking forfeits a penalty from the staked balance
//! - Version field for optimistic concurrency

use crate::error::{FinovaError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Convert accrual math output into a FIN amount (8 decimal places)
///
/// Non-finite or negative input yields zero.
pub fn fin_amount(value: f64) -> Decimal {
    if !value.is_finite() || value <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(crate::FIN_SCALE))
        .unwrap_or(Decimal::ZERO)
}

/// FIN amount as f64 for rate math
pub fn fin_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// FIN balance owned by a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinWallet {
    /// Liquid balance
    pub available: Decimal,

    /// Balance locked in the staking position
    pub staked: Decimal,

    /// Version for optimistic concurrency control
    pub version: u64,
}

impl FinWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wallet with an initial liquid balance
    pub fn with_balance(initial_balance: Decimal) -> Self {
        Self {
            available: initial_balance,
            ..Self::default()
        }
    }

    /// Total holdings (available + staked), the input to the regression factor
    #[inline]
    pub fn total(&self) -> Decimal {
        self.available + self.staked
    }

    /// Credit mined FIN
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(FinovaError::InvalidInput("credit amount must not be negative".into()));
        }
        self.available += amount;
        self.version += 1;
        Ok(())
    }

    /// Move FIN from available to staked
    pub fn lock(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(FinovaError::InvalidInput("stake amount must be positive".into()));
        }
        if self.available < amount {
            return Err(FinovaError::InsufficientBalance {
                required: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.staked += amount;
        self.version += 1;
        Ok(())
    }

    /// Release staked FIN back to available, forfeiting `penalty`
    ///
    /// Returns the amount actually released.
    pub fn release(&mut self, amount: Decimal, penalty: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO || penalty < Decimal::ZERO || penalty > amount {
            return Err(FinovaError::InvalidInput("invalid release amount".into()));
        }
        if self.staked < amount {
            return Err(FinovaError::InsufficientBalance {
                required: amount,
                available: self.staked,
            });
        }
        let released = amount - penalty;
        self.staked -= amount;
        self.available += released;
        self.version += 1;
        Ok(released)
    }
}

impl std::fmt::Display for FinWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FinWallet(available={}, staked={})", self.available, self.staked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_and_total() {
        let mut wallet = FinWallet::new();
        wallet.credit(dec!(100)).unwrap();
        assert_eq!(wallet.available, dec!(100));
        assert_eq!(wallet.total(), dec!(100));
        assert!(wallet.credit(dec!(-1)).is_err());
    }

    #[test]
    fn test_lock_insufficient() {
        let mut wallet = FinWallet::with_balance(dec!(50));
        let result = wallet.lock(dec!(100));
        assert!(matches!(result, Err(FinovaError::InsufficientBalance { .. })));
        assert_eq!(wallet.available, dec!(50));
    }

    #[test]
    fn test_lock_release_with_penalty() {
        let mut wallet = FinWallet::with_balance(dec!(500));
        wallet.lock(dec!(200)).unwrap();
        assert_eq!(wallet.available, dec!(300));
        assert_eq!(wallet.staked, dec!(200));
        assert_eq!(wallet.total(), dec!(500));

        let released = wallet.release(dec!(200), dec!(10)).unwrap();
        assert_eq!(released, dec!(190));
        assert_eq!(wallet.available, dec!(490));
        assert_eq!(wallet.staked, dec!(0));
    }

    #[test]
    fn test_fin_amount_rounding() {
        assert_eq!(fin_amount(324.0), dec!(324));
        assert_eq!(fin_amount(0.123456789), dec!(0.12345679));
        assert_eq!(fin_amount(f64::NAN), Decimal::ZERO);
        assert_eq!(fin_amount(-1.0), Decimal::ZERO);
        assert!((fin_to_f64(dec!(1.5)) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_version_increment() {
        let mut wallet = FinWallet::new();
        wallet.credit(dec!(10)).unwrap();
        wallet.lock(dec!(5)).unwrap();
        assert_eq!(wallet.version, 2);
    }
}
