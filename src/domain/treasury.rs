use serde::{Deserialize, Serialize};

use super::Amount;

/// The ledger's view of the city treasury. The enclosing simulation owns the
/// real money; the ledger only reads income, checks the balance, and moves
/// funds for disbursements and payments.
pub trait Treasury {
    /// Current monthly income, or `None` when the treasury cannot report one
    /// (the ledger then falls back to the policy's configured income).
    fn monthly_income(&self) -> Option<Amount>;

    fn balance(&self) -> Amount;

    /// Add funds (loan disbursement).
    fn credit(&mut self, amount: Amount);

    /// Remove funds (loan payment). Callers check the balance first; the
    /// ledger never debits more than the balance covers.
    fn debit(&mut self, amount: Amount);
}

/// Plain in-process treasury, persisted alongside the ledger. Used by the
/// CLI as the concrete collaborator; tests substitute their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryState {
    pub balance: Amount,
    pub monthly_income: Amount,
}

impl Default for TreasuryState {
    fn default() -> Self {
        Self {
            balance: 0.0,
            monthly_income: 0.0,
        }
    }
}

impl Treasury for TreasuryState {
    fn monthly_income(&self) -> Option<Amount> {
        if self.monthly_income > 0.0 {
            Some(self.monthly_income)
        } else {
            None
        }
    }

    fn balance(&self) -> Amount {
        self.balance
    }

    fn credit(&mut self, amount: Amount) {
        self.balance += amount;
    }

    fn debit(&mut self, amount: Amount) {
        self.balance -= amount;
    }
}
