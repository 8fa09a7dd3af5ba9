//! Transaction records as held by the account store

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of ledger movement recorded for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Purchase,
    Payment,
    Refund,
    /// Any tag the pipeline does not recognize
    #[serde(other)]
    Other,
}

impl TransactionType {
    /// Parse a stored type tag. Unknown tags map to `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => TransactionType::Deposit,
            "WITHDRAWAL" => TransactionType::Withdrawal,
            "PURCHASE" => TransactionType::Purchase,
            "PAYMENT" => TransactionType::Payment,
            "REFUND" => TransactionType::Refund,
            _ => TransactionType::Other,
        }
    }

    /// Stored tag for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Refund => "REFUND",
            TransactionType::Other => "OTHER",
        }
    }

    /// Debits reduce the balance; everything else is treated as a credit.
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            TransactionType::Withdrawal | TransactionType::Purchase | TransactionType::Payment
        )
    }
}

/// A single account transaction, read-only to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// Owning account
    pub account_id: String,

    /// Signed transaction amount
    pub amount: Decimal,

    /// Ledger movement type
    pub transaction_type: TransactionType,

    /// Account balance after the transaction settled
    pub balance_after: Decimal,

    /// RFC 3339 UTC timestamp, as stored
    pub timestamp: String,
}

impl TransactionRecord {
    /// Create a transaction record
    pub fn new(
        transaction_id: impl Into<String>,
        account_id: impl Into<String>,
        amount: Decimal,
        transaction_type: TransactionType,
        balance_after: Decimal,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            account_id: account_id.into(),
            amount,
            transaction_type,
            balance_after,
            timestamp: timestamp.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!(TransactionType::parse("WITHDRAWAL"), TransactionType::Withdrawal);
        assert_eq!(TransactionType::parse("deposit"), TransactionType::Deposit);
        assert_eq!(TransactionType::parse("INTEREST"), TransactionType::Other);
        assert!(TransactionType::Purchase.is_debit());
        assert!(!TransactionType::Refund.is_debit());
        assert!(!TransactionType::Other.is_debit());
    }

    #[test]
    fn test_transaction_deserialization() {
        let json = r#"{
            "transaction_id": "txn-1",
            "account_id": "acct-1",
            "amount": "50.00",
            "transaction_type": "CASHBACK",
            "balance_after": "200.00",
            "timestamp": "2024-03-04T10:15:00Z"
        }"#;

        let tx: TransactionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(tx.transaction_type, TransactionType::Other);
        assert_eq!(tx.amount, Decimal::new(5000, 2));
        assert_eq!(tx.timestamp, "2024-03-04T10:15:00Z");
    }
}
