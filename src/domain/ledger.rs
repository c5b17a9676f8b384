use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Cents, DateRange};

pub type TransactionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in from a customer
    Sale,
    /// Money going out to a supplier, or value given for a trade-in
    Purchase,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Purchase => "purchase",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sale" => Some(TransactionKind::Sale),
            "purchase" => Some(TransactionKind::Purchase),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Tractor,
    Part,
    Service,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Tractor => "tractor",
            EntityType::Part => "part",
            EntityType::Service => "service",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tractor" => Some(EntityType::Tractor),
            "part" => Some(EntityType::Part),
            "service" => Some(EntityType::Service),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry waiting to be appended. Entries are never edited once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub amount: Cents,
    pub party_name: String,
    pub date: NaiveDate,
    pub description: String,
}

impl NewTransaction {
    pub fn sale(entity_type: EntityType, entity_id: i64, amount: Cents, date: NaiveDate) -> Self {
        Self::new(TransactionKind::Sale, entity_type, entity_id, amount, date)
    }

    pub fn purchase(entity_type: EntityType, entity_id: i64, amount: Cents, date: NaiveDate) -> Self {
        Self::new(TransactionKind::Purchase, entity_type, entity_id, amount, date)
    }

    fn new(
        kind: TransactionKind,
        entity_type: EntityType,
        entity_id: i64,
        amount: Cents,
        date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            entity_type,
            entity_id,
            amount,
            party_name: String::new(),
            date,
            description: String::new(),
        }
    }

    pub fn with_party(mut self, party_name: impl Into<String>) -> Self {
        self.party_name = party_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub amount: Cents,
    pub party_name: String,
    pub date: NaiveDate,
    pub description: String,
}

/// Query over the ledger. `kind` and `range` are applied by storage,
/// `entity_type` afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub entity_type: Option<EntityType>,
    pub range: DateRange,
}

impl TransactionFilter {
    pub fn matches_entity(&self, transaction: &Transaction) -> bool {
        self.entity_type
            .is_none_or(|entity_type| transaction.entity_type == entity_type)
    }
}

/// Sum of amounts of one kind inside a range.
pub fn total_by_kind(transactions: &[Transaction], kind: TransactionKind, range: DateRange) -> Cents {
    transactions
        .iter()
        .filter(|t| t.kind == kind && range.contains(t.date))
        .map(|t| t.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_date;

    fn entry(id: i64, kind: TransactionKind, entity_type: EntityType, amount: Cents, date: &str) -> Transaction {
        Transaction {
            id,
            kind,
            entity_type,
            entity_id: id,
            amount,
            party_name: "Someone".into(),
            date: parse_date(date).unwrap(),
            description: String::new(),
        }
    }

    #[test]
    fn test_builder_sets_kind_and_party() {
        let date = parse_date("2024-05-01").unwrap();
        let tx = NewTransaction::sale(EntityType::Part, 4, 3000, date)
            .with_party("Farmer Joe")
            .with_description("Oil filter x2");
        assert_eq!(tx.kind, TransactionKind::Sale);
        assert_eq!(tx.party_name, "Farmer Joe");
        assert_eq!(tx.description, "Oil filter x2");
    }

    #[test]
    fn test_total_by_kind_respects_range() {
        let ledger = vec![
            entry(1, TransactionKind::Purchase, EntityType::Tractor, 10_000, "2024-01-10"),
            entry(2, TransactionKind::Sale, EntityType::Tractor, 15_000, "2024-02-10"),
            entry(3, TransactionKind::Sale, EntityType::Part, 500, "2024-03-10"),
        ];
        let feb_onwards = DateRange::new(parse_date("2024-02-01"), None);

        assert_eq!(total_by_kind(&ledger, TransactionKind::Sale, DateRange::all()), 15_500);
        assert_eq!(total_by_kind(&ledger, TransactionKind::Purchase, feb_onwards), 0);
        assert_eq!(total_by_kind(&ledger, TransactionKind::Sale, feb_onwards), 15_500);
    }

    #[test]
    fn test_filter_matches_entity() {
        let filter = TransactionFilter {
            entity_type: Some(EntityType::Service),
            ..Default::default()
        };
        let service = entry(1, TransactionKind::Sale, EntityType::Service, 100, "2024-01-01");
        let part = entry(2, TransactionKind::Sale, EntityType::Part, 100, "2024-01-01");
        assert!(filter.matches_entity(&service));
        assert!(!filter.matches_entity(&part));
    }
}
