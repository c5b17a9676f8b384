use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type PartId = i64;

/// Descriptive fields of a spare part. Stock is deliberately absent from
/// updates; it only moves through stock adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDetails {
    pub name: String,
    pub part_number: String,
    pub category: Option<String>,
    pub unit_price: Cents,
    pub min_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSparePart {
    pub details: PartDetails,
    pub stock_quantity: i64,
}

impl NewSparePart {
    pub fn new(name: impl Into<String>, part_number: impl Into<String>, unit_price: Cents) -> Self {
        Self {
            details: PartDetails {
                name: name.into(),
                part_number: part_number.into(),
                category: None,
                unit_price,
                min_stock: 5,
            },
            stock_quantity: 0,
        }
    }

    pub fn with_stock(mut self, quantity: i64) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_min_stock(mut self, min_stock: i64) -> Self {
        self.details.min_stock = min_stock;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.details.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparePart {
    pub id: PartId,
    pub name: String,
    pub part_number: String,
    pub category: Option<String>,
    pub stock_quantity: i64,
    pub unit_price: Cents,
    pub min_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SparePart {
    /// At or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock
    }
}
