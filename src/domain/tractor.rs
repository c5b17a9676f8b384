use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Cents;

pub type TractorId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TractorType {
    New,
    Used,
}

impl TractorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TractorType::New => "new",
            TractorType::Used => "used",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(TractorType::New),
            "used" => Some(TractorType::Used),
            _ => None,
        }
    }
}

impl std::fmt::Display for TractorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TractorStatus {
    InStock,
    Sold,
}

impl TractorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TractorStatus::InStock => "in_stock",
            TractorStatus::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in_stock" => Some(TractorStatus::InStock),
            "sold" => Some(TractorStatus::Sold),
            _ => None,
        }
    }
}

impl std::fmt::Display for TractorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Intake payload for a tractor entering inventory, either bought from a
/// supplier or received as a trade-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTractor {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub tractor_type: TractorType,
    pub chassis_number: String,
    pub engine_number: String,
    pub purchase_price: Cents,
    /// Empty for trade-ins; the workflow fills in the customer.
    pub supplier_name: String,
    pub notes: Option<String>,
}

impl NewTractor {
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        chassis_number: impl Into<String>,
        purchase_price: Cents,
    ) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            year: 0,
            tractor_type: TractorType::New,
            chassis_number: chassis_number.into(),
            engine_number: String::new(),
            purchase_price,
            supplier_name: String::new(),
            notes: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn with_type(mut self, tractor_type: TractorType) -> Self {
        self.tractor_type = tractor_type;
        self
    }

    pub fn with_engine_number(mut self, engine_number: impl Into<String>) -> Self {
        self.engine_number = engine_number.into();
        self
    }

    pub fn with_supplier(mut self, supplier_name: impl Into<String>) -> Self {
        self.supplier_name = supplier_name.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// "<brand> <model>", the label used in ledger descriptions.
    pub fn label(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tractor {
    pub id: TractorId,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub tractor_type: TractorType,
    pub chassis_number: String,
    pub engine_number: String,
    pub purchase_price: Cents,
    pub sale_price: Option<Cents>,
    pub status: TractorStatus,
    pub supplier_name: String,
    pub purchase_date: NaiveDate,
    pub sale_date: Option<NaiveDate>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    /// The trade-in received when this tractor was sold. A reference, not ownership:
    /// the trade-in has its own lifecycle and may be sold on later.
    pub exchange_tractor_id: Option<TractorId>,
}

impl Tractor {
    pub fn label(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    pub fn is_sold(&self) -> bool {
        self.status == TractorStatus::Sold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_storage_names() {
        assert_eq!(TractorStatus::InStock.as_str(), "in_stock");
        assert_eq!(TractorStatus::from_str("SOLD"), Some(TractorStatus::Sold));
        assert_eq!(TractorStatus::from_str("reserved"), None);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!(TractorType::from_str("Used"), Some(TractorType::Used));
        assert_eq!(TractorType::from_str("vintage"), None);
    }

    #[test]
    fn test_builder_label() {
        let t = NewTractor::new("Kubota", "L3901", "CH-1", 1_000_000)
            .with_year(2021)
            .with_type(TractorType::Used)
            .with_supplier("Agro Supply");
        assert_eq!(t.label(), "Kubota L3901");
        assert_eq!(t.year, 2021);
        assert_eq!(t.supplier_name, "Agro Supply");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TractorStatus::InStock).unwrap();
        assert_eq!(json, "\"in_stock\"");
    }
}
