use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

pub type ExpenseId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Salary,
    Rent,
    Bill,
    Misc,
}

impl ExpenseCategory {
    /// Every category, in report order.
    pub const ALL: [ExpenseCategory; 4] = [
        ExpenseCategory::Salary,
        ExpenseCategory::Rent,
        ExpenseCategory::Bill,
        ExpenseCategory::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Salary => "salary",
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Bill => "bill",
            ExpenseCategory::Misc => "misc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "salary" => Some(ExpenseCategory::Salary),
            "rent" => Some(ExpenseCategory::Rent),
            "bill" => Some(ExpenseCategory::Bill),
            "misc" => Some(ExpenseCategory::Misc),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub amount: Cents,
    pub description: String,
    /// Payee, mostly used for salaries.
    pub recipient: Option<String>,
    pub date: Option<NaiveDate>,
}

impl NewExpense {
    pub fn new(category: ExpenseCategory, amount: Cents, description: impl Into<String>) -> Self {
        Self {
            category,
            amount,
            description: description.into(),
            recipient: None,
            date: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub category: ExpenseCategory,
    pub amount: Cents,
    pub description: String,
    pub recipient: Option<String>,
    pub date: NaiveDate,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
