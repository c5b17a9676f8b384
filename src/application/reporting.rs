use serde::{Deserialize, Serialize};

use crate::domain::{Cents, DateRange, Expense, ExpenseCategory};
use crate::storage::IntegrityStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub total: Cents,
}

/// Expense totals for every category, zero where nothing was spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub range: DateRange,
    pub categories: Vec<CategoryTotal>,
    pub total: Cents,
}

impl ExpenseSummary {
    pub fn new(range: DateRange, categories: Vec<CategoryTotal>) -> Self {
        let total = categories.iter().map(|c| c.total).sum();
        Self {
            range,
            categories,
            total,
        }
    }

    pub fn total_for(&self, category: ExpenseCategory) -> Cents {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map_or(0, |c| c.total)
    }
}

/// Number of expenses shown on the dashboard.
pub const RECENT_EXPENSES: i64 = 5;

/// At-a-glance state of the dealership. Totals cover the whole ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub tractors_in_stock: i64,
    pub low_stock_parts: i64,
    pub recent_expenses: Vec<Expense>,
    pub total_sales: Cents,
    pub total_expenses: Cents,
}

/// Result of checking the ledger against inventory and service state.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub stats: IntegrityStats,
    pub issues: Vec<String>,
}

impl ReconciliationReport {
    pub fn from_stats(stats: IntegrityStats) -> Self {
        let checks = [
            (stats.tractors_without_purchase, "tractor(s) have no purchase entry"),
            (stats.sold_tractors_without_sale, "sold tractor(s) have no sale entry"),
            (stats.services_without_sale, "service job(s) have no sale entry"),
            (stats.negative_entries, "ledger entry(ies) have a negative amount"),
            (stats.dangling_exchange_links, "tractor(s) reference a missing trade-in"),
        ];

        let issues = checks
            .into_iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, what)| format!("{count} {what}"))
            .collect();

        Self { stats, issues }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let summary = ExpenseSummary::new(
            DateRange::all(),
            vec![
                CategoryTotal { category: ExpenseCategory::Salary, total: 300_000 },
                CategoryTotal { category: ExpenseCategory::Rent, total: 120_000 },
            ],
        );
        assert_eq!(summary.total, 420_000);
        assert_eq!(summary.total_for(ExpenseCategory::Rent), 120_000);
        assert_eq!(summary.total_for(ExpenseCategory::Misc), 0);
    }

    #[test]
    fn test_reconciliation_lists_each_problem() {
        let clean = ReconciliationReport::from_stats(IntegrityStats::default());
        assert!(clean.is_clean());

        let report = ReconciliationReport::from_stats(IntegrityStats {
            sold_tractors_without_sale: 2,
            dangling_exchange_links: 1,
            ..Default::default()
        });
        assert!(!report.is_clean());
        assert_eq!(
            report.issues,
            vec![
                "2 sold tractor(s) have no sale entry".to_string(),
                "1 tractor(s) reference a missing trade-in".to_string(),
            ]
        );
    }
}
