use crate::domain::{
    Caller, DateRange, EntityType, Expense, ExpenseCategory, ExpenseId, NewExpense, ProfitLoss,
    Transaction, TransactionFilter, TransactionKind, TractorStatus, today,
};
use crate::storage::{self, Repository};

use super::{AppError, CategoryTotal, Dashboard, ExpenseSummary, RECENT_EXPENSES, ReconciliationReport};

/// Expense book and read-only rollups over the ledger.
#[derive(Clone)]
pub struct Accounting {
    repo: Repository,
}

impl Accounting {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ========================
    // Expenses
    // ========================

    /// Record an expense on behalf of the acting user.
    pub async fn create_expense(&self, expense: NewExpense, acting: &Caller) -> Result<Expense, AppError> {
        validate_expense(&expense)?;

        let mut record = Expense {
            id: 0,
            category: expense.category,
            amount: expense.amount,
            description: expense.description.trim().to_string(),
            recipient: expense.recipient,
            date: expense.date.unwrap_or_else(today),
            created_by: acting.user_id,
            created_at: chrono::Utc::now(),
        };

        let mut conn = self.repo.acquire().await?;
        storage::expenses::insert(&mut conn, &mut record).await?;

        tracing::info!(
            expense_id = record.id,
            category = %record.category,
            amount = record.amount,
            created_by = %acting.username,
            "expense recorded"
        );
        Ok(record)
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        let mut conn = self.repo.acquire().await?;
        storage::expenses::get(&mut conn, id)
            .await?
            .ok_or(AppError::ExpenseNotFound(id))
    }

    pub async fn list_expenses(
        &self,
        category: Option<ExpenseCategory>,
        range: DateRange,
    ) -> Result<Vec<Expense>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::expenses::list(&mut conn, category, range).await?)
    }

    /// Replace an expense's fields. Without a date the original date is kept.
    pub async fn update_expense(&self, id: ExpenseId, changes: NewExpense) -> Result<Expense, AppError> {
        validate_expense(&changes)?;

        let mut conn = self.repo.acquire().await?;
        let existing = storage::expenses::get(&mut conn, id)
            .await?
            .ok_or(AppError::ExpenseNotFound(id))?;

        let expense = Expense {
            category: changes.category,
            amount: changes.amount,
            description: changes.description.trim().to_string(),
            recipient: changes.recipient,
            date: changes.date.unwrap_or(existing.date),
            ..existing
        };

        if !storage::expenses::update(&mut conn, &expense).await? {
            return Err(AppError::ExpenseNotFound(id));
        }

        tracing::info!(expense_id = id, amount = expense.amount, "expense updated");
        Ok(expense)
    }

    pub async fn delete_expense(&self, id: ExpenseId) -> Result<(), AppError> {
        let mut conn = self.repo.acquire().await?;
        if !storage::expenses::delete(&mut conn, id).await? {
            return Err(AppError::ExpenseNotFound(id));
        }
        tracing::info!(expense_id = id, "expense deleted");
        Ok(())
    }

    // ========================
    // Reports
    // ========================

    /// Total per category over the inclusive range. Every category is present.
    pub async fn expense_summary(&self, range: DateRange) -> Result<ExpenseSummary, AppError> {
        let mut conn = self.repo.acquire().await?;

        let mut categories = Vec::with_capacity(ExpenseCategory::ALL.len());
        for category in ExpenseCategory::ALL {
            let total = storage::expenses::total(&mut conn, Some(category), range).await?;
            categories.push(CategoryTotal { category, total });
        }

        Ok(ExpenseSummary::new(range, categories))
    }

    pub async fn profit_loss(&self, range: DateRange) -> Result<ProfitLoss, AppError> {
        let summary = self.expense_summary(range).await?;

        let mut conn = self.repo.acquire().await?;
        let sales = storage::ledger::total_by_kind(&mut conn, TransactionKind::Sale, range).await?;
        let purchases = storage::ledger::total_by_kind(&mut conn, TransactionKind::Purchase, range).await?;

        Ok(ProfitLoss::from_totals(sales, purchases, summary.total))
    }

    /// Ledger entries matching the filter, newest first.
    pub async fn transactions(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, AppError> {
        let mut conn = self.repo.acquire().await?;
        let entries = storage::ledger::list(&mut conn, filter.kind, filter.range).await?;

        Ok(entries
            .into_iter()
            .filter(|entry| filter.matches_entity(entry))
            .collect())
    }

    /// Ledger entries booked against one tractor, part or service job, oldest first.
    pub async fn entity_history(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::ledger::list_for_entity(&mut conn, entity_type, entity_id).await?)
    }

    pub async fn dashboard(&self) -> Result<Dashboard, AppError> {
        let mut conn = self.repo.acquire().await?;
        let all = DateRange::all();

        Ok(Dashboard {
            tractors_in_stock: storage::tractors::count_by_status(&mut conn, TractorStatus::InStock).await?,
            low_stock_parts: storage::parts::count_low_stock(&mut conn).await?,
            recent_expenses: storage::expenses::list_recent(&mut conn, RECENT_EXPENSES).await?,
            total_sales: storage::ledger::total_by_kind(&mut conn, TransactionKind::Sale, all).await?,
            total_expenses: storage::expenses::total(&mut conn, None, all).await?,
        })
    }

    /// Compare the ledger with inventory and service records.
    pub async fn reconcile(&self) -> Result<ReconciliationReport, AppError> {
        let mut conn = self.repo.acquire().await?;
        let stats = storage::ledger::integrity_stats(&mut conn).await?;
        let report = ReconciliationReport::from_stats(stats);

        if !report.is_clean() {
            tracing::warn!(issues = report.issues.len(), "ledger reconciliation found problems");
        }
        Ok(report)
    }
}

fn validate_expense(expense: &NewExpense) -> Result<(), AppError> {
    if expense.amount <= 0 {
        return Err(AppError::validation("Expense amount must be positive"));
    }
    Ok(())
}
