mod common;

use anyhow::Result;
use common::{admin, part, test_dealership, tractor};
use dealerbook::application::{AppError, SaleRequest};
use dealerbook::domain::{
    DateRange, EntityType, ExpenseCategory, NewExpense, ServiceDraft, TransactionFilter,
    TransactionKind, parse_date, today,
};

#[tokio::test]
async fn test_empty_summary_lists_every_category() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;

    let summary = dealership.accounting.expense_summary(DateRange::all()).await?;
    assert_eq!(summary.categories.len(), ExpenseCategory::ALL.len());
    assert!(summary.categories.iter().all(|c| c.total == 0));
    assert_eq!(summary.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_expense_summary_by_range() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = admin(&dealership).await?;

    for (category, amount, date) in [
        (ExpenseCategory::Salary, 300_000, "2024-01-31"),
        (ExpenseCategory::Rent, 120_000, "2024-01-01"),
        (ExpenseCategory::Bill, 8_000, "2024-01-15"),
        (ExpenseCategory::Rent, 120_000, "2024-02-01"),
    ] {
        dealership
            .accounting
            .create_expense(
                NewExpense::new(category, amount, "monthly").on(parse_date(date).unwrap()),
                &caller,
            )
            .await?;
    }

    let january = DateRange::new(parse_date("2024-01-01"), parse_date("2024-01-31"));
    let summary = dealership.accounting.expense_summary(january).await?;
    assert_eq!(summary.total_for(ExpenseCategory::Salary), 300_000);
    assert_eq!(summary.total_for(ExpenseCategory::Rent), 120_000);
    assert_eq!(summary.total_for(ExpenseCategory::Bill), 8_000);
    assert_eq!(summary.total_for(ExpenseCategory::Misc), 0);
    assert_eq!(summary.total, 428_000);

    let rent = dealership
        .accounting
        .list_expenses(Some(ExpenseCategory::Rent), DateRange::all())
        .await?;
    assert_eq!(rent.len(), 2);
    assert_eq!(rent[0].date, parse_date("2024-02-01").unwrap());
    assert!(rent.iter().all(|e| e.created_by == caller.user_id));

    Ok(())
}

#[tokio::test]
async fn test_expense_validation_and_crud() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = admin(&dealership).await?;

    let result = dealership
        .accounting
        .create_expense(NewExpense::new(ExpenseCategory::Misc, 0, "nothing"), &caller)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let expense = dealership
        .accounting
        .create_expense(
            NewExpense::new(ExpenseCategory::Bill, 12_500, "Electricity").with_recipient("Power Co"),
            &caller,
        )
        .await?;
    assert_eq!(expense.date, today());

    let updated = dealership
        .accounting
        .update_expense(
            expense.id,
            NewExpense::new(ExpenseCategory::Bill, 13_000, "Electricity, corrected"),
        )
        .await?;
    assert_eq!(updated.amount, 13_000);
    assert_eq!(updated.date, expense.date);
    assert_eq!(updated.created_by, caller.user_id);
    assert_eq!(dealership.accounting.get_expense(expense.id).await?.amount, 13_000);

    dealership.accounting.delete_expense(expense.id).await?;
    assert!(matches!(
        dealership.accounting.get_expense(expense.id).await,
        Err(AppError::ExpenseNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_profit_loss() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = admin(&dealership).await?;

    let kubota = dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .tractors
        .sell(kubota.id, SaleRequest::new(1_500_000, "Farmer Joe"))
        .await?;
    dealership
        .services
        .create(ServiceDraft::new("Farmer Joe", "Oil change", 20_000))
        .await?;
    dealership
        .accounting
        .create_expense(NewExpense::new(ExpenseCategory::Rent, 100_000, "Yard rent"), &caller)
        .await?;

    let report = dealership.accounting.profit_loss(DateRange::all()).await?;
    assert_eq!(report.total_sales, 1_520_000);
    assert_eq!(report.total_purchases, 1_000_000);
    assert_eq!(report.gross_profit, 520_000);
    assert_eq!(report.total_expenses, 100_000);
    assert_eq!(report.net_profit, 420_000);

    Ok(())
}

#[tokio::test]
async fn test_transactions_filtered_by_entity() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;

    dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    let filter = dealership
        .parts
        .intake(part("Oil filter", "OF-100", 1_500, 10, 2))
        .await?;
    dealership.parts.sell(filter.id, 2, "Farmer Joe").await?;
    dealership
        .services
        .create(ServiceDraft::new("Farmer Joe", "Oil change", 20_000))
        .await?;

    let all = dealership.accounting.transactions(TransactionFilter::default()).await?;
    assert_eq!(all.len(), 3);

    let parts_only = dealership
        .accounting
        .transactions(TransactionFilter {
            entity_type: Some(EntityType::Part),
            ..Default::default()
        })
        .await?;
    assert_eq!(parts_only.len(), 1);
    assert_eq!(parts_only[0].amount, 3_000);

    let sales = dealership
        .accounting
        .transactions(TransactionFilter {
            kind: Some(TransactionKind::Sale),
            ..Default::default()
        })
        .await?;
    assert_eq!(sales.len(), 2);

    let future = DateRange::new(parse_date("2999-01-01"), None);
    let none = dealership
        .accounting
        .transactions(TransactionFilter {
            range: future,
            ..Default::default()
        })
        .await?;
    assert!(none.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reconcile_clean_after_normal_trading() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;

    let kubota = dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .tractors
        .sell(
            kubota.id,
            SaleRequest::new(1_500_000, "Farmer Joe")
                .with_trade_in(common::trade_in("Ford", "3000", "CH-OLD", 4_000)),
        )
        .await?;
    dealership
        .services
        .create(ServiceDraft::new("Farmer Joe", "Oil change", 20_000).with_tractor(kubota.id))
        .await?;

    let report = dealership.accounting.reconcile().await?;
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.stats.tractors_without_purchase, 0);

    Ok(())
}

#[tokio::test]
async fn test_entity_history() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let kubota = dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .tractors
        .sell(kubota.id, SaleRequest::new(1_500_000, "Farmer Joe"))
        .await?;

    let history = dealership
        .accounting
        .entity_history(EntityType::Tractor, kubota.id)
        .await?;
    let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Purchase, TransactionKind::Sale]);

    assert!(dealership
        .accounting
        .entity_history(EntityType::Service, kubota.id)
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dashboard_rollup() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = admin(&dealership).await?;

    let empty = dealership.accounting.dashboard().await?;
    assert_eq!(empty.tractors_in_stock, 0);
    assert_eq!(empty.low_stock_parts, 0);
    assert!(empty.recent_expenses.is_empty());
    assert_eq!(empty.total_sales, 0);
    assert_eq!(empty.total_expenses, 0);

    let sold = dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .tractors
        .intake(tractor("John Deere", "5075E", "CH-002", 12_000))
        .await?;
    dealership
        .tractors
        .sell(sold.id, SaleRequest::new(1_500_000, "Farmer Joe"))
        .await?;

    let filter = dealership
        .parts
        .intake(part("Oil filter", "OF-100", 1_500, 3, 5))
        .await?;
    dealership
        .parts
        .intake(part("Air filter", "AF-200", 2_000, 20, 5))
        .await?;
    dealership.parts.sell(filter.id, 2, "Farmer Joe").await?;

    for day in 1..=7 {
        let date = parse_date(&format!("2024-03-0{day}")).unwrap();
        dealership
            .accounting
            .create_expense(
                NewExpense::new(ExpenseCategory::Bill, 1_000 * day, format!("Bill {day}")).on(date),
                &caller,
            )
            .await?;
    }

    let dashboard = dealership.accounting.dashboard().await?;
    assert_eq!(dashboard.tractors_in_stock, 1);
    assert_eq!(dashboard.low_stock_parts, 1);
    assert_eq!(dashboard.total_sales, 1_503_000);
    assert_eq!(dashboard.total_expenses, 28_000);

    let recent: Vec<&str> = dashboard
        .recent_expenses
        .iter()
        .map(|e| e.description.as_str())
        .collect();
    assert_eq!(recent, vec!["Bill 7", "Bill 6", "Bill 5", "Bill 4", "Bill 3"]);

    Ok(())
}
