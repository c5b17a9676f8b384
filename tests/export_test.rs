mod common;

use anyhow::Result;
use common::{admin, part, test_dealership, tractor};
use dealerbook::application::SaleRequest;
use dealerbook::domain::{EntityType, ExpenseCategory, NewExpense, TransactionFilter};
use dealerbook::io::Exporter;

#[tokio::test]
async fn test_export_ledger_csv() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let kubota = dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .tractors
        .sell(kubota.id, SaleRequest::new(1_500_000, "Farmer Joe"))
        .await?;
    let filter = dealership
        .parts
        .intake(part("Oil filter", "OF-100", 1_500, 10, 2))
        .await?;
    dealership.parts.sell(filter.id, 1, "Farmer Joe").await?;

    let exporter = Exporter::new(&dealership);

    let mut out = Vec::new();
    let rows = exporter
        .export_ledger_csv(TransactionFilter::default(), &mut out)
        .await?;
    assert_eq!(rows, 3);

    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "id,date,type,entity_type,entity_id,amount,party,description"
    );
    assert!(text.contains("purchase,tractor"));
    assert!(text.contains("15000.00,Farmer Joe,Kubota M7060 sale"));

    let mut tractors_only = Vec::new();
    let rows = exporter
        .export_ledger_csv(
            TransactionFilter {
                entity_type: Some(EntityType::Tractor),
                ..Default::default()
            },
            &mut tractors_only,
        )
        .await?;
    assert_eq!(rows, 2);

    Ok(())
}

#[tokio::test]
async fn test_export_full_json() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = admin(&dealership).await?;
    dealership
        .tractors
        .intake(tractor("Kubota", "M7060", "CH-001", 10_000))
        .await?;
    dealership
        .accounting
        .create_expense(NewExpense::new(ExpenseCategory::Rent, 100_000, "Yard rent"), &caller)
        .await?;

    let mut out = Vec::new();
    let snapshot = Exporter::new(&dealership).export_full_json(&mut out).await?;
    assert_eq!(snapshot.tractors.len(), 1);
    assert_eq!(snapshot.expenses.len(), 1);
    assert_eq!(snapshot.transactions.len(), 1);

    let value: serde_json::Value = serde_json::from_slice(&out)?;
    assert_eq!(value["tractors"][0]["chassis_number"], "CH-001");
    assert_eq!(value["expenses"][0]["category"], "rent");
    assert!(value["spare_parts"].as_array().is_some_and(|a| a.is_empty()));

    Ok(())
}
