use serde::Serialize;
use sqlx::SqliteConnection;

use crate::domain::{
    EntityType, NewSparePart, NewTransaction, PartDetails, PartId, PartUsage, SparePart,
    Transaction, line_total, today,
};
use crate::storage::{self, Repository, is_unique_violation};

use super::AppError;

/// Spare-part stock. Every stock movement goes through the guarded
/// adjustment in `storage::parts::try_adjust`.
#[derive(Clone)]
pub struct PartsStock {
    repo: Repository,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartSale {
    pub part: SparePart,
    pub quantity: i64,
    pub transaction: Transaction,
}

impl PartsStock {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn intake(&self, part: NewSparePart) -> Result<SparePart, AppError> {
        validate_details(&part.details)?;
        if part.stock_quantity < 0 {
            return Err(AppError::validation("Stock quantity cannot be negative"));
        }

        let mut conn = self.repo.acquire().await?;
        let saved = match storage::parts::insert(&mut conn, &part).await {
            Ok(saved) => saved,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::PartNumberExists(part.details.part_number));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(part_id = saved.id, part_number = %saved.part_number, stock = saved.stock_quantity, "spare part added");
        Ok(saved)
    }

    pub async fn get(&self, id: PartId) -> Result<SparePart, AppError> {
        let mut conn = self.repo.acquire().await?;
        storage::parts::get(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::PartNotFound(format!("#{id}")))
    }

    pub async fn list(&self) -> Result<Vec<SparePart>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::parts::list(&mut conn).await?)
    }

    /// Parts at or below their minimum stock, emptiest first.
    pub async fn low_stock(&self) -> Result<Vec<SparePart>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::parts::list_low_stock(&mut conn).await?)
    }

    /// Replace name, number, category, price and threshold. Stock is untouched.
    pub async fn update(&self, id: PartId, details: PartDetails) -> Result<SparePart, AppError> {
        validate_details(&details)?;

        let mut conn = self.repo.acquire().await?;
        let updated = match storage::parts::update_details(&mut conn, id, &details).await {
            Ok(updated) => updated,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::PartNumberExists(details.part_number));
            }
            Err(err) => return Err(err.into()),
        };

        updated.ok_or_else(|| AppError::PartNotFound(format!("#{id}")))
    }

    pub async fn delete(&self, id: PartId) -> Result<(), AppError> {
        let mut conn = self.repo.acquire().await?;
        if !storage::parts::delete(&mut conn, id).await? {
            return Err(AppError::PartNotFound(format!("#{id}")));
        }
        tracing::info!(part_id = id, "spare part deleted");
        Ok(())
    }

    /// Add `delta` (negative to remove) to the stock of a part.
    pub async fn adjust_stock(&self, id: PartId, delta: i64) -> Result<SparePart, AppError> {
        let mut tx = self.repo.begin().await?;
        let part = adjust_in(&mut tx, id, delta, None).await?;
        storage::commit(tx, "stock adjustment").await?;

        tracing::info!(part_id = id, delta, stock = part.stock_quantity, "stock adjusted");
        Ok(part)
    }

    /// Sell parts over the counter and book the sale.
    pub async fn sell(
        &self,
        id: PartId,
        quantity: i64,
        customer_name: &str,
    ) -> Result<PartSale, AppError> {
        if quantity <= 0 {
            return Err(AppError::validation("Quantity must be positive"));
        }
        let customer = customer_name.trim();
        if customer.is_empty() {
            return Err(AppError::validation("Customer name is required"));
        }

        let date = today();
        let mut tx = self.repo.begin().await?;

        let part = adjust_in(&mut tx, id, -quantity, None).await?;
        let amount = line_total(part.unit_price, quantity)
            .ok_or_else(|| AppError::validation("Sale amount is too large"))?;

        let entry = NewTransaction::sale(EntityType::Part, part.id, amount, date)
            .with_party(customer)
            .with_description(format!("{} x{}", part.name, quantity));
        let transaction = storage::ledger::append(&mut tx, &entry).await?;

        storage::commit(tx, "part sale").await?;

        tracing::info!(part_id = id, quantity, amount, stock = part.stock_quantity, "spare part sold");
        Ok(PartSale {
            part,
            quantity,
            transaction,
        })
    }

    /// Take the parts of one service usage out of stock inside the caller's
    /// unit of work. Errors name the part as the caller wrote it.
    pub(crate) async fn consume(
        &self,
        conn: &mut SqliteConnection,
        usage: &PartUsage,
    ) -> Result<SparePart, AppError> {
        if usage.quantity <= 0 {
            return Err(AppError::validation(format!(
                "Quantity for {} must be positive",
                usage.display_name()
            )));
        }
        adjust_in(conn, usage.part_id, -usage.quantity, Some(usage)).await
    }
}

/// The single path for stock changes. On refusal, re-reads the part to tell a
/// missing part from a short one or an out-of-range change.
async fn adjust_in(
    conn: &mut SqliteConnection,
    id: PartId,
    delta: i64,
    usage: Option<&PartUsage>,
) -> Result<SparePart, AppError> {
    if let Some(part) = storage::parts::try_adjust(conn, id, delta).await? {
        return Ok(part);
    }

    let err = match storage::parts::get(conn, id).await? {
        None => AppError::PartNotFound(usage.map_or_else(|| format!("#{id}"), |u| u.display_name())),
        Some(part) => match delta.checked_neg() {
            Some(requested) if delta < 0 => AppError::InsufficientStock {
                part_name: part.name,
                available: part.stock_quantity,
                requested,
            },
            _ => AppError::validation(format!(
                "Stock change of {delta} is out of range for {}",
                part.name
            )),
        },
    };
    tracing::warn!(part_id = id, delta, error = %err, "stock change rejected");
    Err(err)
}

fn validate_details(details: &PartDetails) -> Result<(), AppError> {
    if details.name.trim().is_empty() || details.part_number.trim().is_empty() {
        return Err(AppError::validation("Part name and part number are required"));
    }
    if details.unit_price < 0 {
        return Err(AppError::validation("Unit price cannot be negative"));
    }
    if details.min_stock < 0 {
        return Err(AppError::validation("Minimum stock cannot be negative"));
    }
    Ok(())
}
