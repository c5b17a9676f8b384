use serde::Serialize;

use crate::domain::{
    Cents, EntityType, NewTractor, NewTransaction, SaleProfit, Tractor, TractorId, TractorStatus,
    sale_profit, today,
};
use crate::storage::{self, Repository, is_unique_violation};

use super::AppError;

/// Tractor purchases, sales and trade-ins.
#[derive(Clone)]
pub struct TractorTrading {
    repo: Repository,
}

/// A sale request. `trade_in` is only taken when `is_exchange` is set.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub sale_price: Cents,
    pub customer_name: String,
    pub is_exchange: bool,
    pub trade_in: Option<NewTractor>,
}

impl SaleRequest {
    pub fn new(sale_price: Cents, customer_name: impl Into<String>) -> Self {
        Self {
            sale_price,
            customer_name: customer_name.into(),
            is_exchange: false,
            trade_in: None,
        }
    }

    pub fn with_trade_in(mut self, trade_in: NewTractor) -> Self {
        self.is_exchange = true;
        self.trade_in = Some(trade_in);
        self
    }

    fn takes_trade_in(&self) -> Option<&NewTractor> {
        if self.is_exchange {
            self.trade_in.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleOutcome {
    pub message: String,
    pub tractor: Tractor,
    pub profit: SaleProfit,
    /// Sale price minus purchase price, less the trade-in value on exchanges
    pub profit_loss: Cents,
    pub trade_in: Option<Tractor>,
}

impl SaleOutcome {
    pub fn trade_in_id(&self) -> Option<TractorId> {
        self.trade_in.as_ref().map(|t| t.id)
    }
}

impl TractorTrading {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Take a tractor into inventory and book its purchase.
    pub async fn intake(&self, tractor: NewTractor) -> Result<Tractor, AppError> {
        validate_new_tractor(&tractor)?;

        let date = today();
        let mut tx = self.repo.begin().await?;

        let saved = insert_tractor(&mut tx, &tractor, date).await?;
        let entry = NewTransaction::purchase(EntityType::Tractor, saved.id, saved.purchase_price, date)
            .with_party(&saved.supplier_name)
            .with_description(format!("{} purchase", saved.label()));
        storage::ledger::append(&mut tx, &entry).await?;

        storage::commit(tx, "tractor intake").await?;

        tracing::info!(
            tractor_id = saved.id,
            chassis = %saved.chassis_number,
            amount = saved.purchase_price,
            "tractor taken into stock"
        );
        Ok(saved)
    }

    /// Sell an in-stock tractor, optionally taking another one in exchange.
    ///
    /// Everything happens in one unit of work: if any step fails, the tractor
    /// stays in stock, no trade-in is created and no ledger entry is kept.
    pub async fn sell(&self, tractor_id: TractorId, request: SaleRequest) -> Result<SaleOutcome, AppError> {
        if request.sale_price <= 0 {
            return Err(AppError::validation("Sale price must be positive"));
        }
        let customer = request.customer_name.trim();
        if customer.is_empty() {
            return Err(AppError::validation("Customer name is required"));
        }
        if let Some(trade_in) = request.takes_trade_in() {
            validate_trade_in(trade_in)?;
        }

        let date = today();
        let mut tx = self.repo.begin().await?;

        let Some(sold) =
            storage::tractors::mark_sold(&mut tx, tractor_id, request.sale_price, customer, date).await?
        else {
            let err = match storage::tractors::get(&mut tx, tractor_id).await? {
                None => AppError::TractorNotFound(tractor_id),
                Some(existing) => AppError::AlreadySold {
                    tractor_id,
                    label: existing.label(),
                },
            };
            tracing::warn!(tractor_id, error = %err, "tractor sale rejected");
            return Err(err);
        };

        let sale = NewTransaction::sale(EntityType::Tractor, sold.id, request.sale_price, date)
            .with_party(customer)
            .with_description(format!("{} sale", sold.label()));
        storage::ledger::append(&mut tx, &sale).await?;

        let mut sold = sold;
        let trade_in = match request.takes_trade_in() {
            Some(payload) => {
                let mut payload = payload.clone();
                if payload.supplier_name.trim().is_empty() {
                    payload.supplier_name = customer.to_string();
                }

                let received = insert_tractor(&mut tx, &payload, date).await?;
                storage::tractors::set_exchange(&mut tx, sold.id, received.id).await?;
                sold.exchange_tractor_id = Some(received.id);

                let purchase =
                    NewTransaction::purchase(EntityType::Tractor, received.id, received.purchase_price, date)
                        .with_party(customer)
                        .with_description(format!("{} exchange purchase", received.label()));
                storage::ledger::append(&mut tx, &purchase).await?;

                Some(received)
            }
            None => None,
        };

        storage::commit(tx, "tractor sale").await?;

        let profit = sale_profit(
            request.sale_price,
            sold.purchase_price,
            trade_in.as_ref().map(|t| t.purchase_price),
        );
        let message = if trade_in.is_some() {
            "tractor sold with exchange successfully"
        } else {
            "tractor sold successfully"
        };

        tracing::info!(
            tractor_id = sold.id,
            sale_price = request.sale_price,
            profit = profit.net,
            trade_in_id = trade_in.as_ref().map(|t| t.id),
            "{message}"
        );

        Ok(SaleOutcome {
            message: message.to_string(),
            tractor: sold,
            profit,
            profit_loss: profit.net,
            trade_in,
        })
    }

    pub async fn get(&self, id: TractorId) -> Result<Tractor, AppError> {
        let mut conn = self.repo.acquire().await?;
        storage::tractors::get(&mut conn, id)
            .await?
            .ok_or(AppError::TractorNotFound(id))
    }

    pub async fn list(&self, status: Option<TractorStatus>) -> Result<Vec<Tractor>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::tractors::list(&mut conn, status).await?)
    }

    /// Overwrite the stored record. No status transition rules apply here.
    pub async fn update(&self, tractor: Tractor) -> Result<Tractor, AppError> {
        if tractor.brand.trim().is_empty() || tractor.model.trim().is_empty() {
            return Err(AppError::validation("Brand and model are required"));
        }
        if tractor.chassis_number.trim().is_empty() {
            return Err(AppError::validation("Chassis number is required"));
        }

        let mut conn = self.repo.acquire().await?;
        let updated = match storage::tractors::update(&mut conn, &tractor).await {
            Ok(updated) => updated,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::ChassisNumberExists(tractor.chassis_number));
            }
            Err(err) => return Err(err.into()),
        };
        if !updated {
            return Err(AppError::TractorNotFound(tractor.id));
        }

        tracing::info!(tractor_id = tractor.id, "tractor updated");
        Ok(tractor)
    }

    /// Remove a tractor, first unlinking every record that points at it.
    pub async fn delete(&self, id: TractorId) -> Result<(), AppError> {
        let mut tx = self.repo.begin().await?;

        let unlinked = storage::tractors::clear_exchange_references(&mut tx, id).await?;
        let detached = storage::service_records::detach_tractor(&mut tx, id).await?;
        if !storage::tractors::delete(&mut tx, id).await? {
            return Err(AppError::TractorNotFound(id));
        }

        storage::commit(tx, "tractor delete").await?;

        tracing::info!(tractor_id = id, unlinked, detached, "tractor deleted");
        Ok(())
    }
}

fn validate_new_tractor(tractor: &NewTractor) -> Result<(), AppError> {
    validate_identity(tractor)?;
    if tractor.purchase_price <= 0 {
        return Err(AppError::validation("Purchase price must be positive"));
    }
    Ok(())
}

/// A trade-in may be taken for nothing, but never credited below zero.
fn validate_trade_in(tractor: &NewTractor) -> Result<(), AppError> {
    validate_identity(tractor)?;
    if tractor.purchase_price < 0 {
        return Err(AppError::validation("Trade-in value cannot be negative"));
    }
    Ok(())
}

fn validate_identity(tractor: &NewTractor) -> Result<(), AppError> {
    if tractor.brand.trim().is_empty() || tractor.model.trim().is_empty() {
        return Err(AppError::validation("Brand and model are required"));
    }
    if tractor.chassis_number.trim().is_empty() {
        return Err(AppError::validation("Chassis number is required"));
    }
    Ok(())
}

async fn insert_tractor(
    conn: &mut sqlx::SqliteConnection,
    tractor: &NewTractor,
    date: chrono::NaiveDate,
) -> Result<Tractor, AppError> {
    match storage::tractors::insert(conn, tractor, date).await {
        Ok(saved) => Ok(saved),
        Err(err) if is_unique_violation(&err) => {
            Err(AppError::ChassisNumberExists(tractor.chassis_number.clone()))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_in_ignored_without_exchange_flag() {
        let mut request = SaleRequest::new(15_000, "Farmer Joe");
        request.trade_in = Some(NewTractor::new("Ford", "3000", "CH-9", 4_000));
        assert!(request.takes_trade_in().is_none());

        let request = SaleRequest::new(15_000, "Farmer Joe")
            .with_trade_in(NewTractor::new("Ford", "3000", "CH-9", 4_000));
        assert!(request.takes_trade_in().is_some());
    }

    #[test]
    fn test_validate_new_tractor() {
        assert!(validate_new_tractor(&NewTractor::new("Ford", "3000", "CH-1", 100)).is_ok());
        assert!(validate_new_tractor(&NewTractor::new("", "3000", "CH-1", 100)).is_err());
        assert!(validate_new_tractor(&NewTractor::new("Ford", "3000", " ", 100)).is_err());
        assert!(validate_new_tractor(&NewTractor::new("Ford", "3000", "CH-1", 0)).is_err());
    }

    #[test]
    fn test_trade_in_may_be_worth_nothing() {
        assert!(validate_trade_in(&NewTractor::new("Ford", "3000", "CH-1", 0)).is_ok());
        assert!(validate_trade_in(&NewTractor::new("Ford", "3000", "CH-1", -1)).is_err());
        assert!(validate_trade_in(&NewTractor::new("Ford", "", "CH-1", 0)).is_err());
    }
}
