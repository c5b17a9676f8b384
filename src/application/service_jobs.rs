use crate::domain::{
    Cents, DateRange, EntityType, NewTransaction, PartUsage, ServiceDraft, ServiceRecord,
    ServiceRecordId, ServiceStatus, TractorId, parts_cost_of, resolve_parts_cost, today,
};
use crate::storage::{self, Repository, is_foreign_key_violation};

use super::{AppError, PartsStock};

/// Workshop jobs. Parts used on a job are taken out of stock when the job is
/// recorded, through [`PartsStock`].
#[derive(Clone)]
pub struct ServiceJobs {
    repo: Repository,
    parts: PartsStock,
}

impl ServiceJobs {
    pub fn new(repo: Repository, parts: PartsStock) -> Self {
        Self { repo, parts }
    }

    /// Record a completed job, consume its parts and book the charge.
    ///
    /// If any part is missing or short, no stock moves and nothing is saved.
    pub async fn create(&self, draft: ServiceDraft) -> Result<ServiceRecord, AppError> {
        validate_draft(&draft)?;

        let date = draft.service_date.unwrap_or_else(today);
        let mut tx = self.repo.begin().await?;

        let mut parts_used = Vec::with_capacity(draft.parts_used.len());
        for usage in &draft.parts_used {
            let part = self.parts.consume(&mut tx, usage).await?;
            let mut usage = usage.clone();
            if usage.name.trim().is_empty() {
                usage.name = part.name;
            }
            parts_used.push(usage);
        }

        let (parts_cost, total_cost) = job_costs(draft.labor_cost, draft.parts_cost, &parts_used)?;
        let mut record = ServiceRecord {
            id: 0,
            tractor_id: draft.tractor_id,
            customer_name: draft.customer_name.trim().to_string(),
            description: draft.description.trim().to_string(),
            labor_cost: draft.labor_cost,
            parts_cost,
            total_cost,
            parts_used,
            service_date: date,
            status: ServiceStatus::Completed,
        };
        storage::service_records::insert(&mut tx, &mut record)
            .await
            .map_err(|err| unknown_tractor(err, draft.tractor_id))?;

        let entry = NewTransaction::sale(EntityType::Service, record.id, record.total_cost, date)
            .with_party(&record.customer_name)
            .with_description(format!("Service: {}", record.description));
        storage::ledger::append(&mut tx, &entry).await?;

        storage::commit(tx, "service create").await?;

        tracing::info!(
            service_id = record.id,
            parts = record.parts_used.len(),
            total = record.total_cost,
            "service job recorded"
        );
        Ok(record)
    }

    /// Replace a job's fields and recompute its costs. Stock is not touched,
    /// even when the list of parts changes.
    pub async fn update(&self, id: ServiceRecordId, draft: ServiceDraft) -> Result<ServiceRecord, AppError> {
        validate_draft(&draft)?;

        let mut conn = self.repo.acquire().await?;
        let existing = storage::service_records::get(&mut conn, id)
            .await?
            .ok_or(AppError::ServiceRecordNotFound(id))?;

        let (parts_cost, total_cost) = job_costs(draft.labor_cost, draft.parts_cost, &draft.parts_used)?;
        let record = ServiceRecord {
            id,
            tractor_id: draft.tractor_id,
            customer_name: draft.customer_name.trim().to_string(),
            description: draft.description.trim().to_string(),
            labor_cost: draft.labor_cost,
            parts_cost,
            total_cost,
            parts_used: draft.parts_used,
            service_date: draft.service_date.unwrap_or(existing.service_date),
            status: draft.status.unwrap_or(existing.status),
        };

        let updated = storage::service_records::update(&mut conn, &record)
            .await
            .map_err(|err| unknown_tractor(err, record.tractor_id))?;
        if !updated {
            return Err(AppError::ServiceRecordNotFound(id));
        }

        tracing::info!(service_id = id, total = record.total_cost, "service job updated");
        Ok(record)
    }

    pub async fn get(&self, id: ServiceRecordId) -> Result<ServiceRecord, AppError> {
        let mut conn = self.repo.acquire().await?;
        storage::service_records::get(&mut conn, id)
            .await?
            .ok_or(AppError::ServiceRecordNotFound(id))
    }

    /// Jobs whose service date falls inside the range, newest first.
    pub async fn list(&self, range: DateRange) -> Result<Vec<ServiceRecord>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::service_records::list(&mut conn, range).await?)
    }

    pub async fn delete(&self, id: ServiceRecordId) -> Result<(), AppError> {
        let mut conn = self.repo.acquire().await?;
        if !storage::service_records::delete(&mut conn, id).await? {
            return Err(AppError::ServiceRecordNotFound(id));
        }
        tracing::info!(service_id = id, "service job deleted");
        Ok(())
    }
}

fn unknown_tractor(err: anyhow::Error, tractor_id: Option<TractorId>) -> AppError {
    match tractor_id {
        Some(id) if is_foreign_key_violation(&err) => AppError::TractorNotFound(id),
        _ => err.into(),
    }
}

fn validate_draft(draft: &ServiceDraft) -> Result<(), AppError> {
    if draft.customer_name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }
    if draft.description.trim().is_empty() {
        return Err(AppError::validation("Description is required"));
    }
    if draft.labor_cost < 0 || draft.parts_cost < 0 {
        return Err(AppError::validation("Costs cannot be negative"));
    }
    if let Some(usage) = draft.parts_used.iter().find(|usage| usage.quantity <= 0) {
        return Err(AppError::validation(format!(
            "Quantity for {} must be positive",
            usage.display_name()
        )));
    }
    if draft.parts_used.iter().any(|usage| usage.unit_price < 0) {
        return Err(AppError::validation("Part prices cannot be negative"));
    }
    Ok(())
}

/// Returns `(parts_cost, total_cost)` for a job.
fn job_costs(labor_cost: Cents, supplied_parts_cost: Cents, usages: &[PartUsage]) -> Result<(Cents, Cents), AppError> {
    let calculated = parts_cost_of(usages).ok_or_else(|| AppError::validation("Parts cost is too large"))?;
    let parts_cost = resolve_parts_cost(supplied_parts_cost, calculated);
    let total = labor_cost
        .checked_add(parts_cost)
        .ok_or_else(|| AppError::validation("Total cost is too large"))?;
    Ok((parts_cost, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_costs_prefers_calculated() {
        let usages = vec![PartUsage::new(1, "Filter", 2, 1_500)];
        assert_eq!(job_costs(10_000, 0, &usages).unwrap(), (3_000, 13_000));
        assert_eq!(job_costs(10_000, 9_999, &usages).unwrap(), (3_000, 13_000));
    }

    #[test]
    fn test_job_costs_keeps_supplied_without_parts() {
        assert_eq!(job_costs(10_000, 2_500, &[]).unwrap(), (2_500, 12_500));
    }

    #[test]
    fn test_validate_draft_requires_customer_and_description() {
        assert!(validate_draft(&ServiceDraft::new("", "Oil change", 100)).is_err());
        assert!(validate_draft(&ServiceDraft::new("Farmer Joe", " ", 100)).is_err());
        assert!(validate_draft(&ServiceDraft::new("Farmer Joe", "Oil change", -1)).is_err());
        assert!(validate_draft(&ServiceDraft::new("Farmer Joe", "Oil change", 100)).is_ok());
    }

    #[test]
    fn test_validate_draft_rejects_non_positive_quantities() {
        let draft = ServiceDraft::new("Farmer Joe", "Oil change", 100)
            .with_part(PartUsage::new(1, "Filter", -2, 1_500));
        assert!(matches!(validate_draft(&draft), Err(AppError::Validation(_))));

        let draft = ServiceDraft::new("Farmer Joe", "Oil change", 100)
            .with_part(PartUsage::new(1, "Filter", 0, 1_500));
        assert!(validate_draft(&draft).is_err());
    }
}
