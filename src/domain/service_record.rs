use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Cents, PartId, TractorId, line_total};

pub type ServiceRecordId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Pending,
    Completed,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ServiceStatus::Pending),
            "completed" => Some(ServiceStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of parts consumed by a service job, priced at the time of the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartUsage {
    pub part_id: PartId,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

impl PartUsage {
    pub fn new(part_id: PartId, name: impl Into<String>, quantity: i64, unit_price: Cents) -> Self {
        Self {
            part_id,
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Name for error messages; falls back to the id when the caller sent none.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("#{}", self.part_id)
        } else {
            self.name.clone()
        }
    }
}

/// Caller-supplied fields of a service job, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDraft {
    pub tractor_id: Option<TractorId>,
    pub customer_name: String,
    pub description: String,
    pub labor_cost: Cents,
    pub parts_cost: Cents,
    pub parts_used: Vec<PartUsage>,
    pub service_date: Option<NaiveDate>,
    /// Ignored on create, where the job is always recorded as completed.
    pub status: Option<ServiceStatus>,
}

impl ServiceDraft {
    pub fn new(customer_name: impl Into<String>, description: impl Into<String>, labor_cost: Cents) -> Self {
        Self {
            tractor_id: None,
            customer_name: customer_name.into(),
            description: description.into(),
            labor_cost,
            parts_cost: 0,
            parts_used: Vec::new(),
            service_date: None,
            status: None,
        }
    }

    pub fn with_tractor(mut self, tractor_id: TractorId) -> Self {
        self.tractor_id = Some(tractor_id);
        self
    }

    pub fn with_parts_cost(mut self, parts_cost: Cents) -> Self {
        self.parts_cost = parts_cost;
        self
    }

    pub fn with_part(mut self, usage: PartUsage) -> Self {
        self.parts_used.push(usage);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.service_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceRecordId,
    pub tractor_id: Option<TractorId>,
    pub customer_name: String,
    pub description: String,
    pub labor_cost: Cents,
    pub parts_cost: Cents,
    pub total_cost: Cents,
    pub parts_used: Vec<PartUsage>,
    pub service_date: NaiveDate,
    pub status: ServiceStatus,
}

/// Sum of `unit_price * quantity` over all usages, `None` on overflow.
pub fn parts_cost_of(usages: &[PartUsage]) -> Option<Cents> {
    usages.iter().try_fold(0 as Cents, |acc, usage| {
        line_total(usage.unit_price, usage.quantity).and_then(|line| acc.checked_add(line))
    })
}

/// The calculated cost wins whenever it is nonzero or nothing was supplied,
/// so a hand-entered parts cost only survives on jobs without priced parts.
pub fn resolve_parts_cost(supplied: Cents, calculated: Cents) -> Cents {
    if supplied == 0 || calculated != 0 {
        calculated
    } else {
        supplied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculated_cost_overrides_zero() {
        let usages = vec![PartUsage::new(1, "Filter", 2, 1500), PartUsage::new(2, "Belt", 1, 4000)];
        let calculated = parts_cost_of(&usages).unwrap();
        assert_eq!(calculated, 7000);
        assert_eq!(resolve_parts_cost(0, calculated), 7000);
    }

    #[test]
    fn test_calculated_cost_overrides_supplied() {
        assert_eq!(resolve_parts_cost(9999, 7000), 7000);
    }

    #[test]
    fn test_supplied_cost_kept_without_parts() {
        assert_eq!(resolve_parts_cost(2500, parts_cost_of(&[]).unwrap()), 2500);
    }

    #[test]
    fn test_usage_display_name_falls_back_to_id() {
        assert_eq!(PartUsage::new(7, "", 1, 0).display_name(), "#7");
        assert_eq!(PartUsage::new(7, "Seal", 1, 0).display_name(), "Seal");
    }

    #[test]
    fn test_usage_json_tolerates_missing_name() {
        let usages: Vec<PartUsage> =
            serde_json::from_str(r#"[{"part_id":3,"quantity":2,"unit_price":150}]"#).unwrap();
        assert_eq!(usages[0].name, "");
        assert_eq!(parts_cost_of(&usages), Some(300));
    }
}
