// Application layer - business workflows over the storage layer.
// Each mutating operation runs inside one unit of work and appends its
// ledger entries before committing.

pub mod accounting;
pub mod auth;
pub mod error;
pub mod parts;
pub mod reporting;
pub mod service_jobs;
pub mod tractors;

pub use accounting::Accounting;
pub use auth::{AuthService, LoginResult, NewUser, require_role};
pub use error::*;
pub use parts::{PartSale, PartsStock};
pub use reporting::*;
pub use service_jobs::ServiceJobs;
pub use tractors::{SaleOutcome, SaleRequest, TractorTrading};

use crate::config::Settings;
use crate::storage::Repository;

/// Every workflow of the dealership, sharing one connection pool.
/// This is the entry point for any client (CLI, API, ...).
#[derive(Clone)]
pub struct Dealership {
    pub tractors: TractorTrading,
    pub parts: PartsStock,
    pub services: ServiceJobs,
    pub accounting: Accounting,
    pub auth: AuthService,
    repo: Repository,
}

impl Dealership {
    pub fn new(repo: Repository, settings: &Settings) -> Self {
        let parts = PartsStock::new(repo.clone());
        Self {
            tractors: TractorTrading::new(repo.clone()),
            services: ServiceJobs::new(repo.clone(), parts.clone()),
            parts,
            accounting: Accounting::new(repo.clone()),
            auth: AuthService::new(repo.clone(), &settings.auth),
            repo,
        }
    }

    /// Create the database if needed and apply the schema.
    pub async fn init(settings: &Settings) -> Result<Self, AppError> {
        let repo = Repository::init(&settings.database).await?;
        Ok(Self::new(repo, settings))
    }

    /// Open an existing database.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        let repo = Repository::connect(&settings.database).await?;
        Ok(Self::new(repo, settings))
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }
}
