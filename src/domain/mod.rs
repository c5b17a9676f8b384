mod dates;
mod expense;
mod ledger;
mod money;
mod part;
mod pricing;
mod service_record;
mod tractor;
mod user;

pub use dates::*;
pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use part::*;
pub use pricing::*;
pub use service_record::*;
pub use tractor::*;
pub use user::*;
