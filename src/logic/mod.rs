pub mod eligibility;
pub mod export;
pub mod ledger;

pub use eligibility::{EligibilityRefresher, ForecastProvider, RetryPolicy};
pub use export::Receipt;
pub use ledger::IrrigationLedger;
