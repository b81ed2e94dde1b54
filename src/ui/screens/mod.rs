pub mod outlook;
pub mod planner;
pub mod report;

pub use outlook::OutlookScreen;
pub use planner::PlannerScreen;
pub use report::ReportScreen;
