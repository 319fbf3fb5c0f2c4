pub mod access;
pub mod approvals;
pub mod audit;
pub mod errors;
pub mod evidence;
pub mod progress;
pub mod projects;
pub mod reports;
pub mod snapshots;
pub mod wizard;
