pub mod api;
pub mod domain {
    pub mod compliance;
    pub mod lifecycle;
    pub mod models;
    pub mod policy;
    pub mod wizard;
}
pub mod infrastructure {
    pub mod auth;
    pub mod config;
    pub mod db;
    pub mod state;
    pub mod storage;
}
pub mod reporting;
pub mod services;
pub mod telemetry;
pub mod validation {
    pub mod rules;
}
