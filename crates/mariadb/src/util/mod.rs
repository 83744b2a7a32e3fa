pub mod adoption;
pub mod conditions;
pub mod defaults;
pub mod errors;
pub mod metrics;
pub mod rbac;
pub mod readiness;
pub mod telemetry;
