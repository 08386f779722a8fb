pub mod configuration;
pub mod domain;
pub mod fcm;
pub mod publish;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod startup;
pub mod telemetry;
