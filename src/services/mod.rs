pub mod database;
pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod notifications;
pub mod senders;
pub mod settings;
pub mod tenants;
