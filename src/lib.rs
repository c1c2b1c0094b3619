pub mod agents;
pub mod cli;
pub mod config;
pub mod error;
pub mod profiles;
pub mod server;
pub mod telemetry;
pub mod workflow;

#[cfg(test)]
mod tests;
