//! Long-running service lifecycle.
//!
//! A [`Service`] is a unit of work the binary runs for its whole life: the
//! HTTP listener and the store maintenance sweeper. This module is only the
//! interface; supervision (spawning, waiting for the first exit, shutdown
//! fan-out, and the grace-period timing) is owned by
//! [`manager::ServiceManager`].

pub mod maintenance;
pub mod manager;
pub mod web;

/// How a supervised service ended.
#[derive(Debug)]
pub enum ServiceResult {
    /// Stopped because shutdown was requested and the service wound down.
    GracefulShutdown,
    /// `run` returned `Ok` on its own — always suspicious for run-forever
    /// services.
    NormalCompletion,
    Error(anyhow::Error),
}

/// Common trait for all services in the application.
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// The name of the service for logging
    fn name(&self) -> &'static str;

    /// Run the service's main work loop. Expected to run until shutdown;
    /// the supervisor cancels it by dropping the future.
    async fn run(&mut self) -> Result<(), anyhow::Error>;

    /// Wind down after the supervisor has stopped polling `run`.
    ///
    /// A service whose real work is detached from `run`'s future (the web
    /// listener serves from a spawned task) drains it here; everything else
    /// returns immediately.
    async fn shutdown(&mut self) -> Result<(), anyhow::Error>;
}
