//! Supervision of the application's services.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::{Service, ServiceResult};

pub struct ServiceManager {
    registered_services: HashMap<String, Box<dyn Service>>,
    running_services: HashMap<String, JoinHandle<ServiceResult>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registered_services: HashMap::new(),
            running_services: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Register a service to be managed (not yet spawned)
    pub fn register_service(&mut self, name: &str, service: Box<dyn Service>) {
        self.registered_services.insert(name.to_string(), service);
    }

    /// Spawn all registered services, each under its own supervisor task.
    pub fn spawn_all(&mut self) {
        let service_names: Vec<_> = self.registered_services.keys().cloned().collect();

        for (name, service) in self.registered_services.drain() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(Self::supervise(service, shutdown_rx));
            self.running_services.insert(name, handle);
        }

        info!(services = ?service_names, "services_spawned");
    }

    /// Drive one service until it exits on its own or the shutdown broadcast
    /// arrives. On shutdown the `run` future is dropped (cancelling loop
    /// services in place) and the service's own wind-down hook runs.
    async fn supervise(
        mut service: Box<dyn Service>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> ServiceResult {
        let name = service.name();
        info!(service = name, "service_started");

        tokio::select! {
            result = service.run() => match result {
                Ok(()) => {
                    warn!(service = name, "service_completed_unexpectedly");
                    ServiceResult::NormalCompletion
                }
                Err(e) => {
                    error!(service = name, error = %e, "service_failed");
                    ServiceResult::Error(e)
                }
            },
            _ = shutdown_rx.recv() => match service.shutdown().await {
                Ok(()) => ServiceResult::GracefulShutdown,
                Err(e) => {
                    error!(service = name, error = %e, "service_shutdown_failed");
                    ServiceResult::Error(e)
                }
            },
        }
    }

    /// Wait until any service completes or fails, returning its name and
    /// result. The remaining services keep running; the caller decides
    /// whether to shut them down.
    pub async fn run(&mut self) -> (String, ServiceResult) {
        if self.running_services.is_empty() {
            return (
                "none".to_string(),
                ServiceResult::Error(anyhow::anyhow!("No services to run")),
            );
        }

        // Borrow every handle; the still-running ones stay in the map and
        // remain joinable by `shutdown`.
        let watchers: Vec<_> = self
            .running_services
            .iter_mut()
            .map(|(name, handle)| {
                Box::pin(async move {
                    let joined = handle.await;
                    (name.clone(), joined)
                })
            })
            .collect();

        let ((completed, joined), _, remaining) = futures::future::select_all(watchers).await;
        drop(remaining);
        self.running_services.remove(&completed);

        match joined {
            Ok(service_result) => (completed, service_result),
            Err(e) => {
                error!(service = %completed, error = %e, "service_task_panicked");
                (
                    completed,
                    ServiceResult::Error(anyhow::anyhow!("task panic: {e}")),
                )
            }
        }
    }

    /// Shutdown all services gracefully with a timeout.
    ///
    /// All timing lives here: the broadcast goes out once, and every
    /// supervisor is given whatever remains of the grace period to join.
    /// Returns the elapsed duration on success, or the names of the services
    /// that failed to stop in time.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<String>> {
        let service_names: Vec<_> = self.running_services.keys().cloned().collect();
        info!(
            services = ?service_names,
            timeout = format!("{:.2?}", timeout),
            "services_shutting_down"
        );

        let _ = self.shutdown_tx.send(());

        let start_time = std::time::Instant::now();
        let mut pending_services = Vec::new();

        for (name, handle) in self.running_services.drain() {
            let remaining = timeout.saturating_sub(start_time.elapsed());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(_)) => {
                    debug!(service = %name, "service_shutdown_joined");
                }
                Ok(Err(e)) => {
                    warn!(service = %name, error = %e, "service_shutdown_panicked");
                    pending_services.push(name);
                }
                Err(_) => {
                    warn!(service = %name, "service_shutdown_timed_out");
                    pending_services.push(name);
                }
            }
        }

        if pending_services.is_empty() {
            Ok(start_time.elapsed())
        } else {
            Err(pending_services)
        }
    }
}
