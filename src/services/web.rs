//! Web server service implementation.

use super::Service;
use crate::state::AppState;
use crate::web::create_router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

pub struct WebService {
    port: u16,
    app_state: AppState,
    shutdown_tx: Option<broadcast::Sender<()>>,
    /// The serving task. Kept out of `run`'s future so a shutdown can still
    /// drain in-flight requests after the runner stops polling `run`.
    serve_handle: Option<JoinHandle<Result<(), std::io::Error>>>,
}

impl WebService {
    pub fn new(port: u16, app_state: AppState) -> Self {
        Self {
            port,
            app_state,
            shutdown_tx: None,
            serve_handle: None,
        }
    }
}

#[async_trait::async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        let app = create_router(self.app_state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        info!(
            service = "web",
            address = %addr,
            link = format!("http://localhost:{}", addr.port()),
            "web_server_listening"
        );

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    trace!(service = "web", "graceful_shutdown_started");
                })
                .await
        });
        self.serve_handle = Some(handle);

        let result = self
            .serve_handle
            .as_mut()
            .expect("serve handle just stored")
            .await;
        self.serve_handle = None;

        info!(service = "web", "web_server_stopped");
        match result {
            Ok(serve_result) => Ok(serve_result?),
            Err(join_error) => Err(anyhow::anyhow!("serve task failed: {join_error}")),
        }
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        } else {
            warn!(service = "web", "no_shutdown_channel");
        }

        // Wait for in-flight requests to drain; the service manager bounds
        // this whole call with the configured shutdown timeout.
        if let Some(handle) = self.serve_handle.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(service = "web", error = %e, "serve_ended_with_error"),
                Err(e) => warn!(service = "web", error = %e, "serve_task_join_failed"),
            }
        }
        Ok(())
    }
}
