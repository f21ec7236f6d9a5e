//! The Supervisor module manages the lifecycle of the spikeguard service.
//!
//! It owns every long-running task of the `run` command:
//!
//! - **Event intake**: reads newline-delimited JSON events and feeds the
//!   `EventDispatcher`, which hands each event to the spike controller.
//! - **Notification delivery**: the `DeliveryWorker` drains the queue the
//!   controller submits to.
//! - **Episode retirement**: the controller's sweeper retires expired
//!   episodes periodically.
//! - **Graceful shutdown**: on Ctrl+C, SIGTERM or the end of the input, the
//!   intake stops, in-flight events finish, queued notifications are
//!   delivered and the database is closed. If a task panics the remaining
//!   ones are shut down as well.

mod builder;

use std::sync::Arc;

use builder::SupervisorBuilder;
use chrono::Utc;
use thiserror::Error;
use tokio::{io::AsyncBufRead, signal, sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::SpikeController,
    events::{EventDispatcher, ReportAddedHandler, read_json_lines},
    models::ApplicationEvent,
    notification::{DeliveryWorker, EmitterError, template::TemplateServiceError},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A state repository was not provided to the `SupervisorBuilder`.
    #[error("Missing state repository for Supervisor")]
    MissingStateRepository,

    /// A preference lookup was not provided to the `SupervisorBuilder`.
    #[error("Missing preference lookup for Supervisor")]
    MissingPreferences,

    /// The configured message templates are invalid.
    #[error("Invalid message template: {0}")]
    Template(#[from] TemplateServiceError),

    /// The configured emitter could not be created.
    #[error("Emitter error: {0}")]
    Emitter(#[from] EmitterError),

    /// A persistence operation failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The repository backing the episode store and the report counter.
    state: Arc<SqliteStateRepository>,

    /// The spike controller, also running the retirement sweeper.
    controller: Arc<SpikeController>,

    /// The handler bound to `ReportAddedToIncident` events.
    report_added: Arc<dyn ReportAddedHandler>,

    /// Delivers the notifications the controller queues. Taken by `run`.
    delivery_worker: Option<DeliveryWorker>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: JoinSet<()>,
}

impl Supervisor {
    /// Creates a new Supervisor instance with all its required components.
    ///
    /// This is typically called by the `SupervisorBuilder` after it has
    /// assembled all the necessary dependencies.
    pub fn new(
        config: AppConfig,
        state: Arc<SqliteStateRepository>,
        controller: Arc<SpikeController>,
        report_added: Arc<dyn ReportAddedHandler>,
        delivery_worker: DeliveryWorker,
    ) -> Self {
        Self {
            config: Arc::new(config),
            state,
            controller,
            report_added,
            delivery_worker: Some(delivery_worker),
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// A token that shuts the supervisor down when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// The spike controller managed by this supervisor.
    pub fn controller(&self) -> Arc<SpikeController> {
        Arc::clone(&self.controller)
    }

    /// Retires expired episodes once.
    pub async fn sweep(&self) -> Result<usize, SupervisorError> {
        let retired = self.controller.retire_expired(Utc::now()).await?;
        tracing::info!(retired, "Expired spike episodes retired.");
        Ok(retired)
    }

    /// Starts every service and processes `events` until the input ends or
    /// a shutdown signal arrives.
    pub async fn run<R>(mut self, events: R) -> Result<(), SupervisorError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        // Spawn a task to listen for shutdown signals.
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => cancellation_token.cancel(),
                _ = cancellation_token.cancelled() => {}
            }
        });

        // Notification delivery outlives the intake, so that everything the
        // dispatcher submits is still delivered.
        let delivery_token = CancellationToken::new();
        if let Some(delivery_worker) = self.delivery_worker.take() {
            let worker_token = delivery_token.clone();
            self.join_set.spawn(async move {
                delivery_worker.run(worker_token).await;
            });
        }

        // Spawn the retirement sweeper.
        let sweeper_controller = Arc::clone(&self.controller);
        let sweep_interval = self.config.sweep_interval_secs;
        let sweeper_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            sweeper_controller.run_retirement_sweeper(sweep_interval, sweeper_token).await;
        });

        // Create the channel that connects the event reader to the dispatcher.
        let (events_tx, events_rx) =
            mpsc::channel::<ApplicationEvent>(self.config.event_channel_capacity.max(1) as usize);

        let reader_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            match read_json_lines(events, events_tx, reader_token).await {
                Ok(forwarded) => tracing::info!(forwarded, "Event input exhausted."),
                Err(e) => tracing::error!(error = %e, "Event input failed."),
            }
        });

        let dispatcher = EventDispatcher::new(
            Arc::clone(&self.report_added),
            self.config.concurrency.max(1) as usize,
        );
        let dispatcher_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            dispatcher.run(events_rx, dispatcher_token.clone()).await;
            delivery_token.cancel();
            dispatcher_token.cancel();
        });

        // --- Main Supervisor Loop ---
        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // --- Graceful Shutdown ---
        let shutdown_timeout = self.config.shutdown_timeout;
        let join_set = &mut self.join_set;
        let drain = async move {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!("A task failed during shutdown: {:?}", e);
                }
            }
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                "Tasks did not finish within the timeout of {:?}. Aborting them.",
                shutdown_timeout
            );
        }
        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        let submitted: usize =
            self.controller.get_submitted_notifications().iter().map(|entry| *entry.value()).sum();
        tracing::info!(submitted, "Final state: spike notifications submitted.");

        if tokio::time::timeout(shutdown_timeout, self.state.close()).await.is_err() {
            tracing::warn!("Database did not close within the timeout of {:?}.", shutdown_timeout);
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
        _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
    }
}
