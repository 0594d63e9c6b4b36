//! Application wiring: price book, simulator, fan-out, store, ledger

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use stockwatch_alerts::{ConnectionRegistry, FanoutEngine};
use stockwatch_core::{AppConfig, IdentityStore};
use stockwatch_ledger::TradeExecutor;
use stockwatch_price_feed::{PriceBook, PriceSimulator};

use crate::hub::ChannelHub;
use crate::rate_limit::LoginLimiter;

/// Running background task with its stop signal
struct BackgroundTask {
    name: &'static str,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Shared state behind every connection
pub struct AppService {
    config: AppConfig,
    book: Arc<PriceBook>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<ChannelHub>,
    store: Arc<dyn IdentityStore>,
    executor: TradeExecutor,
    limiter: LoginLimiter,
    start_time: Instant,
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl AppService {
    /// Open the configured store and wire everything around it
    pub async fn new(config: AppConfig) -> Self {
        let store = stockwatch_store::open_store(&config.store).await;
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            book: Arc::new(PriceBook::from_config(&config.simulator)),
            registry: Arc::new(ConnectionRegistry::new()),
            hub: Arc::new(ChannelHub::new()),
            store,
            executor: TradeExecutor::new(config.store.history_limit),
            limiter: LoginLimiter::new(config.rate_limit.clone()),
            start_time: Instant::now(),
            tasks: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Start the simulator, the fan-out engine and limiter cleanup
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            anyhow::bail!("services already started");
        }

        // Fan-out subscribes before the simulator publishes its first tick
        let engine = FanoutEngine::new(
            &self.config.alerts,
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            self.hub.clone(),
        );
        let ticks = self.book.subscribe();
        let (shutdown, rx) = oneshot::channel();
        tasks.push(BackgroundTask {
            name: "fanout",
            shutdown,
            handle: tokio::spawn(engine.run(ticks, rx)),
        });

        let simulator = PriceSimulator::new(self.config.simulator.clone(), Arc::clone(&self.book));
        let (shutdown, rx) = oneshot::channel();
        tasks.push(BackgroundTask {
            name: "simulator",
            shutdown,
            handle: tokio::spawn(simulator.run(rx)),
        });

        if self.config.rate_limit.enabled {
            let service = Arc::clone(self);
            let (shutdown, mut rx) = oneshot::channel();
            tasks.push(BackgroundTask {
                name: "limiter-cleanup",
                shutdown,
                handle: tokio::spawn(async move {
                    let mut interval = tokio::time::interval(service.config.rate_limit.window());
                    loop {
                        tokio::select! {
                            _ = interval.tick() => service.limiter.cleanup(),
                            _ = &mut rx => break,
                        }
                    }
                }),
            });
        }

        info!(
            "Started {} background services (tick every {:?}, store: {})",
            tasks.len(),
            self.config.simulator.tick_interval(),
            self.store.backend()
        );
        Ok(())
    }

    /// Signal every background task and wait briefly; stragglers are aborted
    pub async fn stop(&self) {
        let tasks: Vec<BackgroundTask> = self.tasks.lock().drain(..).collect();

        for task in tasks {
            let _ = task.shutdown.send(());
            let abort = task.handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), task.handle).await.is_err() {
                warn!("{} did not stop in time, aborting", task.name);
                abort.abort();
            }
        }

        info!("All services stopped after {:?}", self.uptime());
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn book(&self) -> &Arc<PriceBook> {
        &self.book
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub fn executor(&self) -> &TradeExecutor {
        &self.executor
    }

    pub fn limiter(&self) -> &LoginLimiter {
        &self.limiter
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
