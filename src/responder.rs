//! The responder: endpoints, dispatcher and notification sender wired
//! together under one cancellation token.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_SHUTDOWN_GRACE, ResponderConfig};
use crate::dispatch::{Dispatcher, Endpoint};
use crate::error::{Error, Result};
use crate::notification::{DEFAULT_INFORM_TIMEOUT, NotificationJob, NotificationSender};
use crate::registry::ContextRegistry;
use crate::v3::{LocalEngine, UsmUser};

/// Builder for [`Responder`].
pub struct ResponderBuilder {
    registry: Arc<ContextRegistry>,
    endpoints: Vec<SocketAddr>,
    users: Vec<UsmUser>,
    engine: Option<LocalEngine>,
    max_message_size: usize,
    inform_timeout: Duration,
    shutdown_grace: Duration,
    queue_depth: usize,
    cancel: Option<CancellationToken>,
}

impl ResponderBuilder {
    /// Add a UDP endpoint. Port 0 picks an ephemeral port.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.endpoints.push(addr);
        self
    }

    pub fn user(mut self, user: UsmUser) -> Self {
        self.users.push(user);
        self
    }

    pub fn engine(mut self, engine: LocalEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Default is 1472 bytes.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn inform_timeout(mut self, timeout: Duration) -> Self {
        self.inform_timeout = timeout;
        self
    }

    /// How long [`Responder::run`] waits for tasks after cancellation.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Capacity of the queue between variations and the sender.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Share a cancellation token. If not set the responder creates its own,
    /// available through [`Responder::cancel`].
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bind every endpoint. Nothing is served until [`Responder::run`].
    pub fn build(self) -> Result<Responder> {
        if self.endpoints.is_empty() {
            return Err(Error::config("at least one endpoint is required"));
        }

        let engine = Arc::new(self.engine.unwrap_or_else(LocalEngine::generated));
        let cancel = self.cancel.unwrap_or_default();
        let (queue_tx, queue_rx) = mpsc::channel(self.queue_depth);

        let users = self
            .users
            .iter()
            .map(|user| (user.name.clone(), user.localize(engine.engine_id())))
            .collect::<HashMap<_, _>>();
        let dispatcher = Arc::new(Dispatcher {
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&engine),
            users,
            max_message_size: self.max_message_size,
            notifications: Some(queue_tx),
        });

        let sender = NotificationSender::builder(Arc::clone(&self.registry), Arc::clone(&engine))
            .users(self.users)
            .inform_timeout(self.inform_timeout)
            .started(Instant::now())
            .cancel(cancel.clone())
            .build();

        let endpoints = self
            .endpoints
            .into_iter()
            .map(|addr| Endpoint::bind(addr, Arc::clone(&dispatcher), cancel.clone()))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(target: "snmp_responder::dispatch", { endpoints = endpoints.len(), contexts = self.registry.len(), engine_id = %crate::util::hex::Bytes(engine.engine_id()) }, "responder ready");

        Ok(Responder {
            local_addrs: endpoints.iter().map(Endpoint::local_addr).collect(),
            endpoints,
            registry: self.registry,
            engine,
            sender: Arc::new(sender),
            queue: queue_rx,
            cancel,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// A bound responder.
///
/// ```no_run
/// use snmp_responder::{Responder, ResponderConfig};
///
/// # async fn example() -> snmp_responder::Result<()> {
/// let responder = Responder::from_config(&ResponderConfig {
///     endpoints: vec!["127.0.0.1:1161".parse().unwrap()],
///     data_dir: "data".into(),
///     ..ResponderConfig::default()
/// })?;
///
/// let cancel = responder.cancel();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     cancel.cancel();
/// });
/// responder.run().await
/// # }
/// ```
pub struct Responder {
    endpoints: Vec<Endpoint>,
    local_addrs: Vec<SocketAddr>,
    registry: Arc<ContextRegistry>,
    engine: Arc<LocalEngine>,
    sender: Arc<NotificationSender>,
    queue: mpsc::Receiver<NotificationJob>,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl Responder {
    pub fn builder(registry: Arc<ContextRegistry>) -> ResponderBuilder {
        ResponderBuilder {
            registry,
            endpoints: Vec::new(),
            users: Vec::new(),
            engine: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            inform_timeout: DEFAULT_INFORM_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            cancel: None,
        }
    }

    /// Validate `config`, load its data directory and bind its endpoints.
    pub fn from_config(config: &ResponderConfig) -> Result<Self> {
        config.validate()?;
        let registry = ContextRegistry::load(&config.data_dir, config.load_mode)?
            .with_default_context(&config.default_context);

        let mut builder = Self::builder(Arc::new(registry))
            .engine(config.engine()?)
            .max_message_size(config.max_message_size)
            .inform_timeout(config.inform_timeout)
            .shutdown_grace(config.shutdown_grace)
            .queue_depth(config.queue_depth);
        for addr in &config.endpoints {
            builder = builder.bind(*addr);
        }
        for user in &config.users {
            builder = builder.user(user.clone());
        }
        builder.build()
    }

    /// Bound addresses, in endpoint order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<LocalEngine> {
        &self.engine
    }

    /// Sender for explicit and periodic notifications.
    pub fn sender(&self) -> &Arc<NotificationSender> {
        &self.sender
    }

    /// Token that stops [`run`](Self::run).
    pub fn cancel(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve until cancelled, then wait up to the shutdown grace period
    /// for every task to finish.
    pub async fn run(self) -> Result<()> {
        let mut tasks = JoinSet::new();
        for endpoint in self.endpoints {
            tasks.spawn(endpoint.run());
        }
        let sender = Arc::clone(&self.sender);
        let cancel = self.cancel.clone();
        let queue = self.queue;
        tasks.spawn(async move {
            sender.run(queue, cancel).await;
            Ok(())
        });

        self.cancel.cancelled().await;
        tracing::info!(target: "snmp_responder::dispatch", { grace = ?self.shutdown_grace }, "shutting down");

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(target: "snmp_responder::dispatch", { error = %e }, "task ended with error");
                    }
                    Err(e) => {
                        tracing::warn!(target: "snmp_responder::dispatch", { error = %e }, "task panicked or was aborted");
                    }
                }
            }
        };
        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            tracing::warn!(target: "snmp_responder::dispatch", "shutdown grace period elapsed, aborting remaining tasks");
            tasks.abort_all();
        }
        Ok(())
    }
}
