//! In-process responder for testing.
//!
//! Binds ephemeral localhost ports and shuts down on drop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use snmp_responder::v3::LocalEngine;
use snmp_responder::{ContextRegistry, LoadMode, NotificationSender, Responder, Store, UsmUser};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::fixtures;

pub struct TestResponder {
    addrs: Vec<SocketAddr>,
    registry: Arc<ContextRegistry>,
    sender: Arc<NotificationSender>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl TestResponder {
    /// `public` context from [`fixtures::records`] and the default v3 user.
    pub async fn new() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> TestResponderBuilder {
        TestResponderBuilder {
            contexts: vec![("public".to_string(), fixtures::records())],
            users: vec![fixtures::user()],
            endpoints: 1,
            max_message_size: 1472,
            inform_timeout: Duration::from_secs(5),
        }
    }

    /// The first endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.addrs[0]
    }

    /// Every endpoint, in bind order. All of them share one dispatcher.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn sender(&self) -> &Arc<NotificationSender> {
        &self.sender
    }
}

impl Drop for TestResponder {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct TestResponderBuilder {
    contexts: Vec<(String, String)>,
    users: Vec<UsmUser>,
    endpoints: usize,
    max_message_size: usize,
    inform_timeout: Duration,
}

impl TestResponderBuilder {
    /// Replace the context list with a single `public` context.
    pub fn records(mut self, text: impl Into<String>) -> Self {
        self.contexts = vec![("public".to_string(), text.into())];
        self
    }

    /// Add another context.
    pub fn context(mut self, key: &str, text: impl Into<String>) -> Self {
        self.contexts.push((key.to_string(), text.into()));
        self
    }

    /// Add another v3 user next to the default one.
    pub fn user(mut self, user: UsmUser) -> Self {
        self.users.push(user);
        self
    }

    /// Listen on `count` localhost ports instead of one.
    pub fn endpoints(mut self, count: usize) -> Self {
        self.endpoints = count.max(1);
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn inform_timeout(mut self, timeout: Duration) -> Self {
        self.inform_timeout = timeout;
        self
    }

    pub async fn start(self) -> TestResponder {
        let mut registry = ContextRegistry::builder();
        for (key, text) in &self.contexts {
            let store = Store::load(key, text, LoadMode::Strict).expect("fixture records must parse");
            registry = registry.store(key, Arc::new(store));
        }

        let cancel = CancellationToken::new();
        let mut builder = Responder::builder(Arc::new(registry.build()));
        for _ in 0..self.endpoints {
            builder = builder.bind("127.0.0.1:0".parse().unwrap());
        }
        builder = builder
            .engine(LocalEngine::new(fixtures::ENGINE_ID))
            .max_message_size(self.max_message_size)
            .inform_timeout(self.inform_timeout)
            .shutdown_grace(Duration::from_millis(500))
            .cancel(cancel.clone());
        for user in self.users {
            builder = builder.user(user);
        }
        let responder = builder.build().expect("failed to build test responder");

        let addrs = responder.local_addrs().to_vec();
        let registry = Arc::clone(responder.registry());
        let sender = Arc::clone(responder.sender());
        let task = tokio::spawn(async move {
            if let Err(e) = responder.run().await {
                eprintln!("TestResponder error: {}", e);
            }
        });

        TestResponder {
            addrs,
            registry,
            sender,
            cancel,
            _task: task,
        }
    }
}
