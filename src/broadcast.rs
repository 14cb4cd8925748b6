//! Broadcast manager: keeps exactly one advertisement in step with the
//! message stream.
//!
//! # Lifecycle
//!
//! - **Idle**: nothing advertised, no message seen yet.
//! - **Active**: one live advertisement named after the last message.
//! - **Tearing down**: a superseded advertisement is being withdrawn in the
//!   background and its name slot stays reserved for the settle delay.
//!
//! A message equal to the previous one is ignored. A different message
//! withdraws the active advertisement (without waiting for it) and, unless
//! the message is empty, registers the new name right away. Only a
//! registration of a name whose slot is still settling is held back; the
//! loop keeps handling shutdown and newer messages while it waits, and a
//! newer message drops the held registration.
//!
//! # Example
//!
//! ```ignore
//! use marquee::{BroadcastConfig, BroadcastManager, MdnsAdvertiser, Responder};
//!
//! let responder = Responder::bind(("0.0.0.0", 45897)).await?;
//! let guard = BroadcastManager::new(MdnsAdvertiser::new()?, BroadcastConfig::new(host, 45897))
//!     .with_responder(responder)
//!     .spawn(messages);
//!
//! tokio::signal::ctrl_c().await?;
//! guard.shutdown().await?;
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::advertiser::{Advertiser, DEFAULT_SERVICE_TYPE};
use crate::error::Result;
use crate::responder::Responder;
use crate::stage::MessageStream;

/// How long a withdrawn name is kept off limits.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Where and how advertisements are placed.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Host (address) the advertisement points at.
    pub host: String,
    /// Port the advertisement points at.
    pub port: u16,
    /// Service type registered for every name.
    pub service_type: String,
    /// Wait after withdrawing a name before it counts as free.
    pub settle_delay: Duration,
}

impl BroadcastConfig {
    /// Config with the default service type and settle delay.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            service_type: DEFAULT_SERVICE_TYPE.to_owned(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

struct Advertisement<H> {
    name: String,
    handle: H,
}

/// A registration held back until its name slot has settled.
struct PendingRegistration {
    name: String,
    settled: oneshot::Receiver<()>,
}

/// Builder for the broadcast manager task set.
pub struct BroadcastManager<A: Advertiser> {
    advertiser: Arc<A>,
    config: BroadcastConfig,
    responder: Option<Responder>,
}

impl<A: Advertiser> BroadcastManager<A> {
    /// Manage advertisements through `advertiser`.
    pub fn new(advertiser: A, config: BroadcastConfig) -> Self {
        Self {
            advertiser: Arc::new(advertiser),
            config,
            responder: None,
        }
    }

    /// Serve the current message on `responder` while running.
    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Spawn the control loop (and responder) consuming `messages`.
    pub fn spawn(self, messages: MessageStream) -> BroadcastGuard {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (current_tx, current_rx) = watch::channel(String::new());
        let responder_addr = self.responder.as_ref().map(Responder::local_addr);

        let mut driver = JoinSet::new();

        if let Some(responder) = self.responder {
            driver.spawn(responder.serve(current_rx.clone(), shutdown_tx.subscribe()));
        }

        let control = ControlLoop {
            advertiser: self.advertiser,
            config: self.config,
            current: current_tx,
            active: None,
            pending: None,
            settling: HashMap::new(),
            teardowns: JoinSet::new(),
        };
        driver.spawn(control.run(messages, shutdown_tx.subscribe()));

        let driver_handle = tokio::spawn(async move {
            while let Some(res) = driver.join_next().await {
                if let Err(e) = res {
                    warn!("broadcast task failed: {e}");
                }
            }
        });

        BroadcastGuard {
            shutdown_tx,
            driver: driver_handle,
            current: current_rx,
            responder_addr,
        }
    }
}

/// Guard for a running broadcast manager.
pub struct BroadcastGuard {
    shutdown_tx: broadcast::Sender<()>,
    driver: JoinHandle<()>,
    current: watch::Receiver<String>,
    responder_addr: Option<SocketAddr>,
}

impl BroadcastGuard {
    /// The last message the manager received.
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    /// Watch the current message change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.clone()
    }

    /// Address of the responder, if one was attached.
    pub fn responder_addr(&self) -> Option<SocketAddr> {
        self.responder_addr
    }

    /// Stop taking messages, withdraw the active advertisement, and wait
    /// until every background task (including settle delays) has finished.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down broadcast manager");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.driver.await {
            warn!("broadcast driver failed: {e}");
        }
        Ok(())
    }
}

/// Sole owner of "what is advertised right now".
struct ControlLoop<A: Advertiser> {
    advertiser: Arc<A>,
    config: BroadcastConfig,
    current: watch::Sender<String>,
    active: Option<Advertisement<A::Handle>>,
    pending: Option<PendingRegistration>,
    /// Names still inside their settle delay, completed by the teardown task.
    settling: HashMap<String, oneshot::Receiver<()>>,
    teardowns: JoinSet<()>,
}

impl<A: Advertiser> ControlLoop<A> {
    async fn run(mut self, mut messages: MessageStream, mut shutdown: broadcast::Receiver<()>) {
        let mut stream_done = false;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = slot_settled(&mut self.pending) => {
                    if let Some(pending) = self.pending.take() {
                        self.register(pending.name).await;
                    }
                }
                message = messages.next(), if !stream_done => match message {
                    Some(message) => self.handle(message).await,
                    None => {
                        debug!("Message stream ended, waiting for shutdown");
                        stream_done = true;
                    }
                },
                Some(res) = self.teardowns.join_next(), if !self.teardowns.is_empty() => {
                    if let Err(e) = res {
                        warn!(error = %e, "Teardown task failed");
                    }
                }
            }
        }

        drop(messages);
        self.stop().await;
    }

    async fn handle(&mut self, message: String) {
        if *self.current.borrow() == message {
            trace!(%message, "Message unchanged");
            return;
        }
        debug!(%message, "Message changed");
        self.current.send_replace(message.clone());

        if let Some(pending) = self.pending.take() {
            debug!(name = %pending.name, "Dropping superseded registration");
            self.settling.insert(pending.name, pending.settled);
        }
        if let Some(active) = self.active.take() {
            self.begin_teardown(active);
        }
        if message.is_empty() {
            info!("Nothing to advertise");
            return;
        }

        self.settling
            .retain(|_, settled| matches!(settled.try_recv(), Err(TryRecvError::Empty)));
        match self.settling.remove(&message) {
            Some(settled) => {
                info!(name = %message, "Waiting for previous advertisement of this name to settle");
                self.pending = Some(PendingRegistration {
                    name: message,
                    settled,
                });
            }
            None => self.register(message).await,
        }
    }

    async fn register(&mut self, name: String) {
        info!(
            %name,
            host = %self.config.host,
            port = self.config.port,
            "Registering advertisement"
        );
        match self
            .advertiser
            .register(
                &name,
                &self.config.service_type,
                self.config.port,
                &self.config.host,
            )
            .await
        {
            Ok(handle) => self.active = Some(Advertisement { name, handle }),
            Err(e) => error!(%name, error = %e, "Failed to register advertisement"),
        }
    }

    fn begin_teardown(&mut self, advertisement: Advertisement<A::Handle>) {
        let (settled_tx, settled_rx) = oneshot::channel();
        self.settling.insert(advertisement.name.clone(), settled_rx);

        let advertiser = Arc::clone(&self.advertiser);
        let settle_delay = self.config.settle_delay;
        self.teardowns.spawn(async move {
            teardown(advertiser.as_ref(), advertisement, settle_delay).await;
            let _ = settled_tx.send(());
        });
    }

    async fn stop(&mut self) {
        info!("Stopping advertisement updates");
        if let Some(pending) = self.pending.take() {
            debug!(name = %pending.name, "Dropping registration still waiting to settle");
        }
        if let Some(active) = self.active.take() {
            teardown(self.advertiser.as_ref(), active, self.config.settle_delay).await;
        }
        while let Some(res) = self.teardowns.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Teardown task failed");
            }
        }
        info!("All advertisements withdrawn");
    }
}

/// Resolves once the pending registration's name slot is free; never
/// resolves when nothing is pending.
async fn slot_settled(pending: &mut Option<PendingRegistration>) {
    match pending {
        Some(pending) => {
            let _ = (&mut pending.settled).await;
        }
        None => std::future::pending().await,
    }
}

async fn teardown<A: Advertiser>(
    advertiser: &A,
    advertisement: Advertisement<A::Handle>,
    settle_delay: Duration,
) {
    let Advertisement { name, handle } = advertisement;
    info!(%name, "Shutting down advertisement");
    advertiser.shutdown(handle).await;

    debug!(%name, ?settle_delay, "Waiting for advertisement to settle");
    tokio::time::sleep(settle_delay).await;
    debug!(%name, "Advertisement settled");
}
