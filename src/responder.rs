//! Passive responder: tells TCP clients the current message.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Port the responder and the advertisement use by default.
pub const DEFAULT_PORT: u16 = 45897;

/// A bound listener waiting to be handed to the broadcast manager.
#[derive(Debug)]
pub struct Responder {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Responder {
    /// Bind the listening socket.
    pub async fn bind<A>(addr: A) -> Result<Self>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::bind(format!("{addr:?}"), e))?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Listening for TCP connections");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires, then wait for every
    /// in-flight reply to finish.
    pub(crate) async fn serve(
        self,
        current: watch::Receiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut replies = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let message = current.borrow().clone();
                        replies.spawn(reply(stream, peer, message));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept TCP connection"),
                },
                Some(res) = replies.join_next(), if !replies.is_empty() => {
                    if let Err(e) = res {
                        warn!(error = %e, "Reply task failed");
                    }
                }
            }
        }

        drop(self.listener);
        info!(address = %self.local_addr, "Stopped TCP listener");
        while let Some(res) = replies.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Reply task failed");
            }
        }
    }
}

async fn reply(mut stream: TcpStream, peer: SocketAddr, message: String) {
    if !message.is_empty() {
        let line = format!("{message}\n");
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!(%peer, error = %e, "Failed to write to TCP connection");
            return;
        }
    }
    if let Err(e) = stream.shutdown().await {
        debug!(%peer, error = %e, "Client went away before close");
    }
}
