//! [`Advertiser`] backed by the `mdns-sd` daemon.

use std::collections::HashMap;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{debug, warn};

use crate::advertiser::Advertiser;
use crate::error::{Error, Result};

/// Advertises names over multicast DNS.
#[derive(Clone)]
pub struct MdnsAdvertiser {
    daemon: ServiceDaemon,
}

/// A live mDNS registration.
#[derive(Debug)]
pub struct MdnsRegistration {
    fullname: String,
}

impl MdnsAdvertiser {
    /// Start an mDNS daemon.
    pub fn new() -> Result<Self> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
        })
    }

    /// Stop the daemon. Registrations still live are dropped with it.
    pub fn close(&self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "Failed to stop mDNS daemon");
        }
    }
}

/// Host label for the SRV record, derived from the advertised host.
fn host_name(host: &str) -> String {
    let label: String = host
        .trim_end_matches('.')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{label}.local.")
}

#[async_trait]
impl Advertiser for MdnsAdvertiser {
    type Handle = MdnsRegistration;

    async fn register(
        &self,
        name: &str,
        service_type: &str,
        port: u16,
        host: &str,
    ) -> Result<MdnsRegistration> {
        let info = ServiceInfo::new(
            service_type,
            name,
            &host_name(host),
            host,
            port,
            HashMap::<String, String>::new(),
        )
        .map_err(|e| Error::registration(name, e))?;
        let fullname = info.get_fullname().to_owned();

        self.daemon
            .register(info)
            .map_err(|e| Error::registration(name, e))?;
        debug!(%fullname, "Registered mDNS service");

        Ok(MdnsRegistration { fullname })
    }

    async fn shutdown(&self, handle: MdnsRegistration) {
        match self.daemon.unregister(&handle.fullname) {
            Ok(_) => debug!(fullname = %handle.fullname, "Requested mDNS unregistration"),
            Err(e) => warn!(fullname = %handle.fullname, error = %e, "Failed to unregister"),
        }
    }
}
