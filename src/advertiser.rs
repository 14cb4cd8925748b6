//! The advertiser seam: whatever actually makes a name discoverable.

use async_trait::async_trait;

use crate::error::Result;

/// Service type advertised by default.
pub const DEFAULT_SERVICE_TYPE: &str = "_afpovertcp._tcp.local.";

/// Registers and withdraws discoverable names.
///
/// Withdrawal is fire-and-forget: `shutdown` returning does not mean the
/// name has disappeared from the network. Callers wait out a settle delay
/// before reusing the name.
#[async_trait]
pub trait Advertiser: Send + Sync + 'static {
    /// Opaque token for a live registration.
    type Handle: Send + 'static;

    /// Advertise `name` for `service_type` on `host:port`.
    async fn register(
        &self,
        name: &str,
        service_type: &str,
        port: u16,
        host: &str,
    ) -> Result<Self::Handle>;

    /// Ask for the registration behind `handle` to be withdrawn.
    async fn shutdown(&self, handle: Self::Handle);
}
