use catio_core::ams::{AmsAddr, AmsNetId, port};
use std::time::Duration;

/// Tunables of a client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The AMS address this client identifies as. The port should be
    /// ephemeral, at or above [`port::LOCAL_MIN`].
    pub local: AmsAddr,
    /// Host name sent in the discovery payload.
    pub host_name: String,
    /// Dotted-decimal IP sent in the discovery payload.
    pub host_ip: String,
    /// Deadline for a single request/response round trip.
    pub request_timeout: Duration,
    /// Deadline for one introspection phase (device scan, slave scan).
    pub introspect_timeout: Duration,
    /// Deadline for one UDP route-negotiation exchange.
    pub route_timeout: Duration,
    /// How often buffered notification samples are flushed to consumers.
    pub flush_interval: Duration,
    /// Per-handle sample buffer capacity. When full, the oldest samples are
    /// dropped and the consumer sees an overflow on its next read.
    pub notification_buffer: usize,
}

impl ClientConfig {
    /// Creates a config with defaults for everything but the local identity.
    pub fn new(local_net_id: AmsNetId, host_ip: impl Into<String>) -> Self {
        Self {
            local: AmsAddr::new(local_net_id, port::LOCAL_MIN),
            host_name: "catio".to_string(),
            host_ip: host_ip.into(),
            request_timeout: Duration::from_secs(10),
            introspect_timeout: Duration::from_secs(30),
            route_timeout: Duration::from_secs(5),
            flush_interval: Duration::from_millis(50),
            notification_buffer: 1024,
        }
    }

    /// Sets the local AMS port.
    pub fn with_local_port(mut self, ams_port: u16) -> Self {
        self.local = self.local.with_port(ams_port);
        self
    }

    /// Sets the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new(AmsNetId::new(10, 0, 0, 2, 1, 1), "10.0.0.2");
        assert_eq!(config.local.port(), port::LOCAL_MIN);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.introspect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::new(AmsNetId::new(10, 0, 0, 2, 1, 1), "10.0.0.2")
            .with_local_port(8001)
            .with_request_timeout(Duration::from_secs(2));
        assert_eq!(config.local.port(), 8001);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }
}
