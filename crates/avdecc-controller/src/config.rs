use std::time::Duration;

use avdecc_frame::consts::acmp_message;
use avdecc_frame::MacAddr;

/// AECP AEM command timing.
#[derive(Debug, Clone)]
pub struct AecpConfig {
    /// Time to wait for a response before retrying. Default: 250 ms.
    pub command_timeout: Duration,
    /// Retransmissions before the request times out. Default: 1.
    pub max_retries: u32,
}

impl Default for AecpConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(250),
            max_retries: 1,
        }
    }
}

impl AecpConfig {
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// ACMP command timing, per message type.
#[derive(Debug, Clone)]
pub struct AcmpConfig {
    /// Default: 4500 ms.
    pub connect_rx_timeout: Duration,
    /// Default: 500 ms.
    pub disconnect_rx_timeout: Duration,
    /// Default: 200 ms.
    pub get_rx_state_timeout: Duration,
    /// Retransmissions before the request times out. Default: 1.
    pub max_retries: u32,
}

impl Default for AcmpConfig {
    fn default() -> Self {
        Self {
            connect_rx_timeout: Duration::from_millis(4500),
            disconnect_rx_timeout: Duration::from_millis(500),
            get_rx_state_timeout: Duration::from_millis(200),
            max_retries: 1,
        }
    }
}

impl AcmpConfig {
    /// Response timeout for a command message type.
    pub fn timeout_for(&self, message_type: u8) -> Duration {
        match message_type {
            acmp_message::CONNECT_RX_COMMAND => self.connect_rx_timeout,
            acmp_message::DISCONNECT_RX_COMMAND => self.disconnect_rx_timeout,
            _ => self.get_rx_state_timeout,
        }
    }

    /// Use the same timeout for every message type.
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        self.connect_rx_timeout = timeout;
        self.disconnect_rx_timeout = timeout;
        self.get_rx_state_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Configuration for a [`Controller`](crate::Controller).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Entity id this controller puts in `controller_entity_id`.
    pub controller_entity_id: u64,
    /// Source MAC of outgoing frames.
    pub controller_mac: MacAddr,
    pub aecp: AecpConfig,
    pub acmp: AcmpConfig,
    /// Period of the background retry timer. Default: 10 ms.
    pub tick_interval: Duration,
}

impl ControllerConfig {
    pub fn new(controller_entity_id: u64, controller_mac: MacAddr) -> Self {
        Self {
            controller_entity_id,
            controller_mac,
            aecp: AecpConfig::default(),
            acmp: AcmpConfig::default(),
            tick_interval: Duration::from_millis(10),
        }
    }

    pub fn with_aecp(mut self, aecp: AecpConfig) -> Self {
        self.aecp = aecp;
        self
    }

    pub fn with_acmp(mut self, acmp: AcmpConfig) -> Self {
        self.acmp = acmp;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new(0, MacAddr::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acmp_timeouts_follow_message_type() {
        let config = AcmpConfig::default();
        assert_eq!(
            config.timeout_for(acmp_message::CONNECT_RX_COMMAND),
            Duration::from_millis(4500)
        );
        assert_eq!(
            config.timeout_for(acmp_message::DISCONNECT_RX_COMMAND),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.timeout_for(acmp_message::GET_RX_STATE_COMMAND),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn builders_override_defaults() {
        let config = ControllerConfig::new(7, MacAddr::ZERO)
            .with_aecp(AecpConfig::default().with_max_retries(3))
            .with_acmp(AcmpConfig::default().with_uniform_timeout(Duration::from_secs(1)))
            .with_tick_interval(Duration::from_millis(5));
        assert_eq!(config.aecp.max_retries, 3);
        assert_eq!(config.aecp.command_timeout, Duration::from_millis(250));
        assert_eq!(
            config.acmp.timeout_for(acmp_message::CONNECT_RX_COMMAND),
            Duration::from_secs(1)
        );
        assert_eq!(config.tick_interval, Duration::from_millis(5));
    }
}
