//! Live capture via `pnet::datalink`

use std::io;
use std::time::{Duration, SystemTime};

use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};

use crate::normalize::LinkType;

use super::source::{CaptureError, CapturedFrame, FrameSource};

/// Live capture options
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface to bind (e.g. "eth0")
    pub interface: String,

    /// Put the interface into promiscuous mode
    pub promiscuous: bool,

    /// Upper bound on a blocking read, so shutdown is noticed promptly
    pub read_timeout: Duration,

    /// Kernel read buffer size in bytes
    pub read_buffer_size: usize,
}

impl CaptureConfig {
    /// Create a config for the given interface with default options
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            promiscuous: true,
            read_timeout: Duration::from_millis(250),
            read_buffer_size: 64 * 1024, // 64KB
        }
    }

    /// Enable or disable promiscuous mode
    pub fn promiscuous(mut self, enabled: bool) -> Self {
        self.promiscuous = enabled;
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Frame source bound to a live network interface
pub struct DatalinkSource {
    interface: String,
    rx: Box<dyn DataLinkReceiver>,
}

impl DatalinkSource {
    /// Open the interface named in `config`
    ///
    /// Fails if the interface does not exist or cannot be opened (typically
    /// for lack of privileges).
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let interface = find_interface(&config.interface)
            .ok_or_else(|| CaptureError::InterfaceNotFound(config.interface.clone()))?;

        let dl_config = datalink::Config {
            read_timeout: Some(config.read_timeout),
            read_buffer_size: config.read_buffer_size,
            promiscuous: config.promiscuous,
            ..Default::default()
        };

        let rx = match datalink::channel(&interface, dl_config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            #[allow(unreachable_patterns)]
            Ok(_) => return Err(CaptureError::UnsupportedChannel(interface.name)),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(CaptureError::PermissionDenied {
                    interface: interface.name,
                });
            }
            Err(e) => {
                return Err(CaptureError::Open {
                    interface: interface.name,
                    source: e,
                });
            }
        };

        tracing::info!(
            interface = %interface.name,
            promiscuous = config.promiscuous,
            "Capture interface opened"
        );

        Ok(Self {
            interface: interface.name,
            rx,
        })
    }

    /// Name of the bound interface
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameSource for DatalinkSource {
    fn link_type(&self) -> LinkType {
        // pnet presents every channel it opens as Ethernet framing
        LinkType::Ethernet
    }

    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, CaptureError> {
        match self.rx.next() {
            Ok(data) => Ok(Some(CapturedFrame::new(data, SystemTime::now()))),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Err(CaptureError::Timeout)
            }
            Err(e) => Err(CaptureError::Io(e)),
        }
    }
}

/// All interfaces visible to the capture facility
pub fn list_interfaces() -> Vec<NetworkInterface> {
    datalink::interfaces()
}

fn find_interface(name: &str) -> Option<NetworkInterface> {
    datalink::interfaces().into_iter().find(|iface| iface.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capture_config() {
        let config = CaptureConfig::new("eth0");

        assert_eq!(config.interface, "eth0");
        assert!(config.promiscuous);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_capture_config_builder() {
        let config = CaptureConfig::new("wlan0")
            .promiscuous(false)
            .read_timeout(Duration::from_secs(1));

        assert!(!config.promiscuous);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_open_unknown_interface() {
        let config = CaptureConfig::new("netwatch-does-not-exist0");

        assert!(matches!(
            DatalinkSource::open(&config),
            Err(CaptureError::InterfaceNotFound(name)) if name == "netwatch-does-not-exist0"
        ));
    }
}
