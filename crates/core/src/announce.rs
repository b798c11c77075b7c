//! Service advertisement boundary.
//!
//! Senders find a receiver through DNS-SD: a `_raop._tcp` service named
//! `<hardware-address>@<host-name>` whose TXT record lists the audio
//! capabilities. The mDNS responder itself is an external collaborator
//! plugged in through [`ServiceAnnouncer`]; this module only builds the
//! advertisement and logs what the collaborator reports back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{RaopError, Result};

/// DNS-SD service type for RAOP receivers.
pub const RAOP_SERVICE_TYPE: &str = "_raop._tcp";

/// Port senders expect a RAOP receiver on.
pub const DEFAULT_RAOP_PORT: u16 = 5000;

/// Capability metadata advertised alongside the service.
///
/// 2-channel 16-bit 44.1 kHz audio, PCM/ALAC/AAC codecs, no password,
/// RSA and FairPlay encryption, TCP or UDP transport.
pub const RAOP_TXT_RECORDS: &[(&str, &str)] = &[
    ("txtvers", "1"),
    ("ch", "2"),
    ("cn", "0,1"),
    ("et", "0,1"),
    ("sv", "false"),
    ("da", "true"),
    ("sr", "44100"),
    ("ss", "16"),
    ("pw", "false"),
    ("vn", "3"),
    ("tp", "TCP,UDP"),
    ("md", "0,1,2"),
    ("vs", "130.14"),
    ("sm", "false"),
    ("ek", "1"),
];

/// A 48-bit hardware (MAC) address identifying the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddr(pub [u8; 6]);

impl HardwareAddr {
    /// Lowercase hex without separators, as used in the service name.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Parse `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`, or 12 bare hex digits.
impl FromStr for HardwareAddr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid hardware address: {}", s));
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("invalid hardware address: {}", s))?;
        }
        Ok(HardwareAddr(bytes))
    }
}

/// What gets published to the discovery collaborator.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvertisement {
    pub name: String,
    pub service_type: String,
    pub port: u16,
    /// TXT key/value pairs, in publication order.
    pub txt: Vec<(String, String)>,
}

impl ServiceAdvertisement {
    /// The standard RAOP advertisement for this device.
    pub fn raop(hardware_addr: HardwareAddr, host_name: &str, port: u16) -> Self {
        Self {
            name: format!("{}@{}", hardware_addr.to_hex(), host_name),
            service_type: RAOP_SERVICE_TYPE.to_string(),
            port,
            txt: RAOP_TXT_RECORDS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn txt_value(&self, key: &str) -> Option<&str> {
        self.txt
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome reported asynchronously by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    Registered { name: String, domain: String },
    Removed { name: String, domain: String },
    /// The registration is no longer active.
    Failed { error: String },
}

/// Callback handed to the collaborator for registration outcomes.
pub type RegistrationCallback = Arc<dyn Fn(RegistrationEvent) + Send + Sync>;

/// A DNS-SD responder able to publish one advertisement.
pub trait ServiceAnnouncer: Send {
    /// Start publishing. Later outcomes are delivered through `on_event`.
    fn register(
        &mut self,
        advertisement: &ServiceAdvertisement,
        on_event: RegistrationCallback,
    ) -> Result<()>;

    /// Withdraw the advertisement.
    fn deregister(&mut self) -> Result<()>;
}

/// Log a registration outcome. Failures are not retried.
pub fn log_registration_event(event: &RegistrationEvent) {
    match event {
        RegistrationEvent::Registered { name, domain } => {
            tracing::info!(%name, %domain, "RAOP service registered");
        }
        RegistrationEvent::Removed { name, domain } => {
            tracing::info!(%name, %domain, "RAOP service removed");
        }
        RegistrationEvent::Failed { error } => {
            tracing::error!(%error, "RAOP service registration failed");
        }
    }
}

/// Register `advertisement`, routing outcomes to [`log_registration_event`].
pub fn announce(
    announcer: &mut dyn ServiceAnnouncer,
    advertisement: &ServiceAdvertisement,
) -> Result<()> {
    let on_event: RegistrationCallback =
        Arc::new(|event: RegistrationEvent| log_registration_event(&event));
    announcer
        .register(advertisement, on_event)
        .map_err(|e| match e {
            RaopError::Announce(_) => e,
            other => RaopError::Announce(other.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        published: Vec<ServiceAdvertisement>,
        withdrawn: bool,
        fail: bool,
        events: Arc<Mutex<Vec<RegistrationEvent>>>,
    }

    impl ServiceAnnouncer for Recording {
        fn register(
            &mut self,
            advertisement: &ServiceAdvertisement,
            on_event: RegistrationCallback,
        ) -> Result<()> {
            if self.fail {
                return Err(RaopError::Announce("name conflict".into()));
            }
            self.published.push(advertisement.clone());
            let event = RegistrationEvent::Registered {
                name: advertisement.name.clone(),
                domain: "local.".into(),
            };
            self.events.lock().push(event.clone());
            on_event(event);
            Ok(())
        }

        fn deregister(&mut self) -> Result<()> {
            self.withdrawn = true;
            Ok(())
        }
    }

    #[test]
    fn parse_hardware_addr() {
        let addr: HardwareAddr = "00:1A:2b:3c:4D:5e".parse().unwrap();
        assert_eq!(addr.0, [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        assert_eq!(addr.to_hex(), "001a2b3c4d5e");
        assert_eq!(addr.to_string(), "00:1a:2b:3c:4d:5e");
        assert_eq!("00-1a-2b-3c-4d-5e".parse::<HardwareAddr>().unwrap(), addr);
        assert_eq!("001a2b3c4d5e".parse::<HardwareAddr>().unwrap(), addr);
    }

    #[test]
    fn reject_bad_hardware_addr() {
        assert!("00:1a:2b".parse::<HardwareAddr>().is_err());
        assert!("zz:1a:2b:3c:4d:5e".parse::<HardwareAddr>().is_err());
        assert!("+12a3b4c5d6e".parse::<HardwareAddr>().is_err());
        assert!("+1:2a:3b:4c:5d:6e".parse::<HardwareAddr>().is_err());
        assert!("00:1a:2b:3c:4d:5é".parse::<HardwareAddr>().is_err());
    }

    #[test]
    fn raop_advertisement() {
        let ad = ServiceAdvertisement::raop(
            HardwareAddr([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
            "kitchen",
            DEFAULT_RAOP_PORT,
        );
        assert_eq!(ad.name, "deadbeef0001@kitchen");
        assert_eq!(ad.service_type, "_raop._tcp");
        assert_eq!(ad.port, 5000);
        assert_eq!(ad.txt.len(), 15);
        assert_eq!(ad.txt[0], ("txtvers".to_string(), "1".to_string()));
        assert_eq!(ad.txt_value("sr"), Some("44100"));
        assert_eq!(ad.txt_value("tp"), Some("TCP,UDP"));
        assert_eq!(ad.txt_value("ek"), Some("1"));
        assert_eq!(ad.txt_value("missing"), None);
    }

    #[test]
    fn announce_forwards_to_collaborator() {
        let ad = ServiceAdvertisement::raop(HardwareAddr([1; 6]), "host", 5000);
        let mut announcer = Recording::default();
        announce(&mut announcer, &ad).unwrap();
        assert_eq!(announcer.published, vec![ad.clone()]);
        assert_eq!(announcer.events.lock().len(), 1);
        announcer.deregister().unwrap();
        assert!(announcer.withdrawn);

        let mut failing = Recording {
            fail: true,
            ..Recording::default()
        };
        assert!(matches!(
            announce(&mut failing, &ad),
            Err(RaopError::Announce(_))
        ));
        assert!(failing.published.is_empty());
    }
}
