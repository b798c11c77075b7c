pub mod announce;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use announce::{HardwareAddr, ServiceAdvertisement, ServiceAnnouncer};
pub use error::{ParseErrorKind, RaopError, Result};
pub use protocol::{RaopRequest, RaopResponse, Router};
pub use server::{Server, ServerConfig};
