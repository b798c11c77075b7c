use std::ffi::OsString;
use std::io;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use raop::announce::{
    DEFAULT_RAOP_PORT, RegistrationCallback, RegistrationEvent, ServiceAdvertisement,
    ServiceAnnouncer,
};
use raop::protocol::ParserLimits;
use raop::{HardwareAddr, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "raop-server",
    about = "RAOP receiver answering the FairPlay setup handshake"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_RAOP_PORT)))]
    bind: SocketAddr,

    /// Hardware address used in the advertised service name
    #[arg(long, default_value = "02:00:00:00:00:01")]
    hardware_addr: HardwareAddr,

    /// Host name used in the advertised service name (defaults to the OS host name)
    #[arg(long)]
    host_name: Option<String>,

    /// Per-connection socket timeout, in seconds (0 disables it)
    #[arg(long, default_value_t = 30)]
    read_timeout_secs: u64,

    /// Largest request body accepted, in bytes
    #[arg(long, default_value_t = ParserLimits::default().max_body_len)]
    max_body_len: usize,
}

/// Stands in for a DNS-SD responder: logs what would be published.
struct LogOnlyAnnouncer {
    name: Option<String>,
    on_event: Option<RegistrationCallback>,
}

impl ServiceAnnouncer for LogOnlyAnnouncer {
    fn register(
        &mut self,
        advertisement: &ServiceAdvertisement,
        on_event: RegistrationCallback,
    ) -> raop::Result<()> {
        for (key, value) in &advertisement.txt {
            tracing::debug!(%key, %value, "TXT record");
        }
        tracing::info!(
            name = %advertisement.name,
            service_type = %advertisement.service_type,
            port = advertisement.port,
            "no discovery backend linked; advertisement not broadcast"
        );
        on_event(RegistrationEvent::Registered {
            name: advertisement.name.clone(),
            domain: "local.".to_string(),
        });
        self.name = Some(advertisement.name.clone());
        self.on_event = Some(on_event);
        Ok(())
    }

    fn deregister(&mut self) -> raop::Result<()> {
        if let (Some(name), Some(on_event)) = (self.name.take(), self.on_event.take()) {
            on_event(RegistrationEvent::Removed {
                name,
                domain: "local.".to_string(),
            });
        }
        Ok(())
    }
}

/// Pick the host name for the service name: the flag, else the OS name
/// without any domain suffix, else `localhost`.
fn resolve_host_name(flag: Option<String>, os_name: OsString) -> String {
    flag.filter(|name| !name.trim().is_empty())
        .or_else(|| {
            os_name
                .to_str()
                .and_then(|name| name.split('.').next())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let host_name = resolve_host_name(args.host_name, gethostname::gethostname());

    let config = ServerConfig {
        limits: ParserLimits {
            max_body_len: args.max_body_len,
            ..ParserLimits::default()
        },
        io_timeout: (args.read_timeout_secs > 0)
            .then(|| Duration::from_secs(args.read_timeout_secs)),
        ..ServerConfig::default()
    };

    let advertisement =
        ServiceAdvertisement::raop(args.hardware_addr, &host_name, args.bind.port());
    let mut announcer = LogOnlyAnnouncer {
        name: None,
        on_event: None,
    };
    let mut server = Server::with_config(&args.bind.to_string(), config);

    if let Err(e) = server.start_advertised(&mut announcer, &advertisement) {
        eprintln!("Failed to start server: {}", e);
        return ExitCode::FAILURE;
    }

    println!(
        "RAOP receiver \"{}\" on {}, press Enter to stop",
        advertisement.name, args.bind
    );
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        tracing::warn!(error = %e, "failed to read stdin");
    }

    if let Err(e) = server.stop_advertised(&mut announcer) {
        eprintln!("Failed to withdraw advertisement: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
