use std::net::IpAddr;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Relay-gated WebRTC ingest gateway")]
pub struct Cli {
    /// Signaling endpoint TCP port
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Shared ICE multiplexer UDP port
    #[arg(long)]
    pub mux_port: Option<u16>,

    /// TURN service UDP port
    #[arg(long)]
    pub turn_port: Option<u16>,

    /// Address relay allocations are bound to
    #[arg(long)]
    pub relay_ip: Option<IpAddr>,

    /// TURN authentication realm
    #[arg(long)]
    pub realm: Option<String>,

    /// TURN host advertised to signaling clients
    #[arg(long)]
    pub turn_host: Option<String>,
}

impl Cli {
    /// Flags win over environment values.
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.mux_port {
            config.mux_port = port;
        }
        if let Some(port) = self.turn_port {
            config.turn_port = port;
        }
        if let Some(ip) = self.relay_ip {
            config.relay_ip = ip;
        }
        if let Some(realm) = self.realm {
            config.realm = realm;
        }
        if let Some(host) = self.turn_host {
            config.turn_host = host;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from(["turnstile", "--http-port", "9090", "--realm", "example.org"]);
        let config = cli.apply(Config::default());
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.realm, "example.org");
        // Untouched values keep their defaults.
        assert_eq!(config.mux_port, 8000);
    }
}
