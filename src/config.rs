use std::env;
use std::net::{IpAddr, Ipv4Addr};

/// Closed interval of UDP ports the TURN relay allocates from.
///
/// The same window is handed to the relay (which draws allocations from it)
/// and to the mux filter (which only passes datagrams sourced from it); the
/// two must come from the same `Config` or no media ever connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortWindow {
    pub min: u16,
    pub max: u16,
}

impl PortWindow {
    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Signaling endpoint TCP port.
    pub http_port: u16,
    /// Shared ICE multiplexer UDP port.
    pub mux_port: u16,
    /// TURN service UDP port.
    pub turn_port: u16,
    /// Address relay allocations are bound to and advertised at.
    pub relay_ip: IpAddr,
    pub relay_ports: PortWindow,
    /// TURN authentication realm.
    pub realm: String,
    /// Host advertised to signaling clients in the `Link` header.
    pub turn_host: String,
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Self {
        let relay_ports = PortWindow {
            min: env::var("TURNSTILE_RELAY_PORT_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            max: env::var("TURNSTILE_RELAY_PORT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5010),
        };

        Self {
            http_port: env::var("TURNSTILE_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8085),
            mux_port: env::var("TURNSTILE_MUX_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            turn_port: env::var("TURNSTILE_TURN_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3478),
            relay_ip: env::var("TURNSTILE_RELAY_IP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            relay_ports,
            realm: env::var("TURNSTILE_REALM").unwrap_or_else(|_| "turnstile.local".to_string()),
            turn_host: env::var("TURNSTILE_TURN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            username: env::var("TURNSTILE_TURN_USER").unwrap_or_else(|_| "username".to_string()),
            password: env::var("TURNSTILE_TURN_PASS").unwrap_or_else(|_| "password".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8085,
            mux_port: 8000,
            turn_port: 3478,
            relay_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            relay_ports: PortWindow {
                min: 5000,
                max: 5010,
            },
            realm: "turnstile.local".to_string(),
            turn_host: "127.0.0.1".to_string(),
            username: "username".to_string(),
            password: "password".to_string(),
        }
    }
}
