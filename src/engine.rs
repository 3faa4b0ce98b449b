use std::io;
use std::net::Ipv4Addr;

use tokio::net::UdpSocket;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice::udp_mux::{UDPMuxDefault, UDPMuxParams};
use webrtc::ice::udp_network::UDPNetwork;
use webrtc::interceptor::registry::Registry;

use crate::filter::RelayGate;

/// Bind the shared ICE multiplexer socket.
pub async fn bind_mux(port: u16) -> io::Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await
}

/// Build the one shared engine handle. Every session is created from this
/// API, so all ICE traffic for all sessions runs over the gated mux socket
/// and no per-session socket allocation occurs. The gate must already wrap
/// the socket when the mux is constructed.
pub fn build_api(gate: RelayGate) -> Result<API, webrtc::Error> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    let mut setting = SettingEngine::default();
    let mux = UDPMuxDefault::new(UDPMuxParams::new(gate));
    setting.set_udp_network(UDPNetwork::Muxed(mux));

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(setting)
        .build())
}
