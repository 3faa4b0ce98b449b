use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};
use webrtc::api::API;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("webrtc engine rejected the exchange: {0}")]
    Engine(#[from] webrtc::Error),
    #[error("no local description after gathering completed")]
    MissingLocalDescription,
}

/// Engine callbacks forward these to the lifecycle observer in emission
/// order.
#[derive(Debug)]
pub enum SessionEvent {
    IceState(RTCIceConnectionState),
    Track { mime: String },
}

/// One peer connection per signaling request, bound to the shared mux.
pub struct Session {
    pc: Arc<RTCPeerConnection>,
}

impl Session {
    pub async fn new(api: &API) -> Result<Self, SessionError> {
        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await?,
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let tx = events_tx.clone();
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(SessionEvent::IceState(state));
            })
        }));

        let tx = events_tx;
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(SessionEvent::Track {
                    mime: track.codec().capability.mime_type.clone(),
                });
            })
        }));

        spawn_observer(pc.clone(), events_rx);

        Ok(Self { pc })
    }

    /// Drive the offer through the engine in the order it requires: remote
    /// description, answer, local description, gathering barrier. The
    /// completion promise is taken before the answer is created so the
    /// one-shot signal cannot be missed.
    pub async fn answer_offer(&self, offer_sdp: String) -> Result<String, SessionError> {
        let offer = RTCSessionDescription::offer(offer_sdp)?;
        self.pc.set_remote_description(offer).await?;

        let mut gather_complete = self.pc.gathering_complete_promise().await;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer).await?;

        let _ = gather_complete.recv().await;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or(SessionError::MissingLocalDescription)?;
        Ok(local.sdp)
    }

    /// Release the engine resources of a session whose setup failed. ICE
    /// never started for it, so the observer will not do this.
    pub async fn close(&self) {
        if let Err(err) = self.pc.close().await {
            warn!(error = %err, "closing aborted session");
        }
    }
}

/// Watches a session's events after the handshake. On the `failed`
/// transition the peer connection is closed and observation stops, so the
/// release can only happen once. Incoming tracks are recorded, not consumed.
pub(crate) fn spawn_observer(
    pc: Arc<RTCPeerConnection>,
    mut events: UnboundedReceiver<SessionEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::IceState(state) => {
                    info!(%state, "ice connection state changed");
                    match state {
                        RTCIceConnectionState::Failed => {
                            if let Err(err) = pc.close().await {
                                warn!(error = %err, "closing failed session");
                            }
                            break;
                        }
                        RTCIceConnectionState::Closed => break,
                        _ => {}
                    }
                }
                SessionEvent::Track { mime } => {
                    info!(%mime, "incoming media track");
                }
            }
        }
    });
}
