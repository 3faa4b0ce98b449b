use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use thiserror::Error;
use tracing::{debug, error};
use webrtc::api::API;

use crate::config::Config;
use crate::session::{Session, SessionError};

/// Upper bound on the SDP offer body.
const MAX_OFFER_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to read offer body: {0}")]
    BodyRead(#[from] axum::Error),
    #[error("offer body is not utf-8: {0}")]
    BodyEncoding(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        // Unrecoverable for this request: log it and terminate with a bare
        // 500. There is no error-body contract beyond the 201 path.
        error!(error = %self, "signaling request failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Startup-time shared state: the one engine handle plus the advertisement
/// header every response carries. Immutable once built.
pub struct AppContext {
    pub api: API,
    pub config: Config,
    link: HeaderValue,
}

pub type SharedContext = Arc<AppContext>;

impl AppContext {
    pub fn new(api: API, config: Config) -> anyhow::Result<Self> {
        let link = HeaderValue::from_str(&ice_server_link(&config))?;
        Ok(Self { api, config, link })
    }
}

pub fn router(ctx: SharedContext) -> Router {
    Router::new().route("/", any(handle_signal)).with_state(ctx)
}

/// `Link` header advertising the TURN relay and its static credential, so
/// clients need no separate discovery step.
pub fn ice_server_link(config: &Config) -> String {
    format!(
        "<turn:{}>; rel=\"ice-server\"; username=\"{}\"; credential=\"{}\";",
        config.turn_host, config.username, config.password
    )
}

fn advert_headers(ctx: &AppContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(header::LINK, ctx.link.clone());
    headers
}

/// The offer/answer exchange, one session per request.
///
/// OPTIONS and DELETE get the advertisement headers and nothing else: no
/// session is created and the body is never read. Teardown is acknowledged
/// but not tracked; session lifecycle is delegated to ICE failure detection.
async fn handle_signal(
    State(ctx): State<SharedContext>,
    request: Request,
) -> Result<Response, SignalError> {
    let headers = advert_headers(&ctx);

    if request.method() == Method::OPTIONS || request.method() == Method::DELETE {
        return Ok(headers.into_response());
    }

    let body = to_bytes(request.into_body(), MAX_OFFER_BYTES).await?;
    let offer = String::from_utf8(body.to_vec())?;

    let session = Session::new(&ctx.api).await?;
    let answer = match session.answer_offer(offer).await {
        Ok(answer) => answer,
        Err(err) => {
            session.close().await;
            return Err(err.into());
        }
    };

    debug!(answer_bytes = answer.len(), "handshake complete");

    let mut headers = headers;
    headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    Ok((StatusCode::CREATED, headers, answer).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    use crate::engine;
    use crate::filter::RelayGate;

    async fn test_context() -> SharedContext {
        let config = Config {
            http_port: 0,
            mux_port: 0,
            turn_port: 0,
            ..Config::default()
        };
        let mux = engine::bind_mux(0).await.expect("bind mux");
        let gate = RelayGate::new(Arc::new(mux), config.relay_ports);
        let api = engine::build_api(gate).expect("build api");
        Arc::new(AppContext::new(api, config).expect("context"))
    }

    fn assert_advertisement(response: &Response) {
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "*"
        );
        let link = headers.get(header::LINK).unwrap().to_str().unwrap();
        assert!(link.contains("rel=\"ice-server\""));
        assert!(link.contains("username=\"username\""));
        assert!(link.contains("credential=\"password\""));
    }

    #[test]
    fn link_header_advertises_relay() {
        let link = ice_server_link(&Config::default());
        assert_eq!(
            link,
            "<turn:127.0.0.1>; rel=\"ice-server\"; username=\"username\"; credential=\"password\";"
        );
    }

    #[tokio::test]
    async fn preflight_and_teardown_carry_headers_and_no_body() {
        let ctx = test_context().await;
        for method in [Method::OPTIONS, Method::DELETE] {
            let response = router(ctx.clone())
                .oneshot(
                    HttpRequest::builder()
                        .method(method)
                        .uri("/")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_advertisement(&response);
            let body = to_bytes(response.into_body(), MAX_OFFER_BYTES)
                .await
                .unwrap();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_offer_fails_without_structured_body() {
        let ctx = test_context().await;
        let response = router(ctx)
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from("not an sdp offer"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), MAX_OFFER_BYTES)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn post_offer_returns_created_answer() {
        let ctx = test_context().await;

        // Stand up a real offerer so the posted SDP is one the engine will
        // actually accept, gathered to completion like a browser's.
        let client_api = APIBuilder::new().build();
        let pc = client_api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .expect("client pc");
        let _dc = pc
            .create_data_channel("probe", None)
            .await
            .expect("data channel");
        let mut gather = pc.gathering_complete_promise().await;
        let offer = pc.create_offer(None).await.expect("offer");
        pc.set_local_description(offer).await.expect("local offer");
        let _ = gather.recv().await;
        let offer_sdp = pc.local_description().await.expect("gathered offer").sdp;

        let response = router(ctx)
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from(offer_sdp))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        assert_advertisement(&response);

        let body = to_bytes(response.into_body(), MAX_OFFER_BYTES)
            .await
            .unwrap();
        let answer = String::from_utf8(body.to_vec()).unwrap();
        assert!(answer.starts_with("v=0"));

        pc.close().await.expect("close client pc");
    }
}
