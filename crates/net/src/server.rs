//! HTTP server for the mail/OTP service
//!
//! Issues and verifies signup codes, sends welcome mail and answers the
//! warmup probe. A background task sweeps expired challenges until the
//! server is shut down.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use citiverse_core::validation::is_valid_email;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mailer::{Mailer, OutgoingMail};
use crate::otp::OtpStore;
use crate::protocol::{
    ApiResponse, SendOtpRequest, VerifyOtpRequest, WarmupResponse, WelcomeRequest,
};

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub otp_validity_secs: i64,
    pub code_length: u32,
    pub sweep_interval_secs: u64,
    /// Allow cross-origin requests from any site
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            otp_validity_secs: 300,
            code_length: 6,
            sweep_interval_secs: 30,
            permissive_cors: true,
        }
    }
}

pub type SharedMailer = Arc<dyn Mailer + Send + Sync>;

/// State shared by every handler
#[derive(Clone)]
struct ServiceState {
    otps: Arc<Mutex<OtpStore>>,
    mailer: SharedMailer,
}

/// Mail/OTP server handle
pub struct OtpServer {
    addr: SocketAddr,
    otps: Arc<Mutex<OtpStore>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl OtpServer {
    /// Bind and start serving. Port 0 picks a free port.
    pub async fn start(config: ServerConfig, mailer: SharedMailer) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        let otps = Arc::new(Mutex::new(OtpStore::new(
            chrono::Duration::seconds(config.otp_validity_secs),
            config.code_length,
        )));
        let state = ServiceState {
            otps: otps.clone(),
            mailer,
        };

        let mut app = router(state);
        if config.permissive_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                error!(error = %e, "Server stopped with error");
            }
        });

        let interval = std::time::Duration::from_secs(config.sweep_interval_secs.max(1));
        tokio::spawn(sweep_task(otps.clone(), interval, shutdown_tx.subscribe()));

        info!(addr = %bound_addr, "Mail/OTP server started");

        Ok(OtpServer {
            addr: bound_addr,
            otps,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of challenges currently held
    pub async fn pending_challenges(&self) -> usize {
        self.otps.lock().await.len()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/send-welcome", post(send_welcome))
        .route("/warmup", get(warmup))
        .with_state(state)
}

async fn send_otp(
    State(state): State<ServiceState>,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse>> {
    let email = req.email.trim();
    if !is_valid_email(email) {
        return Err(Error::InvalidEmail);
    }

    let (code, validity) = {
        let mut otps = state.otps.lock().await;
        (otps.issue(email, Utc::now()), otps.validity())
    };

    let mail = OutgoingMail::otp(email, &code, validity.num_minutes().max(1));
    if let Err(e) = deliver(&state.mailer, mail).await {
        warn!(email = %email, error = %e, "OTP dispatch failed");
        state.otps.lock().await.revoke(email);
        return Err(e);
    }

    info!(email = %email, "OTP sent");
    Ok(Json(ApiResponse::ok("OTP sent")))
}

/// Run the mailer on the blocking pool; SMTP sends wait on the relay
async fn deliver(mailer: &SharedMailer, mail: OutgoingMail) -> Result<()> {
    let mailer = Arc::clone(mailer);
    tokio::task::spawn_blocking(move || mailer.send(&mail))
        .await
        .map_err(|e| Error::Mail(e.to_string()))?
}

async fn verify_otp(
    State(state): State<ServiceState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse>> {
    let verified = state
        .otps
        .lock()
        .await
        .verify(&req.email, &req.otp, Utc::now());

    if verified {
        info!(email = %req.email.trim(), "OTP verified");
        Ok(Json(ApiResponse::ok("")))
    } else {
        debug!(email = %req.email.trim(), "OTP rejected");
        Err(Error::InvalidOrExpired)
    }
}

async fn send_welcome(
    State(state): State<ServiceState>,
    Json(req): Json<WelcomeRequest>,
) -> Result<Json<ApiResponse>> {
    let email = req.email.trim();
    if !is_valid_email(email) {
        return Err(Error::InvalidEmail);
    }

    if let Err(e) = deliver(&state.mailer, OutgoingMail::welcome(email, &req.name)).await {
        warn!(email = %email, error = %e, "Welcome mail failed");
        return Err(e);
    }
    Ok(Json(ApiResponse::ok("Welcome email sent")))
}

async fn warmup() -> Json<WarmupResponse> {
    Json(WarmupResponse {
        status: "ok".to_string(),
    })
}

/// Periodically evict expired and consumed challenges
async fn sweep_task(
    otps: Arc<Mutex<OtpStore>>,
    interval: std::time::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let removed = otps.lock().await.sweep(Utc::now());
                if removed > 0 {
                    debug!(removed, "Swept OTP challenges");
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Sweep task shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MemoryMailer;

    async fn start(mailer: Arc<MemoryMailer>) -> (OtpServer, String) {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = OtpServer::start(config, mailer).await.unwrap();
        let base = format!("http://127.0.0.1:{}", server.addr().port());
        (server, base)
    }

    #[tokio::test]
    async fn test_server_start() {
        let (server, base) = start(Arc::new(MemoryMailer::new())).await;
        assert!(server.addr().port() > 0);

        let body: WarmupResponse = reqwest::get(format!("{}/warmup", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.status, "ok");
        server.shutdown();
    }

    #[tokio::test]
    async fn test_send_then_verify() {
        let mailer = Arc::new(MemoryMailer::new());
        let (server, base) = start(mailer.clone()).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}/send-otp", base))
            .json(&SendOtpRequest {
                email: "asha@example.com".into(),
            })
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(server.pending_challenges().await, 1);

        let code = mailer.last_code_for("asha@example.com").unwrap();

        let wrong = http
            .post(format!("{}/verify-otp", base))
            .json(&VerifyOtpRequest {
                email: "asha@example.com".into(),
                otp: "not-a-code".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: ApiResponse = wrong.json().await.unwrap();
        assert_eq!(body.message, "Invalid or expired OTP");

        let ok = http
            .post(format!("{}/verify-otp", base))
            .json(&VerifyOtpRequest {
                email: "asha@example.com".into(),
                otp: code.clone(),
            })
            .send()
            .await
            .unwrap();
        assert!(ok.status().is_success());
        assert!(ok.json::<ApiResponse>().await.unwrap().success);

        // Consumed
        let again = http
            .post(format!("{}/verify-otp", base))
            .json(&VerifyOtpRequest {
                email: "asha@example.com".into(),
                otp: code,
            })
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), reqwest::StatusCode::BAD_REQUEST);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let mailer = Arc::new(MemoryMailer::new());
        let (server, base) = start(mailer.clone()).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/send-otp", base))
            .json(&SendOtpRequest {
                email: "not-an-email".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(mailer.sent().is_empty());
        server.shutdown();
    }

    #[tokio::test]
    async fn test_mail_failure_revokes_challenge() {
        let (server, base) = start(Arc::new(MemoryMailer::failing())).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/send-otp", base))
            .json(&SendOtpRequest {
                email: "asha@example.com".into(),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(server.pending_challenges().await, 0);
        server.shutdown();
    }
}
