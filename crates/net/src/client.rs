//! HTTP client for the mail/OTP service

use reqwest::StatusCode;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::protocol::{
    ApiResponse, SendOtpRequest, VerifyOtpRequest, WarmupResponse, WelcomeRequest,
};

/// Client handle for the mail/OTP endpoints
#[derive(Debug, Clone)]
pub struct OtpClient {
    http: reqwest::Client,
    base_url: String,
}

impl OtpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the service to mail a fresh code
    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/send-otp"))
            .json(&SendOtpRequest {
                email: email.to_string(),
            })
            .send()
            .await?;

        let status = resp.status();
        let body: ApiResponse = resp.json().await?;
        match status {
            s if s.is_success() && body.success => {
                info!("OTP requested");
                Ok(())
            }
            StatusCode::BAD_REQUEST => Err(Error::InvalidEmail),
            StatusCode::BAD_GATEWAY => Err(Error::Mail(body.message)),
            _ => Err(Error::Rejected(body.message)),
        }
    }

    /// Submit a code. Wrong and expired codes both come back as
    /// [`Error::InvalidOrExpired`].
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/verify-otp"))
            .json(&VerifyOtpRequest {
                email: email.to_string(),
                otp: otp.to_string(),
            })
            .send()
            .await?;

        let status = resp.status();
        let body: ApiResponse = resp.json().await?;
        if status.is_success() && body.success {
            Ok(())
        } else if status == StatusCode::BAD_REQUEST {
            debug!("Code rejected");
            Err(Error::InvalidOrExpired)
        } else {
            Err(Error::Rejected(body.message))
        }
    }

    #[instrument(skip(self))]
    pub async fn send_welcome(&self, email: &str, name: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/send-welcome"))
            .json(&WelcomeRequest {
                email: email.to_string(),
                name: name.to_string(),
            })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body: ApiResponse = resp.json().await?;
        Err(Error::Rejected(body.message))
    }

    /// Latency probe; wakes an idle service
    pub async fn warmup(&self) -> Result<()> {
        let body: WarmupResponse = self
            .http
            .get(self.url("/warmup"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(status = %body.status, "Warmup answered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mailer::MemoryMailer;
    use crate::server::{OtpServer, ServerConfig};

    async fn start(mailer: Arc<MemoryMailer>) -> (OtpServer, OtpClient) {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = OtpServer::start(config, mailer).await.unwrap();
        let client = OtpClient::new(format!("http://127.0.0.1:{}/", server.addr().port()));
        (server, client)
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = OtpClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let mailer = Arc::new(MemoryMailer::new());
        let (server, client) = start(mailer.clone()).await;

        client.warmup().await.unwrap();
        client.send_otp("ravi@example.com").await.unwrap();

        let code = mailer.last_code_for("ravi@example.com").unwrap();
        assert!(matches!(
            client.verify_otp("ravi@example.com", "nope").await,
            Err(Error::InvalidOrExpired)
        ));
        client.verify_otp("ravi@example.com", &code).await.unwrap();

        client.send_welcome("ravi@example.com", "Ravi").await.unwrap();
        assert_eq!(mailer.sent().len(), 2);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_client_maps_errors() {
        let (server, client) = start(Arc::new(MemoryMailer::failing())).await;

        assert!(matches!(client.send_otp("bad").await, Err(Error::InvalidEmail)));
        assert!(matches!(
            client.send_otp("ravi@example.com").await,
            Err(Error::Mail(_))
        ));

        server.shutdown();
    }
}
