// ABOUTME: Direct HTTP/1 probe from the host using a hyper client connection.
// ABOUTME: Any status below 600 counts as the dependency answering.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::error::ProbeError;
use super::probe::{Probe, ProbeMethod, ProbeOutcome, answered};

/// GETs a URL reachable from the host.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Status code of one GET, bounded by the probe timeout.
    pub async fn status(&self) -> Result<u16, ProbeError> {
        tokio::time::timeout(self.timeout, self.request())
            .await
            .map_err(|_| ProbeError::TimedOut(self.timeout))?
    }

    async fn request(&self) -> Result<u16, ProbeError> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|_| ProbeError::InvalidUrl(self.url.clone()))?;
        if uri.scheme_str() != Some("http") {
            return Err(ProbeError::UnsupportedScheme(self.url.clone()));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ProbeError::InvalidUrl(self.url.clone()))?
            .clone();
        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        let port = authority.port_u16().unwrap_or(80);
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        let stream = TcpStream::connect((host, port)).await?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(ProbeError::Handshake)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("probe connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", authority.as_str())
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await.map_err(ProbeError::Request)?;
        Ok(resp.status().as_u16())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> ProbeOutcome {
        match self.status().await {
            Ok(status) if answered(status) => ProbeOutcome::Ready {
                via: ProbeMethod::HostHttp,
                detail: format!("HTTP {status}"),
            },
            Ok(status) => {
                tracing::debug!("{} answered with unusable status {}", self.url, status);
                ProbeOutcome::Pending
            }
            Err(e) => {
                tracing::debug!("{} not reachable: {}", self.url, e);
                ProbeOutcome::Pending
            }
        }
    }
}
