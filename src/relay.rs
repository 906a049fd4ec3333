//! Allow-listed image relay.
//!
//! The relay exists so that exported canvases can read back pixels of images
//! hosted on the template storage domain. The prefix check in
//! [`RelayPolicy::check`] is what keeps it from being an open proxy.

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect;
use tracing::{debug, warn};

pub const RELAY_PATH: &str = "/api/image-proxy";
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
pub const CACHE_CONTROL: &str = "public, max-age=86400, s-maxage=86400";
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRejection {
    MissingUrl,
    UntrustedUrl,
}

impl RelayRejection {
    pub fn status(self) -> StatusCode {
        match self {
            RelayRejection::MissingUrl => StatusCode::BAD_REQUEST,
            RelayRejection::UntrustedUrl => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RelayRejection::MissingUrl => "Missing url parameter",
            RelayRejection::UntrustedUrl => "Invalid URL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayPolicy {
    allowed_prefix: String,
}

impl RelayPolicy {
    pub fn new(allowed_prefix: impl Into<String>) -> Self {
        Self {
            allowed_prefix: allowed_prefix.into(),
        }
    }

    pub fn allowed_prefix(&self) -> &str {
        &self.allowed_prefix
    }

    pub fn check<'a>(&self, url: Option<&'a str>) -> Result<&'a str, RelayRejection> {
        let url = url.unwrap_or_default();
        if url.is_empty() {
            return Err(RelayRejection::MissingUrl);
        }
        if self.allowed_prefix.is_empty() || !url.starts_with(&self.allowed_prefix) {
            return Err(RelayRejection::UntrustedUrl);
        }
        Ok(url)
    }
}

#[derive(Debug)]
pub enum RelayFailure {
    /// Upstream answered with a non-success status; passed through verbatim.
    Upstream(StatusCode),
    /// Upstream body is larger than the relay's byte cap.
    TooLarge { limit: usize },
    /// Transport or body read failure.
    Transport(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RelayedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ImageRelay {
    client: reqwest::Client,
    policy: RelayPolicy,
    max_bytes: usize,
}

impl ImageRelay {
    /// Builds the relay with its own HTTP client. Redirects are followed only
    /// while they stay under the allowed prefix.
    pub fn new(policy: RelayPolicy, user_agent: &str) -> Result<Self> {
        let prefix = policy.allowed_prefix().to_string();
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= 5 {
                    attempt.stop()
                } else if attempt.url().as_str().starts_with(&prefix) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .with_context(|| "failed to build relay http client")?;
        Ok(Self {
            client,
            policy,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Fetches an already validated URL.
    pub async fn fetch(&self, url: &str) -> Result<RelayedImage, RelayFailure> {
        debug!("relaying {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RelayFailure::Transport(anyhow!(err)))?;
        let status = response.status();
        if !status.is_success() {
            warn!("relay upstream returned {} for {}", status, url);
            return Err(RelayFailure::Upstream(status));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let limit = self.max_bytes;
        if response
            .content_length()
            .is_some_and(|length| length > limit as u64)
        {
            warn!("relay upstream body too large for {}", url);
            return Err(RelayFailure::TooLarge { limit });
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| RelayFailure::Transport(anyhow!(err)))?
        {
            if bytes.len() + chunk.len() > limit {
                warn!("relay upstream body exceeded {} bytes for {}", limit, url);
                return Err(RelayFailure::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(RelayedImage {
            content_type,
            bytes,
        })
    }
}

/// Absolute relay URL on `site_base` for the given image URL, with the image
/// URL percent-encoded into the `url` query parameter.
pub fn relay_url(site_base: &str, image_url: &str) -> Result<String> {
    let base = reqwest::Url::parse(site_base)
        .with_context(|| format!("invalid site base url: {}", site_base))?;
    let mut url = base
        .join(RELAY_PATH)
        .with_context(|| "failed to build relay url")?;
    url.query_pairs_mut().clear().append_pair("url", image_url);
    Ok(url.to_string())
}

/// Origin-relative form of [`relay_url`], used by pages served from the relay's own host.
pub fn relay_path(image_url: &str) -> Result<String> {
    let url = reqwest::Url::parse(&relay_url("http://localhost", image_url)?)
        .with_context(|| "failed to parse relay url")?;
    Ok(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RelayPolicy {
        RelayPolicy::new("https://firebasestorage.googleapis.com/")
    }

    #[test]
    fn missing_url_is_a_bad_request() {
        assert_eq!(policy().check(None), Err(RelayRejection::MissingUrl));
        assert_eq!(policy().check(Some("")), Err(RelayRejection::MissingUrl));
        assert_eq!(RelayRejection::MissingUrl.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn untrusted_hosts_are_forbidden() {
        let policy = policy();
        for url in [
            "https://evil.example/x.png",
            "http://firebasestorage.googleapis.com/x.png",
            "https://firebasestorage.googleapis.com.evil.example/x.png",
            " https://firebasestorage.googleapis.com/x.png",
        ] {
            assert_eq!(policy.check(Some(url)), Err(RelayRejection::UntrustedUrl), "{}", url);
        }
        assert_eq!(RelayRejection::UntrustedUrl.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn empty_prefix_allows_nothing() {
        let policy = RelayPolicy::new("");
        assert_eq!(
            policy.check(Some("https://firebasestorage.googleapis.com/x.png")),
            Err(RelayRejection::UntrustedUrl)
        );
    }

    #[test]
    fn trusted_url_passes() {
        let url = "https://firebasestorage.googleapis.com/v0/b/memes/o/drake.jpg?alt=media";
        assert_eq!(policy().check(Some(url)), Ok(url));
    }

    /// One-shot upstream that streams `chunks` without a Content-Length.
    async fn chunked_upstream(chunks: usize, chunk_len: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let mut response = b"HTTP/1.1 200 OK\r\ncontent-type: image/png\r\n\
                transfer-encoding: chunked\r\nconnection: close\r\n\r\n"
                .to_vec();
            for _ in 0..chunks {
                response.extend_from_slice(format!("{:x}\r\n", chunk_len).as_bytes());
                response.extend(std::iter::repeat_n(b'x', chunk_len));
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"0\r\n\r\n");
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn streamed_body_is_capped_without_content_length() {
        let upstream = chunked_upstream(4, 512).await;
        let relay = ImageRelay::new(RelayPolicy::new(upstream.clone()), "test")
            .expect("relay")
            .with_max_bytes(1500);
        match relay.fetch(&format!("{}big.png", upstream)).await {
            Err(RelayFailure::TooLarge { limit }) => assert_eq!(limit, 1500),
            other => panic!("unexpected result: {:?}", other),
        }

        let upstream = chunked_upstream(2, 512).await;
        let relay = ImageRelay::new(RelayPolicy::new(upstream.clone()), "test")
            .expect("relay")
            .with_max_bytes(1500);
        let image = relay
            .fetch(&format!("{}small.png", upstream))
            .await
            .expect("fetch");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.bytes.len(), 1024);
    }

    #[test]
    fn relay_url_encodes_the_image_url() {
        let url = relay_url(
            "https://dankdrafts.com",
            "https://firebasestorage.googleapis.com/v0/o/a b.png?alt=media&token=1",
        )
        .expect("relay url");
        assert_eq!(
            url,
            "https://dankdrafts.com/api/image-proxy?url=https%3A%2F%2Ffirebasestorage.googleapis.com%2Fv0%2Fo%2Fa+b.png%3Falt%3Dmedia%26token%3D1"
        );
    }

    #[test]
    fn relay_path_is_origin_relative() {
        let path =
            relay_path("https://firebasestorage.googleapis.com/drake.jpg").expect("relay path");
        assert_eq!(
            path,
            "/api/image-proxy?url=https%3A%2F%2Ffirebasestorage.googleapis.com%2Fdrake.jpg"
        );
    }
}
