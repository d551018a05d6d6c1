use std::time::Duration;

use crate::egress::EgressTarget;
use crate::error::ProbeError;

/// Fetched bodies are cut to this many characters before leaving the
/// service, to bound response size and avoid reflecting arbitrary content.
pub const BODY_PREVIEW_CHARS: usize = 500;

const PUBLIC_IP_PROBE_URL: &str = "https://api.ipify.org";

pub struct FetchSummary {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body_preview: String,
}

/// Outbound GET client for caller-supplied, guard-cleared URLs.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Automatic redirects stay disabled so a cleared URL cannot bounce to
    /// a blocked target after authorization.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Internal(format!("outbound HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// One GET, one response, truncated body. Transport faults and timeouts
    /// come back as `Remote` for the handler to report inline.
    pub async fn fetch(&self, target: &EgressTarget) -> Result<FetchSummary, ProbeError> {
        let response = self
            .client
            .get(target.raw())
            .send()
            .await
            .map_err(|e| ProbeError::Remote(e.to_string()))?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Remote(e.to_string()))?;

        Ok(FetchSummary {
            status_code,
            content_type,
            body_preview: truncate_chars(&body, BODY_PREVIEW_CHARS),
        })
    }

    /// Best-effort lookup of the address this service egresses from.
    pub async fn public_ip(&self) -> Option<String> {
        let response = self.client.get(PUBLIC_IP_PROBE_URL).send().await.ok()?;
        let text = response.error_for_status().ok()?.text().await.ok()?;
        Some(text.trim().to_string())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_pass_through() {
        assert_eq!(truncate_chars("hello", 500), "hello");
        assert_eq!(truncate_chars("", 500), "");
    }

    #[test]
    fn long_bodies_are_cut_at_the_char_limit() {
        let body = "x".repeat(1200);
        assert_eq!(truncate_chars(&body, BODY_PREVIEW_CHARS).len(), 500);
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let body = "é".repeat(600);
        let preview = truncate_chars(&body, BODY_PREVIEW_CHARS);
        assert_eq!(preview.chars().count(), 500);
    }
}
