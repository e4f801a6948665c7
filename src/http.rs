/// Shared HTTP client construction.
///
/// One client is built per run and handed to every stage that talks to the
/// network, so connection pooling and proxy settings are consistent.
use std::time::Duration;

use crate::{config::AppConfig, error::Result};

pub fn build_client(config: &AppConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        // The catalogue serves a challenge page to non-browser agents
        .user_agent(config.user_agent.as_str());

    if let Some(p) = config.proxy.as_deref() {
        if !p.is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(p)?);
        }
    }

    Ok(builder.build()?)
}

/// GET `url` and return the body as text, treating any non-2xx status as a
/// transport failure.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        assert!(build_client(&AppConfig::default()).is_ok());
    }

    #[test]
    fn empty_proxy_is_ignored() {
        let config = AppConfig {
            proxy: Some(String::new()),
            ..AppConfig::default()
        };
        assert!(build_client(&config).is_ok());
    }
}
