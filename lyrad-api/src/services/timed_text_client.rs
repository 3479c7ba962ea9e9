//! Multi-account timed-text upstream client
//!
//! Wraps the account pool and the token scraper behind one `get`. Requests
//! rotate through the pool round-robin; a 401 counts as an account failure,
//! a 429 counts a failure and force-skips the account, and both retry on
//! the next account after a growing pause. At most three retries.

use crate::accounts::{Account, AccountPool};
use crate::services::token_scraper::TokenScraper;
use lyrad_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;
const ORIGIN: &str = "https://music.apple.com";
const REFERER: &str = "https://music.apple.com/";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared client for the timed-text provider's catalog endpoints
pub struct TimedTextClient {
    http: reqwest::Client,
    pool: Arc<AccountPool>,
    scraper: Arc<TokenScraper>,
}

impl TimedTextClient {
    pub fn new(pool: Arc<AccountPool>, scraper: Arc<TokenScraper>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build timed-text http client");
        Self { http, pool, scraper }
    }

    /// GET `url_template` with auth headers, rotating accounts on 401/429.
    ///
    /// The template may contain `{storefront}`, substituted per attempt
    /// from the account in use. Returns the response body on 200.
    pub async fn get(&self, url_template: &str) -> Result<String> {
        let mut account = self.pool.current().await?;

        for attempt in 0..=MAX_RETRIES {
            let token = self.scraper.bearer().await?;
            let url = url_template.replace("{storefront}", &account.storefront);
            debug!(account = %account.name, attempt, url = %url, "timed-text request");

            let response = match self.send(&url, &token, &account).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(account = %account.name, error = %e, "timed-text transport failure");
                    self.pool.report_failure(&account.name).await;
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                        account = self.pool.next_account().await?;
                        continue;
                    }
                    return Err(Error::UpstreamError { status: 0, body: e.to_string() });
                }
            };

            let status = response.status().as_u16();
            match status {
                200 => {
                    self.pool.report_success(&account.name).await;
                    let body = response.text().await.map_err(|e| Error::UpstreamError {
                        status: 0,
                        body: format!("body read failed: {e}"),
                    })?;
                    // rotate so successive requests spread across accounts
                    let _ = self.pool.next_account().await;
                    return Ok(body);
                }
                401 | 429 if attempt < MAX_RETRIES => {
                    drop(response);
                    self.pool.report_failure(&account.name).await;
                    if status == 429 {
                        account = self.pool.skip(&account.name).await?;
                    } else {
                        account = self.pool.next_account().await?;
                    }
                    warn!(status, next_account = %account.name, "rotating timed-text account");
                    tokio::time::sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                }
                _ => {
                    self.pool.report_failure(&account.name).await;
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::UpstreamError { status, body });
                }
            }
        }

        Err(Error::UpstreamError {
            status: 0,
            body: "retries exhausted".to_string(),
        })
    }

    async fn send(
        &self,
        url: &str,
        token: &str,
        account: &Account,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Origin", ORIGIN)
            .header("Referer", REFERER)
            .header("User-Agent", USER_AGENT);
        if !account.media_user_token.is_empty() {
            request = request.header("media-user-token", &account.media_user_token);
        }
        request.send().await
    }
}
