//! HTTP implementation of `GameApi`

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::GameApi;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{GameRound, PlaceWagerRequest, RoundRecord, WalletBalance, Wager, WagerId};

/// Error body returned by the game server
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// `GameApi` over the server's JSON endpoints
#[derive(Debug, Clone)]
pub struct RestGameApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestGameApi {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Joining relative paths needs a trailing slash on the base
        let mut base = config.api_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token: config.auth_token.clone(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path)?;
        debug!(%method, %url, "api request");
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(Error::NotAuthenticated);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message.or(parsed.error))
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        warn!(status = status.as_u16(), %message, "api request failed");
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl GameApi for RestGameApi {
    async fn current_round(&self) -> Result<Option<GameRound>> {
        let response = self.send(self.request(Method::GET, "api/game/current")?).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn current_wagers(&self) -> Result<Vec<Wager>> {
        self.json(self.request(Method::GET, "api/game/bets")?).await
    }

    async fn balance(&self) -> Result<WalletBalance> {
        self.json(self.request(Method::GET, "api/wallet/balance")?).await
    }

    async fn place_wager(&self, request: PlaceWagerRequest) -> Result<Wager> {
        self.json(self.request(Method::POST, "api/game/bet")?.json(&request))
            .await
    }

    async fn cancel_wager(&self, wager_id: WagerId) -> Result<()> {
        let path = format!("api/game/bet/{}", wager_id);
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn round_history(&self, limit: usize) -> Result<Vec<RoundRecord>> {
        let request = self
            .request(Method::GET, "api/game/history")?
            .query(&[("limit", limit)]);
        self.json(request).await
    }
}
