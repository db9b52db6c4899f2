use crate::wire::{Envelope, RawSnapshot, STATUS_OK};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ready(RawSnapshot),
    Skip(i64),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ошибка запроса к monitor API: {0}")]
    Request(#[from] reqwest::Error),
    #[error("monitor API вернул HTTP {0}")]
    Status(u16),
    #[error("не удалось разобрать ответ monitor API: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("в ответе monitor API нет поля data")]
    MissingData,
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Status(_) => "status",
            Self::Decode(_) | Self::MissingData => "decode",
        }
    }
}

pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        auth_key: Option<&str>,
    ) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(endpoint: &str, api_path: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("prober-client/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: monitor_url(endpoint, api_path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, auth_key: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let mut req = self.client.get(&self.url);
        if let Some(key) = auth_key {
            req = req.header(AUTHORIZATION, key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        decode_response(&body)
    }
}

pub fn monitor_url(endpoint: &str, api_path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        api_path.trim_start_matches('/')
    )
}

pub fn decode_response(body: &[u8]) -> Result<FetchOutcome, FetchError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    if envelope.code != STATUS_OK {
        return Ok(FetchOutcome::Skip(envelope.code));
    }
    let data = envelope.data.ok_or(FetchError::MissingData)?;
    let raw: RawSnapshot = serde_json::from_value(data)?;
    Ok(FetchOutcome::Ready(raw))
}
