//! reqwest-backed implementation of [`FeedbackBackend`].

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{
        FeatureComment, FeatureRequest, FeatureRequestId, SupportTicket, TicketId, TicketMessage,
    },
    error::{ApiError, ApiException},
    protocol::{
        CreateComment, CreateFeatureRequest, CreateTicket, CreateTicketMessage, TicketDetail,
    },
};
use url::Url;

use crate::{config::FeedbackSettings, FeedbackBackend};

pub struct HttpFeedbackBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFeedbackBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url, None)
    }

    pub fn from_settings(settings: &FeedbackSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build feedback http client")?;
        Self::with_client(http, &settings.base_url, settings.api_key.clone())
    }

    pub fn with_client(http: Client, base_url: &str, api_key: Option<String>) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("invalid feedback base url: {base_url}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("feedback base url must start with http:// or https://"));
        }
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let res = builder
            .send()
            .await
            .with_context(|| format!("failed to {what}"))?;
        let res = check_status(res).await?;
        res.json::<T>()
            .await
            .with_context(|| format!("invalid response while trying to {what}"))
    }

    async fn execute(&self, builder: RequestBuilder, what: &str) -> Result<()> {
        let res = builder
            .send()
            .await
            .with_context(|| format!("failed to {what}"))?;
        check_status(res).await?;
        Ok(())
    }
}

async fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
        return Err(ApiException::from(api_error).into());
    }
    Err(anyhow!("feedback api returned {status}: {}", body.trim()))
}

#[async_trait]
impl FeedbackBackend for HttpFeedbackBackend {
    async fn list_feature_requests(&self) -> Result<Vec<FeatureRequest>> {
        self.fetch(
            self.request(Method::GET, "feature-requests"),
            "list feature requests",
        )
        .await
    }

    async fn get_feature_request(&self, id: FeatureRequestId) -> Result<FeatureRequest> {
        self.fetch(
            self.request(Method::GET, &format!("feature-requests/{id}")),
            "fetch feature request",
        )
        .await
    }

    async fn create_feature_request(
        &self,
        title: &str,
        description: &str,
    ) -> Result<FeatureRequest> {
        let body = CreateFeatureRequest {
            title: title.to_string(),
            description: description.to_string(),
        };
        self.fetch(
            self.request(Method::POST, "feature-requests").json(&body),
            "submit feature request",
        )
        .await
    }

    async fn vote(&self, id: FeatureRequestId) -> Result<()> {
        self.execute(
            self.request(Method::POST, &format!("feature-requests/{id}/vote")),
            "vote",
        )
        .await
    }

    async fn remove_vote(&self, id: FeatureRequestId) -> Result<()> {
        self.execute(
            self.request(Method::DELETE, &format!("feature-requests/{id}/vote")),
            "remove vote",
        )
        .await
    }

    async fn list_comments(&self, feature_id: FeatureRequestId) -> Result<Vec<FeatureComment>> {
        self.fetch(
            self.request(Method::GET, &format!("feature-requests/{feature_id}/comments")),
            "list comments",
        )
        .await
    }

    async fn create_comment(
        &self,
        feature_id: FeatureRequestId,
        body: &str,
    ) -> Result<FeatureComment> {
        let body = CreateComment {
            body: body.to_string(),
        };
        self.fetch(
            self.request(Method::POST, &format!("feature-requests/{feature_id}/comments"))
                .json(&body),
            "add comment",
        )
        .await
    }

    async fn list_tickets(&self) -> Result<Vec<SupportTicket>> {
        self.fetch(self.request(Method::GET, "tickets"), "list tickets")
            .await
    }

    async fn get_ticket(&self, id: TicketId) -> Result<TicketDetail> {
        self.fetch(
            self.request(Method::GET, &format!("tickets/{id}")),
            "fetch ticket",
        )
        .await
    }

    async fn create_ticket(
        &self,
        subject: &str,
        body: &str,
        email: Option<&str>,
    ) -> Result<SupportTicket> {
        let body = CreateTicket {
            subject: subject.to_string(),
            body: body.to_string(),
            email: email.map(str::to_string),
        };
        self.fetch(
            self.request(Method::POST, "tickets").json(&body),
            "submit ticket",
        )
        .await
    }

    async fn create_ticket_message(
        &self,
        ticket_id: TicketId,
        body: &str,
    ) -> Result<TicketMessage> {
        let body = CreateTicketMessage {
            body: body.to_string(),
        };
        self.fetch(
            self.request(Method::POST, &format!("tickets/{ticket_id}/messages"))
                .json(&body),
            "reply to ticket",
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
