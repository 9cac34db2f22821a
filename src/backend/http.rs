use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{BackendError, LeadBackend, Result};
use crate::board::{Column, ColumnId, Lead, LeadFilters, LeadId, NewLead, Pipeline, PipelineId, Tag, TagId};

/// JSON REST client for the lead service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    token: Option<String>,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, token, client)
    }

    pub fn with_client(base_url: &str, token: Option<String>, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!("invalid base url {base_url}")));
        }
        Ok(Self { base_url, token, client })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(BackendError::status(status.as_u16(), message.trim()))
    }

    fn update_column_request(&self, lead_id: &LeadId, column_id: &ColumnId) -> RequestBuilder {
        let req = self
            .client
            .patch(self.url(&["leads", lead_id.as_str()]))
            .json(&json!({ "column_id": column_id }));
        self.authorized(req)
    }

    fn set_tags_request(&self, lead_id: &LeadId, tag_ids: &[TagId]) -> RequestBuilder {
        let req = self
            .client
            .put(self.url(&["leads", lead_id.as_str(), "tags"]))
            .json(&json!({ "tag_ids": tag_ids }));
        self.authorized(req)
    }
}

/// Flatten filters into query pairs. Tag ids are comma-joined.
pub(crate) fn filter_query(filters: &LeadFilters) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(ref search) = filters.search {
        query.push(("search", search.clone()));
    }
    if let Some(status) = filters.status {
        query.push(("status", status.as_str().to_string()));
    }
    if let Some(ref responsible) = filters.responsible {
        query.push(("responsible", responsible.clone()));
    }
    if !filters.tag_ids.is_empty() {
        let tags: Vec<&str> = filters.tag_ids.iter().map(TagId::as_str).collect();
        query.push(("tags", tags.join(",")));
    }
    query
}

#[async_trait]
impl LeadBackend for HttpBackend {
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let req = self.client.get(self.url(&["pipelines"]));
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn list_leads(&self, pipeline_id: &PipelineId, filters: &LeadFilters) -> Result<Vec<Lead>> {
        let req = self
            .client
            .get(self.url(&["pipelines", pipeline_id.as_str(), "leads"]))
            .query(&filter_query(filters));
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn list_active_columns(&self, pipeline_id: &PipelineId) -> Result<Vec<Column>> {
        let req = self
            .client
            .get(self.url(&["pipelines", pipeline_id.as_str(), "columns"]))
            .query(&[("active", "true")]);
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn update_lead_column(&self, lead_id: &LeadId, column_id: &ColumnId) -> Result<()> {
        let response = self.update_column_request(lead_id, column_id).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<Lead> {
        let req = self.client.post(self.url(&["leads"])).json(lead);
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let req = self.client.get(self.url(&["tags"]));
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let req = self
            .client
            .post(self.url(&["tags"]))
            .json(&json!({ "name": name, "color": color }));
        let response = self.authorized(req).send().await?;
        Self::handle_response(response).await
    }

    async fn set_lead_tags(&self, lead_id: &LeadId, tag_ids: &[TagId]) -> Result<()> {
        let response = self.set_tags_request(lead_id, tag_ids).send().await?;
        Self::check_status(response).await.map(|_| ())
    }
}
