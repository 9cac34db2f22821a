//! The remote data service the board reads from and writes to.
//!
//! Everything the board needs from the backend goes through [`LeadBackend`].
//! [`HttpBackend`] talks to the REST service; [`MemoryBackend`] keeps records
//! in process for `--demo` and for tests.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;

use crate::board::{Column, ColumnId, Lead, LeadFilters, LeadId, NewLead, Pipeline, PipelineId, Tag, TagId};

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait LeadBackend: Send + Sync {
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>>;

    async fn list_leads(&self, pipeline_id: &PipelineId, filters: &LeadFilters) -> Result<Vec<Lead>>;

    async fn list_active_columns(&self, pipeline_id: &PipelineId) -> Result<Vec<Column>>;

    /// Move a lead to `column_id`. Re-sending the lead's current column succeeds.
    async fn update_lead_column(&self, lead_id: &LeadId, column_id: &ColumnId) -> Result<()>;

    async fn create_lead(&self, lead: &NewLead) -> Result<Lead>;

    async fn list_tags(&self) -> Result<Vec<Tag>>;

    async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag>;

    async fn set_lead_tags(&self, lead_id: &LeadId, tag_ids: &[TagId]) -> Result<()>;
}
