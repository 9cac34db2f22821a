use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use super::{BackendError, LeadBackend, Result};
use crate::board::partition::lead_matches;
use crate::board::{
    Column, ColumnId, Lead, LeadFilters, LeadId, LeadStatus, NewLead, Pipeline, PipelineId, Tag, TagId,
};

#[derive(Debug, Default)]
struct Inner {
    pipelines: Vec<Pipeline>,
    columns: Vec<Column>,
    leads: Vec<Lead>,
    tags: Vec<Tag>,
    next_id: u64,
    failing_moves: HashSet<LeadId>,
    fail_fetches: bool,
    move_calls: Vec<(LeadId, ColumnId)>,
    tag_fetches: usize,
}

/// In-process backend: seeded demo data, failure injection and call log.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated round-trip time applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub fn add_pipeline(&self, pipeline: Pipeline) {
        self.lock().pipelines.push(pipeline);
    }

    pub fn add_column(&self, column: Column) {
        self.lock().columns.push(column);
    }

    pub fn add_lead(&self, lead: Lead) {
        self.lock().leads.push(lead);
    }

    pub fn add_tag(&self, tag: Tag) {
        self.lock().tags.push(tag);
    }

    /// Make every `update_lead_column` for `lead_id` fail until cleared.
    pub fn fail_moves_for(&self, lead_id: LeadId) {
        self.lock().failing_moves.insert(lead_id);
    }

    #[cfg(test)]
    pub fn clear_move_failures(&self) {
        self.lock().failing_moves.clear();
    }

    #[cfg(test)]
    pub fn set_fail_fetches(&self, fail: bool) {
        self.lock().fail_fetches = fail;
    }

    /// Every `update_lead_column` call received, in order.
    pub fn move_calls(&self) -> Vec<(LeadId, ColumnId)> {
        self.lock().move_calls.clone()
    }

    pub fn tag_fetches(&self) -> usize {
        self.lock().tag_fetches
    }

    pub fn lead(&self, id: &LeadId) -> Option<Lead> {
        self.lock().leads.iter().find(|l| &l.id == id).cloned()
    }

    /// A sales pipeline with five stages, a few hundred leads and some tags.
    ///
    /// Moves of lead `L0013` always fail so the rollback path can be seen.
    pub fn demo() -> Self {
        let backend = Self::new().with_latency(Duration::from_millis(250));
        let sales = PipelineId::from("sales");
        backend.add_pipeline(Pipeline { id: sales.clone(), name: "Sales".into() });
        backend.add_pipeline(Pipeline { id: PipelineId::from("mentoring"), name: "Mentoring".into() });

        let stages = [
            ("new", "New", "#3b82f6"),
            ("contacted", "Contacted", "#a855f7"),
            ("proposal", "Proposal", "#f59e0b"),
            ("won", "Won", "#22c55e"),
            ("lost", "Lost", "#ef4444"),
        ];
        for (order, (id, name, color)) in stages.iter().enumerate() {
            let mut col = Column::new(*id, sales.clone(), *name, order as i32);
            col.color = Some((*color).to_string());
            backend.add_column(col);
        }

        for (id, name, color) in [("vip", "VIP", "#eab308"), ("referral", "Referral", "#06b6d4"), ("webinar", "Webinar", "#ec4899")] {
            backend.add_tag(Tag { id: TagId::from(id), name: name.into(), color: Some(color.into()) });
        }

        let first = ["Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald", "Frances", "Ken", "Radia", "Tim"];
        let last = ["Lovelace", "Hopper", "Turing", "Dijkstra", "Liskov", "Knuth", "Allen", "Thompson", "Perlman", "Berners-Lee"];
        let owners = ["maria", "joao", "ana"];
        let now = Utc::now();
        // Skewed so the first column is long enough to exercise virtualization.
        let weights = [300usize, 60, 30, 20, 10];
        let mut n = 0usize;
        for (stage, count) in stages.iter().zip(weights) {
            for _ in 0..count {
                let name = format!("{} {}", first[n % first.len()], last[(n / first.len()) % last.len()]);
                let mut lead = Lead::new(format!("L{:04}", n + 1), name, sales.clone(), ColumnId::from(stage.0));
                lead.company = Some(format!("Company {}", n % 37));
                lead.email = Some(format!("lead{}@example.com", n + 1));
                lead.responsible = Some(owners[n % owners.len()].to_string());
                lead.status = match stage.0 {
                    "won" => LeadStatus::Won,
                    "lost" => LeadStatus::Lost,
                    _ => LeadStatus::Open,
                };
                if n % 7 == 0 {
                    lead.tags.push(TagId::from("vip"));
                }
                if n % 5 == 0 {
                    lead.tags.push(TagId::from("referral"));
                }
                lead.created_at = now - ChronoDuration::hours(n as i64 * 3);
                lead.updated_at = now - ChronoDuration::minutes(n as i64 * 11);
                backend.add_lead(lead);
                n += 1;
            }
        }
        backend.lock().next_id = n as u64 + 1;
        backend.fail_moves_for(LeadId::from("L0013"));
        backend
    }
}

#[async_trait]
impl LeadBackend for MemoryBackend {
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        self.round_trip().await;
        Ok(self.lock().pipelines.clone())
    }

    async fn list_leads(&self, pipeline_id: &PipelineId, filters: &LeadFilters) -> Result<Vec<Lead>> {
        self.round_trip().await;
        let inner = self.lock();
        if inner.fail_fetches {
            return Err(BackendError::Transport("connection refused".into()));
        }
        let matcher = fuzzy_matcher::skim::SkimMatcherV2::default();
        Ok(inner
            .leads
            .iter()
            .filter(|l| &l.pipeline_id == pipeline_id && lead_matches(l, filters, &matcher))
            .cloned()
            .collect())
    }

    async fn list_active_columns(&self, pipeline_id: &PipelineId) -> Result<Vec<Column>> {
        self.round_trip().await;
        let inner = self.lock();
        if inner.fail_fetches {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(inner
            .columns
            .iter()
            .filter(|c| &c.pipeline_id == pipeline_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn update_lead_column(&self, lead_id: &LeadId, column_id: &ColumnId) -> Result<()> {
        self.round_trip().await;
        let mut inner = self.lock();
        inner.move_calls.push((lead_id.clone(), column_id.clone()));
        if inner.failing_moves.contains(lead_id) {
            return Err(BackendError::status(503, "service unavailable"));
        }
        let pipeline_id = inner
            .leads
            .iter()
            .find(|l| &l.id == lead_id)
            .map(|l| l.pipeline_id.clone())
            .ok_or_else(|| BackendError::NotFound(format!("lead {lead_id}")))?;
        let valid = inner
            .columns
            .iter()
            .any(|c| &c.id == column_id && c.pipeline_id == pipeline_id && c.is_active);
        if !valid {
            return Err(BackendError::Rejected(format!("column {column_id} is not in pipeline {pipeline_id}")));
        }
        if let Some(lead) = inner.leads.iter_mut().find(|l| &l.id == lead_id) {
            if &lead.column_id != column_id {
                lead.column_id = column_id.clone();
                lead.touch();
            }
        }
        Ok(())
    }

    async fn create_lead(&self, new: &NewLead) -> Result<Lead> {
        self.round_trip().await;
        let mut inner = self.lock();
        if !inner.columns.iter().any(|c| c.id == new.column_id && c.pipeline_id == new.pipeline_id) {
            return Err(BackendError::Rejected(format!("unknown column {}", new.column_id)));
        }
        let id = format!("L{:04}", inner.next_id.max(1));
        inner.next_id = inner.next_id.max(1) + 1;
        let lead = Lead::new(id, new.name.clone(), new.pipeline_id.clone(), new.column_id.clone());
        inner.leads.push(lead.clone());
        Ok(lead)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        // Built before the simulated transit, like a server reply on the wire.
        let response = {
            let mut inner = self.lock();
            inner.tag_fetches += 1;
            if inner.fail_fetches {
                Err(BackendError::Transport("connection refused".into()))
            } else {
                Ok(inner.tags.clone())
            }
        };
        self.round_trip().await;
        response
    }

    async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        self.round_trip().await;
        let mut inner = self.lock();
        let slug: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        if slug.is_empty() {
            return Err(BackendError::Rejected("tag name is empty".into()));
        }
        if inner.tags.iter().any(|t| t.id.as_str() == slug) {
            return Err(BackendError::Rejected(format!("tag '{name}' already exists")));
        }
        let tag = Tag { id: TagId::new(slug), name: name.trim().to_string(), color: color.map(str::to_string) };
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    async fn set_lead_tags(&self, lead_id: &LeadId, tag_ids: &[TagId]) -> Result<()> {
        self.round_trip().await;
        let mut inner = self.lock();
        if let Some(missing) = tag_ids.iter().find(|id| !inner.tags.iter().any(|t| &t.id == *id)) {
            return Err(BackendError::NotFound(format!("tag {missing}")));
        }
        let lead = inner
            .leads
            .iter_mut()
            .find(|l| &l.id == lead_id)
            .ok_or_else(|| BackendError::NotFound(format!("lead {lead_id}")))?;
        lead.tags = tag_ids.to_vec();
        lead.touch();
        Ok(())
    }
}
