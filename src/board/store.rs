use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Column, ColumnId, Lead, LeadFilters, LeadId, PipelineId, TagId};

/// Where the last `list_leads` round-trip stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// The last refresh failed. Previously loaded leads stay visible.
    Failed(String),
}

/// Column assignment of a lead before an optimistic move, kept for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub column_id: ColumnId,
    pub updated_at: DateTime<Utc>,
}

/// Read-through cache of the leads of one pipeline.
///
/// The store is the single source of truth for column assignment. Only the
/// move coordinator writes `column_id`, through [`LeadStore::place`] and
/// [`LeadStore::restore`].
#[derive(Debug)]
pub struct LeadStore {
    pipeline_id: PipelineId,
    leads: Vec<Lead>,
    index: HashMap<LeadId, usize>,
    columns: Vec<Column>,
    filters: LeadFilters,
    load_state: LoadState,
    /// Bumped by every refresh so that a slow, superseded response is ignored.
    generation: u64,
}

impl LeadStore {
    pub fn new(pipeline_id: PipelineId) -> Self {
        Self {
            pipeline_id,
            leads: Vec::new(),
            index: HashMap::new(),
            columns: Vec::new(),
            filters: LeadFilters::default(),
            load_state: LoadState::Idle,
            generation: 0,
        }
    }

    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    /// Active columns of the pipeline in `sort_order`.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn filters(&self) -> &LeadFilters {
        &self.filters
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn get(&self, id: &LeadId) -> Option<&Lead> {
        self.index.get(id).map(|&i| &self.leads[i])
    }

    pub fn contains(&self, id: &LeadId) -> bool {
        self.index.contains_key(id)
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    /// Whether `id` names an active column of this store's pipeline.
    pub fn is_active_column(&self, id: &ColumnId) -> bool {
        self.column(id).is_some()
    }

    /// Replace the filter set. Returns `true` if it changed.
    pub fn set_filters(&mut self, filters: LeadFilters) -> bool {
        if self.filters == filters {
            return false;
        }
        self.filters = filters;
        true
    }

    /// Mark a refresh as started and return its generation token.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.load_state = LoadState::Loading;
        self.generation
    }

    /// Hydrate from a `list_leads` response.
    ///
    /// Returns `false` when the response belongs to a superseded refresh and
    /// was discarded. Leads of other pipelines are dropped.
    pub fn hydrate(&mut self, generation: u64, leads: Vec<Lead>) -> bool {
        if generation != self.generation {
            return false;
        }
        let pipeline_id = self.pipeline_id.clone();
        self.leads = leads.into_iter().filter(|l| l.pipeline_id == pipeline_id).collect();
        self.reindex();
        self.load_state = LoadState::Loaded;
        true
    }

    /// Record a failed refresh. Existing leads stay in place.
    pub fn fail_load(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.load_state = LoadState::Failed(message.into());
        true
    }

    /// Replace the column set, keeping only active columns of this pipeline.
    pub fn set_columns(&mut self, columns: Vec<Column>) {
        let mut columns: Vec<Column> = columns
            .into_iter()
            .filter(|c| c.is_active && c.pipeline_id == self.pipeline_id)
            .collect();
        columns.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        self.columns = columns;
    }

    /// Add or replace a single lead (quick-add, detail refresh).
    pub fn upsert(&mut self, lead: Lead) {
        if lead.pipeline_id != self.pipeline_id {
            return;
        }
        match self.index.get(&lead.id) {
            Some(&i) => self.leads[i] = lead,
            None => {
                self.index.insert(lead.id.clone(), self.leads.len());
                self.leads.push(lead);
            }
        }
    }

    pub fn set_lead_tags(&mut self, id: &LeadId, tags: Vec<TagId>) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.leads[i].tags = tags;
                true
            }
            None => false,
        }
    }

    /// Assign a lead to `column_id`, returning its previous placement.
    pub(crate) fn place(&mut self, id: &LeadId, column_id: ColumnId) -> Option<Placement> {
        let &i = self.index.get(id)?;
        let lead = &mut self.leads[i];
        let previous = Placement {
            column_id: std::mem::replace(&mut lead.column_id, column_id),
            updated_at: lead.updated_at,
        };
        lead.touch();
        Some(previous)
    }

    /// Put a lead back where it was before an optimistic move.
    pub(crate) fn restore(&mut self, id: &LeadId, placement: Placement) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                let lead = &mut self.leads[i];
                lead.column_id = placement.column_id;
                lead.updated_at = placement.updated_at;
                true
            }
            None => false,
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .leads
            .iter()
            .enumerate()
            .map(|(i, lead)| (lead.id.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PipelineId {
        PipelineId::from("sales")
    }

    fn lead(id: &str, col: &str) -> Lead {
        Lead::new(id, format!("Lead {id}"), pipeline(), ColumnId::from(col))
    }

    #[test]
    fn hydrate_indexes_leads() {
        let mut store = LeadStore::new(pipeline());
        let g = store.begin_load();
        assert_eq!(store.load_state(), &LoadState::Loading);
        assert!(store.hydrate(g, vec![lead("a", "new"), lead("b", "won")]));
        assert_eq!(store.load_state(), &LoadState::Loaded);
        assert_eq!(store.get(&LeadId::from("b")).unwrap().column_id, ColumnId::from("won"));
    }

    #[test]
    fn hydrate_drops_other_pipelines() {
        let mut store = LeadStore::new(pipeline());
        let g = store.begin_load();
        let mut foreign = lead("x", "new");
        foreign.pipeline_id = PipelineId::from("mentoring");
        store.hydrate(g, vec![lead("a", "new"), foreign]);
        assert_eq!(store.leads().len(), 1);
        assert!(!store.contains(&LeadId::from("x")));
    }

    #[test]
    fn superseded_response_is_ignored() {
        let mut store = LeadStore::new(pipeline());
        let first = store.begin_load();
        let second = store.begin_load();
        assert!(!store.hydrate(first, vec![lead("old", "new")]));
        assert!(store.leads().is_empty());
        assert!(store.hydrate(second, vec![lead("fresh", "new")]));
        assert!(store.contains(&LeadId::from("fresh")));
    }

    #[test]
    fn failed_load_keeps_previous_leads() {
        let mut store = LeadStore::new(pipeline());
        let g = store.begin_load();
        store.hydrate(g, vec![lead("a", "new")]);
        let g = store.begin_load();
        assert!(store.fail_load(g, "timeout"));
        assert_eq!(store.load_state(), &LoadState::Failed("timeout".into()));
        assert_eq!(store.leads().len(), 1);
    }

    #[test]
    fn set_columns_keeps_active_sorted() {
        let mut store = LeadStore::new(pipeline());
        let mut inactive = Column::new("old", pipeline(), "Old", 0);
        inactive.is_active = false;
        store.set_columns(vec![
            Column::new("won", pipeline(), "Won", 2),
            inactive,
            Column::new("new", pipeline(), "New", 0),
            Column::new("other", PipelineId::from("x"), "Other", 1),
        ]);
        let ids: Vec<&str> = store.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "won"]);
        assert!(!store.is_active_column(&ColumnId::from("old")));
    }

    #[test]
    fn place_and_restore_roundtrip_placement() {
        let mut store = LeadStore::new(pipeline());
        let g = store.begin_load();
        store.hydrate(g, vec![lead("a", "new")]);
        let id = LeadId::from("a");
        let before = store.get(&id).unwrap().updated_at;

        let prev = store.place(&id, ColumnId::from("won")).unwrap();
        assert_eq!(prev.column_id, ColumnId::from("new"));
        assert_eq!(store.get(&id).unwrap().column_id, ColumnId::from("won"));

        assert!(store.restore(&id, prev));
        let lead = store.get(&id).unwrap();
        assert_eq!(lead.column_id, ColumnId::from("new"));
        assert_eq!(lead.updated_at, before);
    }

    #[test]
    fn place_unknown_lead_is_none() {
        let mut store = LeadStore::new(pipeline());
        assert!(store.place(&LeadId::from("ghost"), ColumnId::from("won")).is_none());
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let mut store = LeadStore::new(pipeline());
        store.upsert(lead("a", "new"));
        let mut renamed = lead("a", "new");
        renamed.name = "Renamed".into();
        store.upsert(renamed);
        assert_eq!(store.leads().len(), 1);
        assert_eq!(store.get(&LeadId::from("a")).unwrap().name, "Renamed");
    }

    #[test]
    fn set_filters_reports_change() {
        let mut store = LeadStore::new(pipeline());
        assert!(!store.set_filters(LeadFilters::default()));
        let filters = LeadFilters { search: Some("ada".into()), ..Default::default() };
        assert!(store.set_filters(filters.clone()));
        assert!(!store.set_filters(filters));
    }
}
