use std::collections::HashMap;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use super::{Column, ColumnId, Lead, LeadFilters, LeadId};

/// Leads of one column, in display order.
#[derive(Debug)]
pub struct ColumnLeads<'a> {
    pub column: &'a Column,
    pub leads: Vec<&'a Lead>,
}

/// Mapping `column_id -> ordered leads`, in column `sort_order`.
#[derive(Debug)]
pub struct Partition<'a> {
    columns: Vec<ColumnLeads<'a>>,
}

impl<'a> Partition<'a> {
    pub fn columns(&self) -> &[ColumnLeads<'a>] {
        &self.columns
    }

    pub fn get(&self, id: &ColumnId) -> Option<&ColumnLeads<'a>> {
        self.columns.iter().find(|c| &c.column.id == id)
    }

    /// Number of leads rendered across all columns.
    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.leads.len()).sum()
    }

    /// `(column index, row index)` of a lead, if it is rendered.
    pub fn locate(&self, id: &LeadId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.leads.iter().position(|l| &l.id == id).map(|ri| (ci, ri))
        })
    }
}

/// Whether a lead passes the active filter set.
///
/// Free-text search is fuzzy-matched against name, company and email.
pub fn lead_matches(lead: &Lead, filters: &LeadFilters, matcher: &SkimMatcherV2) -> bool {
    if let Some(status) = filters.status {
        if lead.status != status {
            return false;
        }
    }
    if let Some(ref responsible) = filters.responsible {
        if lead.responsible.as_deref() != Some(responsible.as_str()) {
            return false;
        }
    }
    if !filters.tag_ids.iter().all(|t| lead.tags.contains(t)) {
        return false;
    }
    match filters.search.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(query) => [Some(lead.name.as_str()), lead.company.as_deref(), lead.email.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| matcher.fuzzy_match(field, query).is_some()),
    }
}

/// Group leads into the active columns.
///
/// Leads whose `column_id` is not an active column are left out entirely.
/// Within a column, the most recently updated lead comes first; ties are
/// broken by id so the result is deterministic.
pub fn partition<'a>(leads: &'a [Lead], columns: &'a [Column], filters: &LeadFilters) -> Partition<'a> {
    let matcher = SkimMatcherV2::default();
    let slots: HashMap<&ColumnId, usize> = columns
        .iter()
        .filter(|c| c.is_active)
        .enumerate()
        .map(|(i, c)| (&c.id, i))
        .collect();

    let mut grouped: Vec<ColumnLeads<'a>> = columns
        .iter()
        .filter(|c| c.is_active)
        .map(|column| ColumnLeads { column, leads: Vec::new() })
        .collect();

    for lead in leads {
        let Some(&slot) = slots.get(&lead.column_id) else {
            continue;
        };
        if lead_matches(lead, filters, &matcher) {
            grouped[slot].leads.push(lead);
        }
    }

    for col in &mut grouped {
        col.leads
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    }

    Partition { columns: grouped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{LeadStatus, PipelineId, TagId};
    use chrono::{Duration, Utc};

    fn pipeline() -> PipelineId {
        PipelineId::from("sales")
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("new", pipeline(), "New", 0),
            Column::new("contacted", pipeline(), "Contacted", 1),
            Column::new("won", pipeline(), "Won", 2),
        ]
    }

    fn lead(id: &str, col: &str, minutes_ago: i64) -> Lead {
        let mut lead = Lead::new(id, format!("Lead {id}"), pipeline(), ColumnId::from(col));
        lead.updated_at = Utc::now() - Duration::minutes(minutes_ago);
        lead
    }

    #[test]
    fn every_lead_lands_in_its_own_column() {
        let cols = columns();
        let leads = vec![lead("a", "new", 1), lead("b", "won", 2), lead("c", "new", 3), lead("d", "contacted", 4)];
        let part = partition(&leads, &cols, &LeadFilters::default());

        assert_eq!(part.total(), leads.len());
        for col in part.columns() {
            for l in &col.leads {
                assert_eq!(l.column_id, col.column.id);
            }
        }
        for l in &leads {
            let hits = part
                .columns()
                .iter()
                .filter(|c| c.leads.iter().any(|x| x.id == l.id))
                .count();
            assert_eq!(hits, 1, "lead {} should appear exactly once", l.id);
        }
    }

    #[test]
    fn orphaned_leads_are_excluded() {
        let cols = columns();
        let leads = vec![lead("a", "new", 1), lead("orphan", "deleted-stage", 1)];
        let part = partition(&leads, &cols, &LeadFilters::default());
        assert_eq!(part.total(), 1);
        assert!(part.locate(&LeadId::from("orphan")).is_none());
    }

    #[test]
    fn inactive_column_hides_its_leads() {
        let mut cols = columns();
        cols[1].is_active = false;
        let leads = vec![lead("a", "contacted", 1)];
        let part = partition(&leads, &cols, &LeadFilters::default());
        assert_eq!(part.columns().len(), 2);
        assert_eq!(part.total(), 0);
    }

    #[test]
    fn columns_follow_input_order_and_recency_orders_rows() {
        let cols = columns();
        let leads = vec![lead("old", "new", 30), lead("fresh", "new", 1), lead("mid", "new", 10)];
        let part = partition(&leads, &cols, &LeadFilters::default());
        let ids: Vec<&str> = part.columns()[0].leads.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "mid", "old"]);
        assert_eq!(part.columns()[2].column.id, ColumnId::from("won"));
    }

    #[test]
    fn partition_is_idempotent() {
        let cols = columns();
        let leads = vec![lead("a", "new", 1), lead("b", "won", 2), lead("c", "new", 1)];
        let first: Vec<Vec<LeadId>> = partition(&leads, &cols, &LeadFilters::default())
            .columns()
            .iter()
            .map(|c| c.leads.iter().map(|l| l.id.clone()).collect())
            .collect();
        let second: Vec<Vec<LeadId>> = partition(&leads, &cols, &LeadFilters::default())
            .columns()
            .iter()
            .map(|c| c.leads.iter().map(|l| l.id.clone()).collect())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn filters_narrow_rendered_leads() {
        let cols = columns();
        let mut won = lead("a", "new", 1);
        won.status = LeadStatus::Won;
        won.tags = vec![TagId::from("vip")];
        let mut ada = lead("b", "new", 2);
        ada.name = "Ada Lovelace".into();
        ada.responsible = Some("maria".into());
        let leads = vec![won, ada];

        let by_status = LeadFilters { status: Some(LeadStatus::Won), ..Default::default() };
        assert_eq!(partition(&leads, &cols, &by_status).total(), 1);

        let by_tag = LeadFilters { tag_ids: vec![TagId::from("vip")], ..Default::default() };
        assert!(partition(&leads, &cols, &by_tag).locate(&LeadId::from("a")).is_some());

        let by_search = LeadFilters { search: Some("lovlace".into()), ..Default::default() };
        let part = partition(&leads, &cols, &by_search);
        assert_eq!(part.total(), 1);
        assert_eq!(part.locate(&LeadId::from("b")), Some((0, 0)));

        let by_owner = LeadFilters { responsible: Some("joao".into()), ..Default::default() };
        assert_eq!(partition(&leads, &cols, &by_owner).total(), 0);
    }

    #[test]
    fn blank_search_matches_everything() {
        let cols = columns();
        let leads = vec![lead("a", "new", 1)];
        let filters = LeadFilters { search: Some("   ".into()), ..Default::default() };
        assert_eq!(partition(&leads, &cols, &filters).total(), 1);
    }
}
