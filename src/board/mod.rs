pub mod partition;
pub mod store;
pub mod window;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Identity of a lead record.
    LeadId
);
id_type!(
    /// Identity of a pipeline stage (column).
    ColumnId
);
id_type!(PipelineId);
id_type!(TagId);

/// Outcome state of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    Open,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 3] = [Self::Open, Self::Won, Self::Lost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            other => Err(format!("unknown status '{other}': use open, won, lost")),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sales/CRM record moving through the stages of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
    pub column_id: ColumnId,
    pub pipeline_id: PipelineId,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pipeline_id: PipelineId,
        column_id: ColumnId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId::new(id),
            name: name.into(),
            email: None,
            phone: None,
            company: None,
            status: LeadStatus::default(),
            column_id,
            pipeline_id,
            responsible: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Touch the lead, updating its `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One stage of a pipeline. Read-only from the board's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub pipeline_id: PipelineId,
    pub name: String,
    /// Hex color, e.g. `#3b82f6`.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Column {
    pub fn new(id: impl Into<String>, pipeline_id: PipelineId, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id: ColumnId::new(id),
            pipeline_id,
            name: name.into(),
            color: None,
            sort_order,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
}

/// A label shared across leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Payload for the quick-add lead prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub pipeline_id: PipelineId,
    pub column_id: ColumnId,
}

/// Which leads the board fetches and shows.
///
/// Sent as the query of `list_leads` and re-applied locally so that a filter
/// change is visible before the refresh completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
}

impl LeadFilters {
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.status.is_none() && self.responsible.is_none() && self.tag_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("WON".parse::<LeadStatus>().unwrap(), LeadStatus::Won);
        assert_eq!("open".parse::<LeadStatus>().unwrap(), LeadStatus::Open);
        assert!("pending".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn lead_deserializes_with_defaults() {
        let json = r#"{
            "id": "l1",
            "name": "Ada",
            "column_id": "new",
            "pipeline_id": "sales",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let lead: Lead = serde_json::from_str(json).unwrap();
        assert_eq!(lead.id, LeadId::from("l1"));
        assert_eq!(lead.status, LeadStatus::Open);
        assert!(lead.tags.is_empty());
        assert!(lead.responsible.is_none());
    }

    #[test]
    fn column_defaults_to_active() {
        let json = r#"{"id": "new", "pipeline_id": "sales", "name": "New"}"#;
        let col: Column = serde_json::from_str(json).unwrap();
        assert!(col.is_active);
        assert_eq!(col.sort_order, 0);
    }

    #[test]
    fn empty_filters_serialize_to_empty_object() {
        let filters = LeadFilters::default();
        assert!(filters.is_empty());
        assert_eq!(serde_json::to_string(&filters).unwrap(), "{}");
    }

    #[test]
    fn id_displays_raw_string() {
        assert_eq!(ColumnId::from("contacted").to_string(), "contacted");
    }
}
