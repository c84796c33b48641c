use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub number_of_departments: u32,
    #[serde(default)]
    pub number_of_employees: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn display_counts(&self) -> String {
        format!(
            "{} departments, {} employees",
            self.number_of_departments, self.number_of_employees
        )
    }
}

/// Editable company fields, sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CompanyInput {
    pub name: String,
}

/// Query parameters accepted by the company list endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyFilter {
    pub search: Option<String>,
    pub min_employees: Option<u32>,
    pub min_departments: Option<u32>,
}

impl CompanyFilter {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(ref search) = self.search {
            query.push(("search", search.clone()));
        }
        if let Some(min) = self.min_employees {
            query.push(("min_employees", min.to_string()));
        }
        if let Some(min) = self.min_departments {
            query.push(("min_departments", min.to_string()));
        }
        query
    }
}
