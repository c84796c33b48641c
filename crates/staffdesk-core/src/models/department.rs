use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company as referenced from another record: a bare id on list views,
/// a nested summary on detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum CompanyRef {
    Id(i64),
    Summary {
        id: i64,
        name: String,
        #[serde(default)]
        number_of_departments: u32,
        #[serde(default)]
        number_of_employees: u32,
    },
}

impl CompanyRef {
    pub fn id(&self) -> i64 {
        match self {
            CompanyRef::Id(id) => *id,
            CompanyRef::Summary { id, .. } => *id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CompanyRef::Id(_) => None,
            CompanyRef::Summary { name, .. } => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Department {
    pub id: i64,
    pub company: CompanyRef,
    #[serde(default)]
    pub company_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub number_of_employees: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Department {
    /// Company name from whichever shape the endpoint returned
    pub fn company_display(&self) -> &str {
        self.company_name
            .as_deref()
            .or_else(|| self.company.name())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewDepartment {
    pub company: i64,
    pub name: String,
}

/// A department cannot move between companies; only the name is editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DepartmentUpdate {
    pub name: String,
}
