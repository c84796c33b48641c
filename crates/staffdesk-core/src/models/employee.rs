use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::department::CompanyRef;

/// Onboarding workflow position of an employee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum EmployeeStatus {
    #[default]
    ApplicationReceived,
    InterviewScheduled,
    Hired,
    NotAccepted,
}

impl EmployeeStatus {
    pub const ALL: [EmployeeStatus; 4] = [
        EmployeeStatus::ApplicationReceived,
        EmployeeStatus::InterviewScheduled,
        EmployeeStatus::Hired,
        EmployeeStatus::NotAccepted,
    ];

    /// Wire name, as used in query strings and request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::ApplicationReceived => "application_received",
            EmployeeStatus::InterviewScheduled => "interview_scheduled",
            EmployeeStatus::Hired => "hired",
            EmployeeStatus::NotAccepted => "not_accepted",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EmployeeStatus::ApplicationReceived => "Application Received",
            EmployeeStatus::InterviewScheduled => "Interview Scheduled",
            EmployeeStatus::Hired => "Hired",
            EmployeeStatus::NotAccepted => "Not Accepted",
        }
    }

    /// Statuses reachable in one step. Hired and NotAccepted are final.
    pub fn allowed_transitions(&self) -> &'static [EmployeeStatus] {
        match self {
            EmployeeStatus::ApplicationReceived => &[
                EmployeeStatus::InterviewScheduled,
                EmployeeStatus::NotAccepted,
            ],
            EmployeeStatus::InterviewScheduled => {
                &[EmployeeStatus::Hired, EmployeeStatus::NotAccepted]
            }
            EmployeeStatus::Hired | EmployeeStatus::NotAccepted => &[],
        }
    }

    pub fn can_transition_to(&self, next: EmployeeStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_final(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        EmployeeStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Unknown employee status: {}", s))
    }
}

/// A department as referenced from an employee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum DepartmentRef {
    Id(i64),
    Summary {
        id: i64,
        name: String,
        #[serde(default)]
        company_name: Option<String>,
    },
}

impl DepartmentRef {
    pub fn id(&self) -> i64 {
        match self {
            DepartmentRef::Id(id) => *id,
            DepartmentRef::Summary { id, .. } => *id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DepartmentRef::Id(_) => None,
            DepartmentRef::Summary { name, .. } => Some(name),
        }
    }
}

/// An employee record.
///
/// List endpoints omit the company/department ids and contact details;
/// detail endpoints nest the company and department summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Employee {
    pub id: i64,
    #[serde(default)]
    pub company: Option<CompanyRef>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub department: Option<DepartmentRef>,
    #[serde(default)]
    pub department_name: Option<String>,
    #[serde(default)]
    pub employee_status: EmployeeStatus,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
    #[serde(default)]
    pub days_employed: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn company_display(&self) -> &str {
        self.company_name
            .as_deref()
            .or_else(|| self.company.as_ref().and_then(CompanyRef::name))
            .unwrap_or("Unknown")
    }

    pub fn department_display(&self) -> &str {
        self.department_name
            .as_deref()
            .or_else(|| self.department.as_ref().and_then(DepartmentRef::name))
            .unwrap_or("Unknown")
    }
}

/// Fields sent when creating an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewEmployee {
    pub company: i64,
    pub department: i64,
    #[serde(default)]
    pub employee_status: EmployeeStatus,
    pub name: String,
    pub email: String,
    pub mobile_number: String,
    pub address: String,
    pub designation: String,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
}

impl NewEmployee {
    /// Local checks mirroring the backend's model validation.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(self.employee_status, self.hired_on, &self.mobile_number, &self.email)
    }
}

/// Fields sent when updating an employee. Company and department are fixed
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EmployeeUpdate {
    pub employee_status: EmployeeStatus,
    pub name: String,
    pub email: String,
    pub mobile_number: String,
    pub address: String,
    pub designation: String,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
}

impl EmployeeUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(self.employee_status, self.hired_on, &self.mobile_number, &self.email)
    }
}

impl From<&Employee> for EmployeeUpdate {
    fn from(employee: &Employee) -> Self {
        Self {
            employee_status: employee.employee_status,
            name: employee.name.clone(),
            email: employee.email.clone(),
            mobile_number: employee.mobile_number.clone().unwrap_or_default(),
            address: employee.address.clone().unwrap_or_default(),
            designation: employee.designation.clone(),
            hired_on: employee.hired_on,
        }
    }
}

fn validate_fields(
    status: EmployeeStatus,
    hired_on: Option<NaiveDate>,
    mobile_number: &str,
    email: &str,
) -> Result<(), String> {
    if status == EmployeeStatus::Hired && hired_on.is_none() {
        return Err("Hired date must be set when employee status is \"Hired\".".to_string());
    }
    if !is_valid_mobile(mobile_number) {
        return Err(
            "Phone number must be entered in the format: +999999999. Up to 15 digits allowed."
                .to_string(),
        );
    }
    if !email.contains('@') {
        return Err("Enter a valid email address.".to_string());
    }
    Ok(())
}

/// Optional `+`, optional leading `1`, then 9 to 15 digits.
fn is_valid_mobile(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match digits.len() {
        9..=15 => true,
        16 => digits.starts_with('1'),
        _ => false,
    }
}

/// Query parameters accepted by the employee list endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeFilter {
    pub company: Option<i64>,
    pub department: Option<i64>,
    pub status: Option<EmployeeStatus>,
    /// Matches name or email
    pub search: Option<String>,
    pub designation: Option<String>,
}

impl EmployeeFilter {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(company) = self.company {
            query.push(("company", company.to_string()));
        }
        if let Some(department) = self.department {
            query.push(("department", department.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(ref search) = self.search {
            query.push(("search", search.clone()));
        }
        if let Some(ref designation) = self.designation {
            query.push(("designation", designation.clone()));
        }
        query
    }
}
