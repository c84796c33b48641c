//! Typed views of the dashboard statistics endpoints.

use serde::{Deserialize, Serialize};

use super::company::Company;
use super::department::Department;
use super::employee::EmployeeStatus;

/// One row of a grouped count. The backend names the grouping column after
/// the field it grouped on (`company__name`, `designation`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct GroupCount {
    #[serde(
        alias = "company__name",
        alias = "department__name",
        alias = "designation",
        default
    )]
    pub label: Option<String>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StatusCount {
    pub employee_status: EmployeeStatus,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CompanyStatistics {
    pub total_companies: u32,
    pub total_employees: u32,
    pub total_departments: u32,
    #[serde(default)]
    pub top_companies_by_employees: Vec<Company>,
    #[serde(default)]
    pub top_companies_by_departments: Vec<Company>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DepartmentCompanyCount {
    #[serde(rename = "company__name")]
    pub company_name: String,
    pub count: u32,
    #[serde(default)]
    pub total_employees: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DepartmentStatistics {
    pub total_departments: u32,
    pub total_employees: u32,
    #[serde(default)]
    pub top_departments_by_employees: Vec<Department>,
    #[serde(default)]
    pub departments_by_company: Vec<DepartmentCompanyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EmployeeStatistics {
    pub total_employees: u32,
    #[serde(default)]
    pub employees_by_status: Vec<StatusCount>,
    #[serde(default)]
    pub employees_by_company: Vec<GroupCount>,
    #[serde(default)]
    pub employees_by_department: Vec<GroupCount>,
    #[serde(default)]
    pub top_designations: Vec<GroupCount>,
}

impl EmployeeStatistics {
    pub fn count_for(&self, status: EmployeeStatus) -> u32 {
        self.employees_by_status
            .iter()
            .filter(|row| row.employee_status == status)
            .map(|row| row.count)
            .sum()
    }
}
