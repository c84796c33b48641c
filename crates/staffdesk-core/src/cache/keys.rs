//! Cache keys for backend resources.
//!
//! A key is the request path followed by its query string, so two views of
//! the same list with different filters are cached separately.

use crate::api::endpoints::{
    company_departments_path, company_employees_path, company_path, department_employees_path,
    department_path, employee_path, COMPANIES_PATH, COMPANY_SEARCH_PATH, COMPANY_STATS_PATH,
    DEPARTMENTS_PATH, DEPARTMENT_STATS_PATH, EMPLOYEES_PATH, EMPLOYEE_STATS_PATH, PROFILE_PATH,
};
use crate::models::{CompanyFilter, EmployeeFilter};
use reqwest::Url;

pub const PROFILE: &str = PROFILE_PATH;
pub const DEPARTMENTS: &str = DEPARTMENTS_PATH;
pub const COMPANY_STATISTICS: &str = COMPANY_STATS_PATH;
pub const DEPARTMENT_STATISTICS: &str = DEPARTMENT_STATS_PATH;
pub const EMPLOYEE_STATISTICS: &str = EMPLOYEE_STATS_PATH;

/// Placeholder origin used only to reach the URL form encoder.
const KEY_ORIGIN: &str = "http://staffdesk.invalid/";

/// Append `query` to `path`, form-encoding each pair the same way the
/// request itself is encoded so that distinct filters never share a key.
fn with_query(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let mut url = match Url::parse(KEY_ORIGIN) {
        Ok(url) => url,
        Err(_) => return path.to_string(),
    };
    url.query_pairs_mut()
        .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    format!("{}?{}", path, url.query().unwrap_or_default())
}

pub fn companies(filter: &CompanyFilter) -> String {
    with_query(COMPANIES_PATH, &filter.to_query())
}

pub fn company(id: i64) -> String {
    company_path(id)
}

pub fn company_search(query: &str) -> String {
    with_query(COMPANY_SEARCH_PATH, &[("q", query.trim().to_string())])
}

pub fn company_departments(id: i64) -> String {
    company_departments_path(id)
}

pub fn company_employees(id: i64) -> String {
    company_employees_path(id)
}

pub fn department(id: i64) -> String {
    department_path(id)
}

pub fn department_employees(id: i64) -> String {
    department_employees_path(id)
}

pub fn employees(filter: &EmployeeFilter) -> String {
    with_query(EMPLOYEES_PATH, &filter.to_query())
}

pub fn employee(id: i64) -> String {
    employee_path(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmployeeStatus;

    #[test]
    fn test_unfiltered_list_key_is_the_path() {
        assert_eq!(companies(&CompanyFilter::default()), "/companies/");
        assert_eq!(employees(&EmployeeFilter::default()), "/employees/");
    }

    #[test]
    fn test_filters_produce_distinct_keys() {
        let filter = EmployeeFilter {
            company: Some(3),
            status: Some(EmployeeStatus::Hired),
            ..Default::default()
        };
        assert_eq!(employees(&filter), "/employees/?company=3&status=hired");
        assert_ne!(employees(&filter), employees(&EmployeeFilter::default()));
    }

    #[test]
    fn test_query_values_are_encoded() {
        let combined = EmployeeFilter {
            search: Some("x&designation=y".to_string()),
            ..Default::default()
        };
        let separate = EmployeeFilter {
            search: Some("x".to_string()),
            designation: Some("y".to_string()),
            ..Default::default()
        };
        assert_eq!(employees(&combined), "/employees/?search=x%26designation%3Dy");
        assert_eq!(employees(&separate), "/employees/?search=x&designation=y");
        assert_eq!(company_search(" acme corp "), "/companies/search/?q=acme+corp");
    }

    #[test]
    fn test_nested_lists_fall_under_their_parent_prefix() {
        assert!(company_departments(4).starts_with(COMPANIES_PATH));
        assert!(company_employees(4).starts_with(COMPANIES_PATH));
        assert!(department_employees(9).starts_with(DEPARTMENTS_PATH));
        assert!(company_search("acme").starts_with(COMPANIES_PATH));
    }
}
