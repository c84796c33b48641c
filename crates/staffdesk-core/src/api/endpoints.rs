//! Typed wrappers for the backend's REST endpoints.

use serde_json::json;
use tracing::debug;

use super::client::{ApiClient, RequestOptions, RequestOutcome};
use super::ApiError;
use crate::models::{
    Company, CompanyFilter, CompanyInput, CompanyStatistics, Department, DepartmentStatistics,
    DepartmentUpdate, Employee, EmployeeFilter, EmployeeStatistics, EmployeeStatus,
    EmployeeUpdate, LoginCredentials, LoginResponse, NewDepartment, NewEmployee, ProfileUpdate,
    Registration, UserProfile,
};

// ============================================================================
// Paths
// ============================================================================

pub const LOGIN_PATH: &str = "/auth/login/";
pub const REGISTER_PATH: &str = "/auth/register/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const PROFILE_PATH: &str = "/auth/profile/";
pub const PROFILE_UPDATE_PATH: &str = "/auth/profile/update/";

pub const COMPANIES_PATH: &str = "/companies/";
pub const COMPANY_STATS_PATH: &str = "/companies/statistics/";
pub const COMPANY_SEARCH_PATH: &str = "/companies/search/";
pub const DEPARTMENTS_PATH: &str = "/departments/";
pub const DEPARTMENT_STATS_PATH: &str = "/departments/statistics/";
pub const EMPLOYEES_PATH: &str = "/employees/";
pub const EMPLOYEE_STATS_PATH: &str = "/employees/statistics/";

pub fn company_path(id: i64) -> String {
    format!("/companies/{}/", id)
}

pub fn company_departments_path(id: i64) -> String {
    format!("/companies/{}/departments/", id)
}

pub fn company_employees_path(id: i64) -> String {
    format!("/companies/{}/employees/", id)
}

pub fn department_path(id: i64) -> String {
    format!("/departments/{}/", id)
}

pub fn department_employees_path(id: i64) -> String {
    format!("/departments/{}/employees/", id)
}

pub fn employee_path(id: i64) -> String {
    format!("/employees/{}/", id)
}

pub fn employee_status_path(id: i64) -> String {
    format!("/employees/{}/status/", id)
}

fn local_validation(result: Result<(), String>) -> RequestOutcome<()> {
    result.map_err(ApiError::ValidationError)
}

impl ApiClient {
    // ===== Authentication =====

    pub async fn login(&self, credentials: &LoginCredentials) -> RequestOutcome<LoginResponse> {
        self.request_anonymous(LOGIN_PATH, RequestOptions::post(credentials)?)
            .await
    }

    pub async fn register(&self, registration: &Registration) -> RequestOutcome<UserProfile> {
        local_validation(registration.validate())?;
        self.request_anonymous(REGISTER_PATH, RequestOptions::post(registration)?)
            .await
    }

    /// Tell the backend to blacklist `refresh_token`, authenticating with
    /// `access_token` when one is given.
    pub async fn notify_logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> RequestOutcome<serde_json::Value> {
        let options = RequestOptions::post(&json!({ "refresh_token": refresh_token }))?;
        match access_token {
            Some(token) => self.request_with_token(LOGOUT_PATH, options, token).await,
            None => self.request_anonymous(LOGOUT_PATH, options).await,
        }
    }

    pub async fn fetch_profile(&self) -> RequestOutcome<UserProfile> {
        self.request(PROFILE_PATH, RequestOptions::get()).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> RequestOutcome<UserProfile> {
        if update.password.is_some() && update.password != update.password_confirm {
            return Err(ApiError::ValidationError("Passwords don't match".to_string()));
        }
        self.request(PROFILE_UPDATE_PATH, RequestOptions::put(update)?)
            .await
    }

    // ===== Companies =====

    pub async fn fetch_companies(&self, filter: &CompanyFilter) -> RequestOutcome<Vec<Company>> {
        let options = RequestOptions::get().query(filter.to_query());
        self.request(COMPANIES_PATH, options).await
    }

    pub async fn fetch_company(&self, id: i64) -> RequestOutcome<Company> {
        self.request(&company_path(id), RequestOptions::get()).await
    }

    pub async fn create_company(&self, input: &CompanyInput) -> RequestOutcome<CompanyInput> {
        self.request(COMPANIES_PATH, RequestOptions::post(input)?).await
    }

    pub async fn update_company(&self, id: i64, input: &CompanyInput) -> RequestOutcome<CompanyInput> {
        self.request(&company_path(id), RequestOptions::put(input)?)
            .await
    }

    pub async fn delete_company(&self, id: i64) -> RequestOutcome<()> {
        self.request(&company_path(id), RequestOptions::delete()).await
    }

    pub async fn fetch_company_statistics(&self) -> RequestOutcome<CompanyStatistics> {
        self.request(COMPANY_STATS_PATH, RequestOptions::get()).await
    }

    /// Name search. An empty query returns no results without a round trip.
    pub async fn search_companies(&self, query: &str) -> RequestOutcome<Vec<Company>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let options = RequestOptions::get().query(vec![("q", query)]);
        self.request(COMPANY_SEARCH_PATH, options).await
    }

    pub async fn fetch_company_departments(&self, company_id: i64) -> RequestOutcome<Vec<Department>> {
        self.request(&company_departments_path(company_id), RequestOptions::get()).await
    }

    pub async fn fetch_company_employees(&self, company_id: i64) -> RequestOutcome<Vec<Employee>> {
        self.request(&company_employees_path(company_id), RequestOptions::get()).await
    }

    // ===== Departments =====

    pub async fn fetch_departments(&self) -> RequestOutcome<Vec<Department>> {
        self.request(DEPARTMENTS_PATH, RequestOptions::get()).await
    }

    pub async fn fetch_department(&self, id: i64) -> RequestOutcome<Department> {
        self.request(&department_path(id), RequestOptions::get()).await
    }

    pub async fn create_department(&self, input: &NewDepartment) -> RequestOutcome<NewDepartment> {
        self.request(DEPARTMENTS_PATH, RequestOptions::post(input)?).await
    }

    pub async fn update_department(
        &self,
        id: i64,
        input: &DepartmentUpdate,
    ) -> RequestOutcome<DepartmentUpdate> {
        self.request(&department_path(id), RequestOptions::put(input)?)
            .await
    }

    pub async fn delete_department(&self, id: i64) -> RequestOutcome<()> {
        self.request(&department_path(id), RequestOptions::delete()).await
    }

    pub async fn fetch_department_statistics(&self) -> RequestOutcome<DepartmentStatistics> {
        self.request(DEPARTMENT_STATS_PATH, RequestOptions::get()).await
    }

    pub async fn fetch_department_employees(&self, department_id: i64) -> RequestOutcome<Vec<Employee>> {
        self.request(&department_employees_path(department_id), RequestOptions::get()).await
    }

    // ===== Employees =====

    pub async fn fetch_employees(&self, filter: &EmployeeFilter) -> RequestOutcome<Vec<Employee>> {
        let options = RequestOptions::get().query(filter.to_query());
        self.request(EMPLOYEES_PATH, options).await
    }

    pub async fn fetch_employee(&self, id: i64) -> RequestOutcome<Employee> {
        self.request(&employee_path(id), RequestOptions::get()).await
    }

    pub async fn create_employee(&self, input: &NewEmployee) -> RequestOutcome<NewEmployee> {
        local_validation(input.validate())?;
        self.request(EMPLOYEES_PATH, RequestOptions::post(input)?).await
    }

    pub async fn update_employee(
        &self,
        id: i64,
        input: &EmployeeUpdate,
    ) -> RequestOutcome<EmployeeUpdate> {
        local_validation(input.validate())?;
        self.request(&employee_path(id), RequestOptions::put(input)?)
            .await
    }

    pub async fn delete_employee(&self, id: i64) -> RequestOutcome<()> {
        self.request(&employee_path(id), RequestOptions::delete()).await
    }

    /// Set an employee's status without a local transition check.
    pub async fn update_employee_status(
        &self,
        id: i64,
        status: EmployeeStatus,
    ) -> RequestOutcome<Employee> {
        let body = json!({ "employee_status": status });
        self.request(&employee_status_path(id), RequestOptions::put(&body)?)
            .await
    }

    /// Move an employee along the onboarding workflow, refusing transitions
    /// the workflow does not allow before contacting the server.
    pub async fn transition_employee(
        &self,
        employee: &Employee,
        next: EmployeeStatus,
    ) -> RequestOutcome<Employee> {
        if !employee.employee_status.can_transition_to(next) {
            debug!(id = employee.id, from = employee.employee_status.as_str(), to = next.as_str(), "Refusing status transition");
            return Err(ApiError::ValidationError(format!(
                "Cannot transition from {} to {}",
                employee.employee_status.as_str(),
                next.as_str()
            )));
        }
        self.update_employee_status(employee.id, next).await
    }

    pub async fn fetch_employee_statistics(&self) -> RequestOutcome<EmployeeStatistics> {
        self.request(EMPLOYEE_STATS_PATH, RequestOptions::get()).await
    }
}
