//! The application context: one token store, API client, auth session and
//! fetch cache, built once and shared behind an `Arc`.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{ApiClient, ApiError, RequestOutcome};
use crate::auth::{AuthSession, SessionError, TokenBackend, TokenStore};
use crate::cache::{keys, FetchCache, Subscription};
use crate::config::Config;
use crate::models::{
    Company, CompanyFilter, CompanyInput, CompanyStatistics, Department, DepartmentStatistics,
    DepartmentUpdate, Employee, EmployeeFilter, EmployeeStatistics, EmployeeStatus,
    EmployeeUpdate, LoginCredentials, NewDepartment, NewEmployee, UserProfile,
};

// Key prefixes touched by each kind of mutation. Lists embed counts and names
// from related entities, so a change fans out.
const COMPANY_PREFIXES: &[&str] = &["/companies/", "/departments/", "/employees/"];
const DEPARTMENT_PREFIXES: &[&str] = &["/departments/", "/companies/", "/employees/"];
const EMPLOYEE_PREFIXES: &[&str] = &["/employees/", "/departments/", "/companies/"];

pub struct AppContext {
    config: Config,
    api: ApiClient,
    session: AuthSession,
    cache: FetchCache,
}

impl AppContext {
    /// Build a context over an explicit token backend.
    pub fn new(config: Config, backend: Arc<dyn TokenBackend>) -> Result<Arc<Self>> {
        let tokens = TokenStore::new(backend);
        let api = ApiClient::new(&config.api_base_url, config.request_timeout(), tokens)?;
        let session = AuthSession::new(api.clone());
        let cache = FetchCache::new(config.revalidation_policy());
        debug!(base_url = %config.api_base_url, "Application context ready");
        Ok(Arc::new(Self {
            config,
            api,
            session,
            cache,
        }))
    }

    /// Build a context with the token backend the configuration selects.
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let backend = config.token_backend()?;
        Self::new(config, backend)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    // ===== Session =====

    /// Sign in. Cached data from any previous session is dropped first.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, SessionError> {
        let user = self.session.login(credentials).await?;
        self.cache.clear();
        Ok(user)
    }

    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let notify = self.session.logout();
        self.cache.clear();
        notify
    }

    /// Mirror a rejected credential seen by a cached fetch into the session.
    fn observe<T>(&self, outcome: RequestOutcome<T>) -> RequestOutcome<T> {
        if matches!(outcome, Err(ApiError::AuthenticationRequired)) && self.session.is_authenticated() {
            self.session.invalidate();
            self.cache.clear();
        }
        outcome
    }

    async fn cached<T, F, Fut>(&self, key: &str, fetcher: F) -> RequestOutcome<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
    {
        let api = self.api.clone();
        let outcome = self.cache.fetch(key, move || fetcher(api.clone())).await;
        self.observe(outcome)
    }

    fn invalidate(&self, prefixes: &[&str]) {
        for prefix in prefixes {
            self.cache.invalidate(prefix);
        }
    }

    fn after_mutation<T>(&self, outcome: RequestOutcome<T>, prefixes: &[&str]) -> RequestOutcome<T> {
        if outcome.is_ok() {
            self.invalidate(prefixes);
        }
        self.observe(outcome)
    }

    // ===== Cached reads =====

    pub async fn profile(&self) -> RequestOutcome<Arc<UserProfile>> {
        self.cached(keys::PROFILE, |api| async move { api.fetch_profile().await })
            .await
    }

    pub async fn companies(&self, filter: &CompanyFilter) -> RequestOutcome<Arc<Vec<Company>>> {
        let owned = filter.clone();
        self.cached(&keys::companies(filter), move |api| {
            let filter = owned.clone();
            async move { api.fetch_companies(&filter).await }
        })
        .await
    }

    pub async fn company(&self, id: i64) -> RequestOutcome<Arc<Company>> {
        self.cached(&keys::company(id), move |api| async move { api.fetch_company(id).await })
            .await
    }

    /// Name search. A blank query yields an empty list without a request.
    pub async fn search_companies(&self, query: &str) -> RequestOutcome<Arc<Vec<Company>>> {
        let owned = query.to_string();
        self.cached(&keys::company_search(query), move |api| {
            let query = owned.clone();
            async move { api.search_companies(&query).await }
        })
        .await
    }

    pub async fn company_departments(&self, id: i64) -> RequestOutcome<Arc<Vec<Department>>> {
        self.cached(&keys::company_departments(id), move |api| async move {
            api.fetch_company_departments(id).await
        })
        .await
    }

    pub async fn company_employees(&self, id: i64) -> RequestOutcome<Arc<Vec<Employee>>> {
        self.cached(&keys::company_employees(id), move |api| async move {
            api.fetch_company_employees(id).await
        })
        .await
    }

    pub async fn departments(&self) -> RequestOutcome<Arc<Vec<Department>>> {
        self.cached(keys::DEPARTMENTS, |api| async move { api.fetch_departments().await })
            .await
    }

    pub async fn department(&self, id: i64) -> RequestOutcome<Arc<Department>> {
        self.cached(&keys::department(id), move |api| async move {
            api.fetch_department(id).await
        })
        .await
    }

    pub async fn department_employees(&self, id: i64) -> RequestOutcome<Arc<Vec<Employee>>> {
        self.cached(&keys::department_employees(id), move |api| async move {
            api.fetch_department_employees(id).await
        })
        .await
    }

    pub async fn employees(&self, filter: &EmployeeFilter) -> RequestOutcome<Arc<Vec<Employee>>> {
        let owned = filter.clone();
        self.cached(&keys::employees(filter), move |api| {
            let filter = owned.clone();
            async move { api.fetch_employees(&filter).await }
        })
        .await
    }

    pub async fn employee(&self, id: i64) -> RequestOutcome<Arc<Employee>> {
        self.cached(&keys::employee(id), move |api| async move { api.fetch_employee(id).await })
            .await
    }

    pub async fn company_statistics(&self) -> RequestOutcome<Arc<CompanyStatistics>> {
        self.cached(keys::COMPANY_STATISTICS, |api| async move {
            api.fetch_company_statistics().await
        })
        .await
    }

    pub async fn department_statistics(&self) -> RequestOutcome<Arc<DepartmentStatistics>> {
        self.cached(keys::DEPARTMENT_STATISTICS, |api| async move {
            api.fetch_department_statistics().await
        })
        .await
    }

    pub async fn employee_statistics(&self) -> RequestOutcome<Arc<EmployeeStatistics>> {
        self.cached(keys::EMPLOYEE_STATISTICS, |api| async move {
            api.fetch_employee_statistics().await
        })
        .await
    }

    /// Follow the employee list for `filter`. Must be called from within a
    /// tokio runtime.
    pub fn watch_employees(&self, filter: &EmployeeFilter) -> Subscription<Vec<Employee>> {
        let api = self.api.clone();
        let owned = filter.clone();
        self.cache.subscribe(&keys::employees(filter), move || {
            let api = api.clone();
            let filter = owned.clone();
            async move { api.fetch_employees(&filter).await }
        })
    }

    // ===== Mutations =====

    pub async fn create_company(&self, input: &CompanyInput) -> RequestOutcome<CompanyInput> {
        let outcome = self.api.create_company(input).await;
        self.after_mutation(outcome, COMPANY_PREFIXES)
    }

    pub async fn update_company(&self, id: i64, input: &CompanyInput) -> RequestOutcome<CompanyInput> {
        let outcome = self.api.update_company(id, input).await;
        self.after_mutation(outcome, COMPANY_PREFIXES)
    }

    pub async fn delete_company(&self, id: i64) -> RequestOutcome<()> {
        let outcome = self.api.delete_company(id).await;
        self.after_mutation(outcome, COMPANY_PREFIXES)
    }

    pub async fn create_department(&self, input: &NewDepartment) -> RequestOutcome<NewDepartment> {
        let outcome = self.api.create_department(input).await;
        self.after_mutation(outcome, DEPARTMENT_PREFIXES)
    }

    pub async fn update_department(
        &self,
        id: i64,
        input: &DepartmentUpdate,
    ) -> RequestOutcome<DepartmentUpdate> {
        let outcome = self.api.update_department(id, input).await;
        self.after_mutation(outcome, DEPARTMENT_PREFIXES)
    }

    pub async fn delete_department(&self, id: i64) -> RequestOutcome<()> {
        let outcome = self.api.delete_department(id).await;
        self.after_mutation(outcome, DEPARTMENT_PREFIXES)
    }

    pub async fn create_employee(&self, input: &NewEmployee) -> RequestOutcome<NewEmployee> {
        let outcome = self.api.create_employee(input).await;
        self.after_mutation(outcome, EMPLOYEE_PREFIXES)
    }

    pub async fn update_employee(
        &self,
        id: i64,
        input: &EmployeeUpdate,
    ) -> RequestOutcome<EmployeeUpdate> {
        let outcome = self.api.update_employee(id, input).await;
        self.after_mutation(outcome, EMPLOYEE_PREFIXES)
    }

    pub async fn delete_employee(&self, id: i64) -> RequestOutcome<()> {
        let outcome = self.api.delete_employee(id).await;
        self.after_mutation(outcome, EMPLOYEE_PREFIXES)
    }

    /// Move an employee to `next`, checking the workflow against the current
    /// record first.
    pub async fn transition_employee(&self, id: i64, next: EmployeeStatus) -> RequestOutcome<Employee> {
        let current = self.employee(id).await?;
        let outcome = self.api.transition_employee(&current, next).await;
        self.after_mutation(outcome, EMPLOYEE_PREFIXES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_tokens::valid;
    use crate::auth::{MemoryBackend, SessionStatus, ACCESS_TOKEN_KEY};
    use mockito::{Matcher, Server};

    fn context_for(url: &str) -> (Arc<AppContext>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let config = Config {
            api_base_url: url.to_string(),
            ..Default::default()
        };
        (AppContext::new(config, backend.clone()).unwrap(), backend)
    }

    const COMPANIES: &str = r#"[{"id": 1, "name": "Acme", "number_of_departments": 2, "number_of_employees": 5}]"#;

    #[tokio::test]
    async fn test_cached_reads_share_one_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/companies/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(COMPANIES)
            .expect(1)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();

        let filter = CompanyFilter::default();
        let (a, b) = tokio::join!(ctx.companies(&filter), ctx.companies(&filter));
        m.assert_async().await;
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_mutation_makes_list_refetch() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/companies/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(COMPANIES)
            .expect(2)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/companies/")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "Globex"}"#)
            .expect(1)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();

        ctx.companies(&CompanyFilter::default()).await.unwrap();
        let created = ctx
            .create_company(&CompanyInput {
                name: "Globex".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Globex");
        ctx.companies(&CompanyFilter::default()).await.unwrap();

        create.assert_async().await;
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_fetch_ends_session() {
        let mut server = Server::new_async().await;
        let _profile = server
            .mock("GET", "/auth/profile/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 1, "email": "ada@example.com"}"#)
            .create_async()
            .await;
        let _employees = server
            .mock("GET", "/employees/")
            .with_status(401)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        ctx.session().initialize().await;
        assert!(ctx.session().is_authenticated());

        let result = ctx.employees(&EmployeeFilter::default()).await;
        assert_eq!(result.unwrap_err(), ApiError::AuthenticationRequired);
        assert!(!ctx.session().is_authenticated());
        assert_eq!(ctx.tokens().current_valid_access(), None);
    }

    #[tokio::test]
    async fn test_rejected_nested_list_ends_session() {
        let mut server = Server::new_async().await;
        let _profile = server
            .mock("GET", "/auth/profile/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 1, "email": "ada@example.com"}"#)
            .create_async()
            .await;
        let _members = server
            .mock("GET", "/departments/7/employees/")
            .with_status(401)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        ctx.session().initialize().await;
        assert!(ctx.session().is_authenticated());

        let result = ctx.department_employees(7).await;
        assert_eq!(result.unwrap_err(), ApiError::AuthenticationRequired);
        assert_eq!(ctx.session().state().status, SessionStatus::Anonymous);
        assert_eq!(ctx.session().user(), None);
        assert_eq!(ctx.tokens().current_valid_access(), None);
    }

    #[tokio::test]
    async fn test_filters_with_reserved_characters_are_fetched_separately() {
        let mut server = Server::new_async().await;
        let combined = server
            .mock("GET", "/employees/")
            .match_query(Matcher::UrlEncoded("search".into(), "x&designation=y".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let separate = server
            .mock("GET", "/employees/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search".into(), "x".into()),
                Matcher::UrlEncoded("designation".into(), "y".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();

        ctx.employees(&EmployeeFilter {
            search: Some("x&designation=y".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        ctx.employees(&EmployeeFilter {
            search: Some("x".to_string()),
            designation: Some("y".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        combined.assert_async().await;
        separate.assert_async().await;
    }

    #[tokio::test]
    async fn test_disallowed_transition_sends_nothing() {
        let mut server = Server::new_async().await;
        let _employee = server
            .mock("GET", "/employees/4/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id": 4, "company": 1, "department": 2, "employee_status": "hired",
                    "name": "Grace", "email": "grace@example.com", "designation": "Engineer",
                    "hired_on": "2024-03-01"}"#,
            )
            .create_async()
            .await;
        let status = server
            .mock("PUT", "/employees/4/status/")
            .expect(0)
            .create_async()
            .await;

        let (ctx, backend) = context_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();

        let err = ctx
            .transition_employee(4, EmployeeStatus::InterviewScheduled)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::ValidationError("Cannot transition from hired to interview_scheduled".to_string())
        );
        status.assert_async().await;
    }
}
