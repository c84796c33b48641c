//! Data models for staffdesk entities.
//!
//! This module contains the wire types exchanged with the backend:
//!
//! - `Company`, `Department`, `Employee`: the managed entities, plus the
//!   input types sent on create/update
//! - `EmployeeStatus`: the onboarding workflow and its allowed transitions
//! - `UserProfile` and the credential/registration payloads
//! - Statistics views for the dashboard endpoints
//!
//! Create and update endpoints echo the submitted fields back rather than
//! the full record, so those calls return the input types.

pub mod company;
pub mod department;
pub mod employee;
pub mod statistics;
pub mod user;

pub use company::{Company, CompanyFilter, CompanyInput};
pub use department::{CompanyRef, Department, DepartmentUpdate, NewDepartment};
pub use employee::{
    DepartmentRef, Employee, EmployeeFilter, EmployeeStatus, EmployeeUpdate, NewEmployee,
};
pub use statistics::{
    CompanyStatistics, DepartmentCompanyCount, DepartmentStatistics, EmployeeStatistics,
    GroupCount, StatusCount,
};
pub use user::{LoginCredentials, LoginResponse, ProfileUpdate, Registration, UserProfile, UserRole};
