//! Subcommand definitions and their handlers.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, warn};

use staffdesk_core::models::{
    CompanyFilter, CompanyInput, DepartmentUpdate, EmployeeFilter, EmployeeStatus, EmployeeUpdate,
    LoginCredentials, NewDepartment, NewEmployee, ProfileUpdate, Registration, UserRole,
};
use staffdesk_core::AppContext;

use crate::format;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session tokens
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// admin, manager or employee
        #[arg(long, value_parser = parse_role)]
        role: Option<UserRole>,
    },
    /// Show the signed-in user
    Whoami,
    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    Companies {
        #[command(subcommand)]
        command: CompanyCommand,
    },
    Departments {
        #[command(subcommand)]
        command: DepartmentCommand,
    },
    Employees {
        #[command(subcommand)]
        command: EmployeeCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    Update {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CompanyCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        min_employees: Option<u32>,
        #[arg(long)]
        min_departments: Option<u32>,
    },
    Show { id: i64 },
    Create { name: String },
    Update { id: i64, name: String },
    Delete { id: i64 },
    Search { query: String },
    Stats,
    /// Departments of a company
    Departments { id: i64 },
    /// Employees of a company
    Employees { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum DepartmentCommand {
    List,
    Show { id: i64 },
    Create {
        #[arg(long)]
        company: i64,
        name: String,
    },
    Update { id: i64, name: String },
    Delete { id: i64 },
    Stats,
    /// Employees of a department
    Employees { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum EmployeeCommand {
    List {
        #[arg(long)]
        company: Option<i64>,
        #[arg(long)]
        department: Option<i64>,
        #[arg(long)]
        status: Option<EmployeeStatus>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        designation: Option<String>,
    },
    Show { id: i64 },
    Create {
        #[arg(long)]
        company: i64,
        #[arg(long)]
        department: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        designation: String,
        #[arg(long, default_value = "application_received")]
        status: EmployeeStatus,
        /// YYYY-MM-DD, required when the status is hired
        #[arg(long)]
        hired_on: Option<NaiveDate>,
    },
    /// Change fields of an employee; unset flags keep their current values
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        #[arg(long)]
        hired_on: Option<NaiveDate>,
    },
    Delete { id: i64 },
    /// Move an employee along the onboarding workflow
    Status { id: i64, status: EmployeeStatus },
    Stats,
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase()))
        .map_err(|_| format!("Unknown role: {} (expected admin, manager or employee)", value))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table<T: Serialize + ?Sized>(output: OutputFormat, value: &T, table: impl FnOnce() -> String) -> Result<()> {
    match output {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            print!("{}", table());
            Ok(())
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

fn require_login(ctx: &AppContext) -> Result<()> {
    ctx.session().require_authenticated()?;
    Ok(())
}

pub async fn run(ctx: &AppContext, command: Command, output: OutputFormat) -> Result<()> {
    match command {
        Command::Login { email } => login(ctx, email).await,
        Command::Logout => {
            if let Some(notify) = ctx.logout() {
                if let Err(e) = notify.await {
                    warn!(error = %e, "Logout notification task failed");
                }
            }
            eprintln!("Logged out");
            Ok(())
        }
        Command::Register {
            email,
            username,
            first_name,
            last_name,
            role,
        } => {
            let password = prompt_password("Password: ")?;
            let password_confirm = prompt_password("Confirm password: ")?;
            let registration = Registration {
                email,
                username,
                first_name,
                last_name,
                role,
                password,
                password_confirm,
            };
            let user = ctx.session().register(&registration).await?;
            eprintln!("Account created for {}. You can now log in.", user.display_name());
            Ok(())
        }
        Command::Whoami => {
            require_login(ctx)?;
            let user = ctx
                .session()
                .user()
                .ok_or_else(|| anyhow!("No profile loaded"))?;
            print_table(output, &user, || format::profile_detail(&user))
        }
        Command::Profile { command } => profile(ctx, command, output).await,
        Command::Companies { command } => companies(ctx, command, output).await,
        Command::Departments { command } => departments(ctx, command, output).await,
        Command::Employees { command } => employees(ctx, command, output).await,
    }
}

async fn login(ctx: &AppContext, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config().last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        bail!("An email address is required");
    }
    let password = prompt_password(&format!("Password for {}: ", email))?;

    let user = ctx
        .login(&LoginCredentials {
            email: email.clone(),
            password,
        })
        .await?;

    let mut config = ctx.config().clone();
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to remember last email");
    }

    eprintln!("Logged in as {}", user.display_name());
    Ok(())
}

async fn profile(ctx: &AppContext, command: ProfileCommand, output: OutputFormat) -> Result<()> {
    require_login(ctx)?;
    match command {
        ProfileCommand::Update {
            email,
            username,
            first_name,
            last_name,
            password,
        } => {
            let mut update = ProfileUpdate {
                email,
                username,
                first_name,
                last_name,
                ..Default::default()
            };
            if password {
                update.password = Some(prompt_password("New password: ")?);
                update.password_confirm = Some(prompt_password("Confirm new password: ")?);
            }
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let user = ctx.session().update_profile(&update).await?;
            print_table(output, &user, || format::profile_detail(&user))
        }
    }
}

async fn companies(ctx: &AppContext, command: CompanyCommand, output: OutputFormat) -> Result<()> {
    require_login(ctx)?;
    match command {
        CompanyCommand::List {
            search,
            min_employees,
            min_departments,
        } => {
            let filter = CompanyFilter {
                search,
                min_employees,
                min_departments,
            };
            let list = ctx.companies(&filter).await?;
            print_table(output, &*list, || format::company_table(&list))
        }
        CompanyCommand::Show { id } => {
            let company = ctx.company(id).await?;
            print_table(output, &*company, || format::company_table(std::slice::from_ref(&*company)))
        }
        CompanyCommand::Create { name } => print_json(&ctx.create_company(&CompanyInput { name }).await?),
        CompanyCommand::Update { id, name } => {
            print_json(&ctx.update_company(id, &CompanyInput { name }).await?)
        }
        CompanyCommand::Delete { id } => {
            ctx.delete_company(id).await?;
            eprintln!("Deleted company {}", id);
            Ok(())
        }
        CompanyCommand::Search { query } => {
            let list = ctx.search_companies(&query).await?;
            print_table(output, &*list, || format::company_table(&list))
        }
        CompanyCommand::Stats => print_json(&*ctx.company_statistics().await?),
        CompanyCommand::Departments { id } => {
            let list = ctx.company_departments(id).await?;
            print_table(output, &*list, || format::department_table(&list))
        }
        CompanyCommand::Employees { id } => {
            let list = ctx.company_employees(id).await?;
            print_table(output, &*list, || format::employee_table(&list))
        }
    }
}

async fn departments(ctx: &AppContext, command: DepartmentCommand, output: OutputFormat) -> Result<()> {
    require_login(ctx)?;
    match command {
        DepartmentCommand::List => {
            let list = ctx.departments().await?;
            print_table(output, &*list, || format::department_table(&list))
        }
        DepartmentCommand::Show { id } => {
            let department = ctx.department(id).await?;
            print_table(output, &*department, || {
                format::department_table(std::slice::from_ref(&*department))
            })
        }
        DepartmentCommand::Create { company, name } => {
            print_json(&ctx.create_department(&NewDepartment { company, name }).await?)
        }
        DepartmentCommand::Update { id, name } => {
            print_json(&ctx.update_department(id, &DepartmentUpdate { name }).await?)
        }
        DepartmentCommand::Delete { id } => {
            ctx.delete_department(id).await?;
            eprintln!("Deleted department {}", id);
            Ok(())
        }
        DepartmentCommand::Stats => print_json(&*ctx.department_statistics().await?),
        DepartmentCommand::Employees { id } => {
            let list = ctx.department_employees(id).await?;
            print_table(output, &*list, || format::employee_table(&list))
        }
    }
}

async fn employees(ctx: &AppContext, command: EmployeeCommand, output: OutputFormat) -> Result<()> {
    require_login(ctx)?;
    match command {
        EmployeeCommand::List {
            company,
            department,
            status,
            search,
            designation,
        } => {
            let filter = EmployeeFilter {
                company,
                department,
                status,
                search,
                designation,
            };
            let list = ctx.employees(&filter).await?;
            print_table(output, &*list, || format::employee_table(&list))
        }
        EmployeeCommand::Show { id } => {
            let employee = ctx.employee(id).await?;
            print_table(output, &*employee, || format::employee_detail(&employee))
        }
        EmployeeCommand::Create {
            company,
            department,
            name,
            email,
            mobile,
            address,
            designation,
            status,
            hired_on,
        } => {
            let input = NewEmployee {
                company,
                department,
                employee_status: status,
                name,
                email,
                mobile_number: mobile,
                address,
                designation,
                hired_on,
            };
            print_json(&ctx.create_employee(&input).await?)
        }
        EmployeeCommand::Update {
            id,
            name,
            email,
            mobile,
            address,
            designation,
            hired_on,
        } => {
            let current = ctx.employee(id).await?;
            let mut update = EmployeeUpdate::from(&*current);
            if let Some(name) = name {
                update.name = name;
            }
            if let Some(email) = email {
                update.email = email;
            }
            if let Some(mobile) = mobile {
                update.mobile_number = mobile;
            }
            if let Some(address) = address {
                update.address = address;
            }
            if let Some(designation) = designation {
                update.designation = designation;
            }
            if hired_on.is_some() {
                update.hired_on = hired_on;
            }
            debug!(id, "Updating employee");
            print_json(&ctx.update_employee(id, &update).await?)
        }
        EmployeeCommand::Delete { id } => {
            ctx.delete_employee(id).await?;
            eprintln!("Deleted employee {}", id);
            Ok(())
        }
        EmployeeCommand::Status { id, status } => {
            let employee = ctx.transition_employee(id, status).await?;
            print_table(output, &employee, || format::employee_detail(&employee))
        }
        EmployeeCommand::Stats => print_json(&*ctx.employee_statistics().await?),
    }
}
