//! Plain-text rendering for `--output table`.

use chrono::{DateTime, NaiveDate, Utc};
use staffdesk_core::models::{Company, Department, Employee, UserProfile};

const NAME_WIDTH: usize = 28;

/// Format a phone number for display.
/// Ten-digit numbers (optionally with a leading 1) become (XXX) XXX-XXXX.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10]),
        11 if digits.starts_with('1') => {
            format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..11])
        }
        _ => phone.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn format_optional(value: Option<&str>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or(default).to_string()
}

pub fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn company_table(companies: &[Company]) -> String {
    let mut out = format!("{:<6} {:<NAME_WIDTH$} {:>11} {:>9}\n", "ID", "NAME", "DEPARTMENTS", "EMPLOYEES");
    for company in companies {
        out.push_str(&format!(
            "{:<6} {:<NAME_WIDTH$} {:>11} {:>9}\n",
            company.id,
            truncate_string(&company.name, NAME_WIDTH),
            company.number_of_departments,
            company.number_of_employees
        ));
    }
    out
}

pub fn department_table(departments: &[Department]) -> String {
    let mut out = format!("{:<6} {:<NAME_WIDTH$} {:<NAME_WIDTH$} {:>9}\n", "ID", "NAME", "COMPANY", "EMPLOYEES");
    for department in departments {
        out.push_str(&format!(
            "{:<6} {:<NAME_WIDTH$} {:<NAME_WIDTH$} {:>9}\n",
            department.id,
            truncate_string(&department.name, NAME_WIDTH),
            truncate_string(department.company_display(), NAME_WIDTH),
            department.number_of_employees
        ));
    }
    out
}

pub fn employee_table(employees: &[Employee]) -> String {
    let mut out = format!(
        "{:<6} {:<NAME_WIDTH$} {:<20} {:<20} {:<12}\n",
        "ID", "NAME", "DESIGNATION", "STATUS", "HIRED"
    );
    for employee in employees {
        out.push_str(&format!(
            "{:<6} {:<NAME_WIDTH$} {:<20} {:<20} {:<12}\n",
            employee.id,
            truncate_string(&employee.name, NAME_WIDTH),
            truncate_string(&employee.designation, 20),
            employee.employee_status.display_name(),
            format_date(employee.hired_on)
        ));
    }
    out
}

pub fn employee_detail(employee: &Employee) -> String {
    let rows = [
        ("Name", employee.name.clone()),
        ("Email", employee.email.clone()),
        (
            "Mobile",
            employee
                .mobile_number
                .as_deref()
                .map(format_phone)
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Address", format_optional(employee.address.as_deref(), "-")),
        ("Company", employee.company_display().to_string()),
        ("Department", employee.department_display().to_string()),
        ("Designation", format_optional(Some(&employee.designation), "-")),
        ("Status", employee.employee_status.display_name().to_string()),
        ("Hired", format_date(employee.hired_on)),
        (
            "Days employed",
            employee
                .days_employed
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Created", format_timestamp(employee.created_at)),
    ];
    rows.iter()
        .map(|(label, value)| format!("{:<14} {}\n", format!("{}:", label), value))
        .collect()
}

pub fn profile_detail(user: &UserProfile) -> String {
    let role = user
        .role
        .map(|r| format!("{:?}", r).to_lowercase())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\n  email:   {}\n  role:    {}\n  joined:  {}\n",
        user.display_name(),
        format_optional(user.email.as_deref(), "-"),
        role,
        format_timestamp(user.date_joined)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use staffdesk_core::models::EmployeeStatus;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone("+15551234567"), "(555) 123-4567");
        assert_eq!(format_phone("555-123-4567"), "(555) 123-4567");
        assert_eq!(format_phone("+441234567890"), "+441234567890");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Zoë Ångström", 6), "Zoë...");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(format_date(date), "Mar 01, 2024");
        assert_eq!(format_date(None), "-");
    }

    #[test]
    fn test_employee_table_rows() {
        let employees: Vec<Employee> = serde_json::from_str(
            r#"[{"id": 1, "name": "Grace", "email": "g@example.com", "designation": "Engineer",
                 "employee_status": "interview_scheduled"}]"#,
        )
        .unwrap();
        let table = employee_table(&employees);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("Grace"));
        assert!(lines[1].contains(EmployeeStatus::InterviewScheduled.display_name()));
    }
}
