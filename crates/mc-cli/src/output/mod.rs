//! Output formatting utilities for the CLI
//!
//! Tables of connection headers, per-port action results and coloured
//! status messages.

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use mc_core::{Port, ProjectIdentity, Status};
use mc_orchestrator::{ConnectionHeader, Fetched};
use mc_protocol::ApiError;

/// Format connection headers as an ASCII table
///
/// Fields that could not be fetched show the error code instead of a value.
/// Returns "No instances found" for an empty slice.
pub fn format_headers(headers: &[ConnectionHeader]) -> String {
    if headers.is_empty() {
        return "No instances found".to_string();
    }

    #[derive(Tabled)]
    struct HeaderRow {
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "VERSION")]
        version: String,
        #[tabled(rename = "KIND")]
        kind: String,
        #[tabled(rename = "PROJECT")]
        project: String,
        #[tabled(rename = "APPLICATION")]
        application: String,
    }

    let rows: Vec<HeaderRow> = headers
        .iter()
        .map(|h| HeaderRow {
            port: h.port().get(),
            status: h.status().to_string(),
            version: field(h.product_info(), |info| info.to_string()),
            kind: field(h.project_identity(), |identity| kind(identity).to_string()),
            project: field(h.project_identity(), |identity| identity.name().to_string()),
            application: field(h.application_location(), |location| {
                location.path.display().to_string()
            }),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(120))
        .to_string()
}

/// Format the per-port statuses of headers returned by a bulk action
pub fn format_statuses(headers: &[ConnectionHeader]) -> String {
    if headers.is_empty() {
        return "No instances affected".to_string();
    }

    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "STATUS")]
        status: String,
    }

    let rows: Vec<StatusRow> = headers
        .iter()
        .map(|h| StatusRow {
            port: h.port().get(),
            status: h.status().to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn field<T>(value: &Fetched<T>, show: impl FnOnce(&T) -> String) -> String {
    match value {
        Ok(v) => show(v),
        Err(e) => format_api_error(e),
    }
}

fn format_api_error(error: &ApiError) -> String {
    format!("error {}", error.code)
}

fn kind(identity: &ProjectIdentity) -> &'static str {
    match identity {
        ProjectIdentity::Untitled => "untitled",
        ProjectIdentity::Solo { .. } => "solo",
        ProjectIdentity::Teamwork { .. } => "teamwork",
    }
}

/// Print one port's status, coloured by lifecycle state
pub fn print_status(port: Port, status: Status) {
    let color = match status {
        Status::Active => Color::Green,
        Status::Pending => Color::Yellow,
        Status::Failed => Color::Red,
        Status::Unassigned => Color::DarkGrey,
    };

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        Print(format!("{:>5}  ", port)),
        SetForegroundColor(color),
        Print(status),
        ResetColor,
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
