//! Human and JSON rendering of command results and failures.

use devfixture_core::{CatalogListing, CreateReport, Error, RestoreReport};
use serde::Serialize;
use serde_json::json;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON output format - structured, machine-readable
    Json,
    /// Human-readable output format - terminal-friendly
    #[default]
    Human,
}

impl OutputFormat {
    pub const fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }

    pub const fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    action: &'a str,
    #[serde(flatten)]
    data: &'a T,
}

fn print_json<T: Serialize>(action: &str, data: &T) -> anyhow::Result<()> {
    let envelope = Envelope {
        success: true,
        action,
        data,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

pub fn print_create(report: &CreateReport, format: OutputFormat) -> anyhow::Result<()> {
    if format.is_json() {
        return print_json("create", report);
    }

    println!("Created fixture {}", report.archive.display());
    if let Some(revision) = &report.revision_id {
        println!("  revision: {revision}");
    }
    println!(
        "  {} archive entries, {} media files",
        report.entries.len(),
        report.media_files
    );
    Ok(())
}

pub fn print_restore(report: &RestoreReport, format: OutputFormat) -> anyhow::Result<()> {
    if format.is_json() {
        return print_json("restore", report);
    }

    println!("Restored fixture {}", report.fixture.display());
    if let Some(revision) = &report.revision_id {
        println!("  revision: {revision}");
    }
    println!("  safety backup: {}", report.backup.display());
    Ok(())
}

pub fn print_list(listing: &CatalogListing, format: OutputFormat) -> anyhow::Result<()> {
    if format.is_json() {
        return print_json("list", listing);
    }

    if listing.fixtures.is_empty() {
        println!("No fixtures in {}", listing.fixtures_dir.display());
        return Ok(());
    }

    println!("Fixtures in {}:", listing.fixtures_dir.display());
    println!(
        "  {:<2}{:<12} {:<20} {:<20} {}",
        "", "REVISION", "REVISION DATE", "CREATED", "USER"
    );
    for fixture in &listing.fixtures {
        let marker = if fixture.selected { "*" } else { "" };
        match &fixture.name {
            Some(name) => println!(
                "  {marker:<2}{:<12} {:<20} {:<20} {}",
                name.revision_id, name.revision_date, name.created_at, name.user
            ),
            None => println!(
                "  {marker:<2}{:<12} {}",
                fixture.archive.revision_id,
                fixture.archive.path.display()
            ),
        }
    }
    if listing.selected.is_none() {
        println!("No fixture matches the current history.");
    }
    Ok(())
}

/// Report a failed command on stderr, or as JSON on stdout.
pub fn print_failure(action: &str, err: &anyhow::Error, format: OutputFormat) {
    let core = err.downcast_ref::<Error>();
    let retained = core.map(Error::retained_staging_dirs).unwrap_or_default();

    if format.is_json() {
        let body = json!({
            "success": false,
            "action": action,
            "error": {
                "code": core.map_or("ERROR", Error::code),
                "message": err.to_string(),
                "exit_code": exit_code(err),
                "suggestion": core.and_then(Error::suggestion),
                "fatal": core.is_some_and(Error::is_fatal),
                "recovered": core.is_some_and(Error::is_recovered),
                "retained_staging_dirs": retained,
            }
        });
        match serde_json::to_string_pretty(&body) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: {err} (and failed to render JSON: {e})"),
        }
        return;
    }

    if core.is_some_and(Error::is_fatal) {
        eprintln!();
        eprintln!("╔════════════════════════════════════════════════════════════════════════╗");
        eprintln!("║  LIVE STATE INDETERMINATE: restore and rollback both failed            ║");
        eprintln!("╚════════════════════════════════════════════════════════════════════════╝");
        eprintln!();
    }

    eprintln!("Error: {action} failed: {}", format_error(err));
    if let Some(suggestion) = core.and_then(Error::suggestion) {
        eprintln!("Hint: {suggestion}");
    }
    for dir in &retained {
        eprintln!("Staging directory kept: {}", dir.display());
    }
}

pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_flag() {
        assert_eq!(OutputFormat::from_json_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_json_flag(false), OutputFormat::Human);
    }

    #[test]
    fn test_exit_code_falls_back_to_one() {
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
        let core: anyhow::Error = Error::NoMatchFound("none".into()).into();
        assert_eq!(exit_code(&core), 3);
    }

    #[test]
    fn test_envelope_flattens_report() -> anyhow::Result<()> {
        let report = RestoreReport {
            fixture: "/f/a.zip".into(),
            backup: "/b/b.zip".into(),
            revision_id: Some("abc".into()),
        };
        let envelope = Envelope {
            success: true,
            action: "restore",
            data: &report,
        };
        let value = serde_json::to_value(&envelope)?;
        assert_eq!(value["success"], true);
        assert_eq!(value["fixture"], "/f/a.zip");
        assert_eq!(value["revision_id"], "abc");
        Ok(())
    }
}
