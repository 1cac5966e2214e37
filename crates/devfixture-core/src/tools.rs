//! External tool preflight and the Postgres command set.

use std::path::Path;

use crate::{
    process::{Invocation, ProcessExecutor},
    Error, Result,
};

/// Executables every action needs.
pub const REQUIRED_TOOLS: [&str; 5] = ["psql", "dropdb", "createdb", "pg_dump", "git"];

/// Verify every required executable resolves on `PATH`.
///
/// All missing tools are reported at once rather than stopping at the first.
pub fn check_dependencies() -> Result<()> {
    check_dependencies_with(|tool| which::which(tool).is_ok())
}

/// Same as [`check_dependencies`] with an injected lookup.
pub fn check_dependencies_with<F>(is_available: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    let missing: Vec<String> = REQUIRED_TOOLS
        .iter()
        .filter(|tool| !is_available(tool))
        .map(|tool| (*tool).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        tracing::debug!(?missing, "dependency check failed");
        Err(Error::MissingDependency {
            required: REQUIRED_TOOLS.iter().map(|t| (*t).to_string()).collect(),
            missing,
        })
    }
}

/// The four database operations, expressed as external commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresTools {
    database: String,
}

impl PostgresTools {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `pg_dump --clean --if-exists --no-owner <db> > <dest>`
    ///
    /// `--if-exists` keeps the leading DROPs valid on a freshly created
    /// database, which matters once the load stops on the first error.
    pub fn dump_invocation(&self, dest: &Path) -> Invocation {
        Invocation::new("pg_dump")
            .args(["--clean", "--if-exists", "--no-owner"])
            .arg(&self.database)
            .stdout_to(dest)
    }

    /// `dropdb --if-exists <db>`
    pub fn drop_invocation(&self) -> Invocation {
        Invocation::new("dropdb")
            .arg("--if-exists")
            .arg(&self.database)
    }

    /// `createdb <db>`
    pub fn create_invocation(&self) -> Invocation {
        Invocation::new("createdb").arg(&self.database)
    }

    /// `psql -v ON_ERROR_STOP=1 --single-transaction <db> < <script>`
    ///
    /// Without `ON_ERROR_STOP` psql exits 0 after failed statements and a
    /// broken dump would load halfway without being reported.
    pub fn load_invocation(&self, script: &Path) -> Invocation {
        Invocation::new("psql")
            .args(["-v", "ON_ERROR_STOP=1", "--single-transaction"])
            .arg(&self.database)
            .stdin_from(script)
    }

    pub fn dump(&self, executor: &dyn ProcessExecutor, dest: &Path) -> Result<()> {
        executor.run_checked(&self.dump_invocation(dest)).map(|_| ())
    }

    pub fn drop_database(&self, executor: &dyn ProcessExecutor) -> Result<()> {
        executor.run_checked(&self.drop_invocation()).map(|_| ())
    }

    pub fn create_database(&self, executor: &dyn ProcessExecutor) -> Result<()> {
        executor.run_checked(&self.create_invocation()).map(|_| ())
    }

    pub fn load(&self, executor: &dyn ProcessExecutor, script: &Path) -> Result<()> {
        executor.run_checked(&self.load_invocation(script)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools_present() {
        assert!(check_dependencies_with(|_| true).is_ok());
    }

    #[test]
    fn test_reports_every_missing_tool() {
        let result = check_dependencies_with(|tool| tool != "pg_dump" && tool != "git");
        match result {
            Err(Error::MissingDependency { required, missing }) => {
                assert_eq!(required.len(), REQUIRED_TOOLS.len());
                assert_eq!(missing, vec!["pg_dump".to_string(), "git".to_string()]);
            }
            other => panic!("expected missing dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_postgres_invocations() {
        let pg = PostgresTools::new("devdb");
        let dest = Path::new("/stage/db.sql");

        let dump = pg.dump_invocation(dest);
        assert_eq!(dump.args, vec!["--clean", "--if-exists", "--no-owner", "devdb"]);
        assert_eq!(dump.stdout.as_deref(), Some(dest));

        assert_eq!(pg.drop_invocation().to_string(), "dropdb --if-exists devdb");
        assert_eq!(pg.create_invocation().to_string(), "createdb devdb");
        assert_eq!(
            pg.load_invocation(dest).to_string(),
            "psql -v ON_ERROR_STOP=1 --single-transaction devdb < /stage/db.sql"
        );
    }
}
