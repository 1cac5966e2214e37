//! CLI command definitions using `clap`

use clap::{Arg, ArgAction, Command as ClapCommand};

pub fn after_help_text(examples: &[&str]) -> String {
    let mut text = String::from("EXAMPLES:\n");
    for example in examples {
        text.push_str("  ");
        text.push_str(example);
        text.push('\n');
    }
    text
}

fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("fixtures-dir")
            .short('d')
            .long("fixtures-dir")
            .global(true)
            .value_name("DIR")
            .help("Fixtures directory [default: fixtures]"),
        Arg::new("backup-dir")
            .short('b')
            .long("backup-dir")
            .global(true)
            .value_name("DIR")
            .help("Safety backup directory [default: fixtures/backups]"),
        Arg::new("fixture-file")
            .short('f')
            .long("fixture-file")
            .global(true)
            .value_name("FILE")
            .help("Archive to create or restore from, bypassing automatic naming and selection"),
        Arg::new("database")
            .long("database")
            .global(true)
            .value_name("NAME")
            .help("Database to dump and restore"),
        Arg::new("media-root")
            .long("media-root")
            .global(true)
            .value_name("DIR")
            .help("Media directory to snapshot and restore"),
        Arg::new("json")
            .long("json")
            .global(true)
            .action(ArgAction::SetTrue)
            .help("Output as JSON"),
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .action(ArgAction::Count)
            .help("More logging (-v debug, -vv trace)"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .global(true)
            .action(ArgAction::SetTrue)
            .conflicts_with("verbose")
            .help("Only log errors"),
    ]
}

pub fn cmd_create() -> ClapCommand {
    ClapCommand::new("create")
        .about("Snapshot the database and media into a fixture archive")
        .long_about(
            "Copies the media root and a pg_dump of the database into a staging \
             directory and packs them into one zip archive. Without --fixture-file \
             the archive is named after the checked-out git revision and written \
             to the fixtures directory.",
        )
        .after_help(after_help_text(&[
            "devfixture create                     Fixture for the current revision",
            "devfixture create -f /tmp/before      Write /tmp/before.zip",
            "devfixture create --json              Report the archive as JSON",
        ]))
}

pub fn cmd_restore() -> ClapCommand {
    ClapCommand::new("restore")
        .about("Replace the database and media with a fixture")
        .long_about(
            "Takes a safety backup of the current state, then restores the newest \
             fixture whose revision is in the current git history (or the file \
             given with --fixture-file). If the restore fails the safety backup is \
             restored automatically.",
        )
        .after_help(after_help_text(&[
            "devfixture restore                    Restore the best matching fixture",
            "devfixture restore -f fixtures/x.zip  Restore a specific archive",
            "devfixture restore -v                 Log every external command",
        ]))
}

pub fn cmd_list() -> ClapCommand {
    ClapCommand::new("list")
        .about("List fixtures and show which one restore would pick")
        .after_help(after_help_text(&[
            "devfixture list                       Table of fixtures",
            "devfixture list --json                Machine-readable catalog",
        ]))
}

pub fn build_cli() -> ClapCommand {
    ClapCommand::new("devfixture")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Development fixture manager: snapshot and restore database + media")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(global_args())
        .subcommand(cmd_create())
        .subcommand(cmd_restore())
        .subcommand(cmd_list())
}
