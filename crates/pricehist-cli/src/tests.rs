use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["pricehist-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["pricehist-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["pricehist-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn recompute_requires_channel() {
    assert!(Cli::try_parse_from(["pricehist-cli", "recompute"]).is_err());

    let cli = Cli::try_parse_from(["pricehist-cli", "recompute", "--channel", "WEB"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Recompute { ref channel }) if channel == "WEB"
    ));
}

#[test]
fn apply_collects_ids() {
    let cli = Cli::try_parse_from(["pricehist-cli", "apply", "1", "3", "4"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Apply { ref ids }) if ids == &[1, 3, 4]
    ));
}

#[test]
fn apply_without_ids_is_rejected() {
    assert!(Cli::try_parse_from(["pricehist-cli", "apply"]).is_err());
    assert!(Cli::try_parse_from(["pricehist-cli", "apply", "abc"]).is_err());
}

#[test]
fn purge_defaults_to_config_values() {
    let cli = Cli::try_parse_from(["pricehist-cli", "purge"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Purge {
            days: None,
            batch_size: None,
            dry_run: false
        })
    ));
}

#[test]
fn purge_accepts_overrides() {
    let cli = Cli::try_parse_from([
        "pricehist-cli",
        "purge",
        "--days",
        "30",
        "--batch-size",
        "500",
        "--dry-run",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Purge {
            days: Some(30),
            batch_size: Some(500),
            dry_run: true
        })
    ));
}

#[test]
fn purge_rejects_out_of_range_values() {
    for days in ["0", "36501"] {
        assert!(
            Cli::try_parse_from(["pricehist-cli", "purge", "--days", days]).is_err(),
            "--days {days} should be rejected"
        );
    }
    assert!(Cli::try_parse_from(["pricehist-cli", "purge", "--batch-size", "0"]).is_err());

    let cli = Cli::try_parse_from(["pricehist-cli", "purge", "--days", "36500"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Purge {
            days: Some(36_500),
            ..
        })
    ));
}

#[test]
fn history_takes_an_id() {
    let cli = Cli::try_parse_from(["pricehist-cli", "history", "42"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::History { id: 42 })));
}
