//! Tests for CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;
use logship_daemon::cli::{Command, DaemonCli, version_string};

#[test]
fn defaults_without_arguments() {
    let cli = DaemonCli::try_parse_from(["logship"]).unwrap();
    assert_eq!(cli.config, PathBuf::from("logship.yml"));
    assert!(cli.log_level.is_none());
    assert!(cli.log_format.is_none());
    assert!(!cli.validate);
    assert!(cli.command.is_none());
}

#[test]
fn overrides_are_parsed() {
    let cli = DaemonCli::try_parse_from([
        "logship",
        "--config",
        "/etc/logship/pipeline.toml",
        "--log-level",
        "debug",
        "--log-format",
        "pretty",
        "--validate",
    ])
    .unwrap();
    assert_eq!(cli.config, PathBuf::from("/etc/logship/pipeline.toml"));
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert_eq!(cli.log_format.as_deref(), Some("pretty"));
    assert!(cli.validate);
}

#[test]
fn short_config_flag() {
    let cli = DaemonCli::try_parse_from(["logship", "-c", "p.json"]).unwrap();
    assert_eq!(cli.config, PathBuf::from("p.json"));
}

#[test]
fn version_subcommand() {
    let cli = DaemonCli::try_parse_from(["logship", "version"]).unwrap();
    assert_eq!(cli.command, Some(Command::Version));
    assert!(version_string().contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_flag_is_rejected() {
    assert!(DaemonCli::try_parse_from(["logship", "--bogus"]).is_err());
}
