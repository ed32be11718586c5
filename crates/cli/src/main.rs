// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

mod commands;
mod watch;

use commands::AppContext;

fn build_cli() -> Command {
    Command::new("syncwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .author("SyncWatch Contributors")
        .about("Watch and drive a watchlist sync server from the terminal")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml and the hidden-set file")
                .global(true),
        )
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("URL")
                .help("Server base URL (overrides the config file)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config file if none exists"))
        .subcommand(
            Command::new("watch")
                .about("Follow the current run live")
                .arg(
                    Arg::new("logs")
                        .short('l')
                        .long("logs")
                        .help("Also print job log lines")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Start a sync run")
                .arg(
                    Arg::new("follow")
                        .short('f')
                        .long("follow")
                        .help("Keep watching after the run was requested")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("summary").about("Show the latest run summary"))
        .subcommand(Command::new("items").about("List watchlist items"))
        .subcommand(
            Command::new("delete")
                .about("Delete an item; it stays hidden until the server confirms")
                .arg(Arg::new("key").required(true).value_name("KEY").help("Item key"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Skip confirmation prompt")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("unhide")
                .about("Remove a key from the hidden set")
                .arg(Arg::new("key").required(true).value_name("KEY").help("Item key")),
        )
        .subcommand(
            Command::new("auth")
                .about("Connect an account")
                .arg(
                    Arg::new("provider")
                        .required(true)
                        .value_name("PROVIDER")
                        .value_parser(["plex", "simkl"])
                        .help("Account to connect"),
                ),
        )
        .subcommand(Command::new("logs").about("Follow the job log"))
        .subcommand(Command::new("status").about("Show connectivity and schedule"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let ctx = AppContext::load(
        matches.get_one::<String>("config-dir").map(|s| s.as_str()),
        matches.get_one::<String>("server").map(|s| s.as_str()),
    )
    .context("Failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(ctx.config().app.log_level.to_string()),
    )
    .init();

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&ctx),
        Some(("watch", sub_matches)) => watch::run(&ctx, sub_matches.get_flag("logs")).await,
        Some(("run", sub_matches)) => {
            commands::start_run(&ctx).await?;
            if sub_matches.get_flag("follow") {
                watch::run(&ctx, false).await?;
            }
            Ok(())
        }
        Some(("summary", _)) => commands::show_summary(&ctx).await,
        Some(("items", _)) => commands::list_items(&ctx).await,
        Some(("delete", sub_matches)) => commands::delete_item(&ctx, sub_matches).await,
        Some(("unhide", sub_matches)) => commands::unhide_item(&ctx, sub_matches),
        Some(("auth", sub_matches)) => commands::authorize(&ctx, sub_matches).await,
        Some(("logs", _)) => commands::follow_logs(&ctx).await,
        Some(("status", _)) => commands::show_status(&ctx).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["syncwatch", "delete", "tmdb:1", "--server", "http://h:1", "-f"])
            .expect("valid args");
        assert_eq!(
            matches.get_one::<String>("server").map(String::as_str),
            Some("http://h:1")
        );
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "delete");
        assert!(sub.get_flag("force"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(build_cli()
            .try_get_matches_from(["syncwatch", "auth", "trakt"])
            .is_err());
    }
}
