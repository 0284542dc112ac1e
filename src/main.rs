// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use spendsync::{cli, commands, config::Config, session::Session};

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let config_path = Config::config_path()?;
    let mut config = Config::load_from(&config_path)?;
    config.apply_env();
    config.apply_overrides(&matches);

    if let Some(("config", sub)) = matches.subcommand() {
        return commands::config::handle(&config_path, &config, sub);
    }

    let Some((name, sub)) = matches.subcommand() else {
        cli::build_cli().print_help()?;
        println!();
        return Ok(());
    };

    let user = config.require_user()?;
    let gateway = config.open_gateway()?;
    let mut session = Session::new(gateway, user);

    match name {
        "tx" => commands::transactions::handle(&mut session, sub)?,
        "stats" => commands::stats::handle_stats(&mut session, sub)?,
        "chart" => commands::stats::handle_chart(&mut session, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
