// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn transaction_fields(cmd: Command, required: bool) -> Command {
    cmd.arg(
        Arg::new("category")
            .long("category")
            .required(required)
            .help("saving | expense | investment | other"),
    )
    .arg(Arg::new("amount").long("amount").required(required))
    .arg(
        Arg::new("date")
            .long("date")
            .required(required)
            .help("YYYY-MM-DD"),
    )
    .arg(
        Arg::new("payment")
            .long("payment")
            .required(required)
            .help("cash | card"),
    )
    .arg(Arg::new("description").long("description").required(required))
    .arg(Arg::new("location").long("location"))
}

pub fn build_cli() -> Command {
    Command::new("spendsync")
        .version(crate_version!())
        .about("Track transactions and category statistics against a remote finance service")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .help("User id to scope queries to"),
        )
        .arg(
            Arg::new("gateway-url")
                .long("gateway-url")
                .global(true)
                .help("Base URL of the remote service"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Use a local SQLite file instead of the remote service"),
        )
        .subcommand(
            Command::new("tx")
                .about("Transactions")
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List transactions")
                        .arg(Arg::new("category").long("category"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(transaction_fields(
                    Command::new("add").about("Record a transaction"),
                    true,
                ))
                .subcommand(transaction_fields(
                    Command::new("edit")
                        .about("Replace fields of an existing transaction")
                        .arg(Arg::new("id").required(true)),
                    false,
                ))
                .subcommand(
                    Command::new("delete")
                        .about("Delete a transaction")
                        .arg(Arg::new("id").required(true)),
                ),
        )
        .subcommand(json_flags(
            Command::new("stats").about("Totals per category"),
        ))
        .subcommand(
            Command::new("chart")
                .about("Chart series for the category totals")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print chart.js-ready JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change the stored configuration")
                .subcommand(Command::new("show"))
                .subcommand(Command::new("set-user").arg(Arg::new("id").required(true)))
                .subcommand(
                    Command::new("set-gateway")
                        .arg(Arg::new("url").long("url").conflicts_with("path"))
                        .arg(
                            Arg::new("path")
                                .long("path")
                                .value_parser(value_parser!(PathBuf)),
                        )
                        .arg(
                            Arg::new("timeout")
                                .long("timeout")
                                .value_parser(value_parser!(u64))
                                .requires("url"),
                        ),
                ),
        )
}
