//! DES CLI - Main entry point

use clap::Parser;
use des_cli::{commands, Cli};
use des_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use des_server::config::ToolsConfig;
use des_server::engines::Engines;
use des_server::storage::StorageConfig;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("des-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // CLI should work without logging
    let _guard = init_logging(&log_config);

    dotenvy::dotenv().ok();

    let mut tools = ToolsConfig::from_env();
    if let Some(bin) = &cli.hadoop_bin {
        tools.hadoop_bin = bin.clone();
    }
    if let Some(bin) = &cli.sqoop_bin {
        tools.sqoop_bin = bin.clone();
    }
    let engines = Engines::from_config(&tools, &StorageConfig::from_env());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping the running tool");
            trigger.cancel();
        }
    });

    match commands::run(&cli.command, &engines, &cancel).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report.body) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                },
            }
            if !report.succeeded {
                process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    }
}
