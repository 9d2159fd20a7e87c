use clap::Parser;
use colored::Colorize;
use std::collections::HashMap;
use std::process::ExitCode;

mod commands;

use smtp2go_usage::cli::{Cli, Commands, ConfigCommands};
use smtp2go_usage::error::AppError;
use smtp2go_usage::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Cli::parse();

    init_tracing(args.log_format);

    // Environment is captured once and passed down explicitly
    let env: HashMap<String, String> = std::env::vars().collect();

    // Dispatch to appropriate command handler
    let result = match args.get_command() {
        Commands::Run => return commands::run::execute(&args.settings, &env).await,
        Commands::Config { action } => match action {
            ConfigCommands::Show => commands::config::show(&args.settings, &env),
            ConfigCommands::Validate => commands::config::validate(&args.settings, &env),
        },
        Commands::Version => {
            println!("SMTP2GO Usage Reporter v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            let code = err.downcast_ref::<AppError>().map_or(1, AppError::exit_code);
            ExitCode::from(code)
        }
    }
}
