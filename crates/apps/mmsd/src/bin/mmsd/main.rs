mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "mmsd", about = "Send and download MMS over the carrier MMS network", version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// POST an encoded send-req to the MMSC.
    Send {
        #[arg(long)]
        pdu: PathBuf,
        #[arg(long)]
        location_url: Option<String>,
        #[arg(long)]
        sub_id: Option<i64>,
        #[arg(long, default_value = commands::DEFAULT_CREATOR)]
        creator: String,
    },
    /// GET a message from its content location and write the retrieve-conf.
    Download {
        #[arg(long)]
        url: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        sub_id: Option<i64>,
        #[arg(long, default_value = commands::DEFAULT_CREATOR)]
        creator: String,
    },
}

fn init_logging(level: Option<&str>) {
    let mut builder = match level {
        Some(filters) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(filters);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
    };
    builder.init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match commands::run(cli) {
        Ok(report) => match serde_json::to_string(&report) {
            Ok(json) => {
                println!("{json}");
                if report.result.is_ok() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(err) => {
                eprintln!("mmsd: failed to encode report: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("mmsd: {err:#}");
            ExitCode::FAILURE
        }
    }
}
