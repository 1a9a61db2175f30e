//! `slotpilot` command line: HTTP service, availability check and booking

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use slotpilot_engine::{AvailabilityQuery, BookingRequest};
use slotpilot_schedule::TimeOfDay;
use slotpilot_service::dto::{resolve_professional, AvailabilityResponse, BookingOutcome};
use slotpilot_service::{build_engine, init_tracing, launcher_for, serve, ServiceConfig};
use std::path::PathBuf;
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("slotpilot")
        .version(slotpilot_engine::VERSION)
        .about("Book appointments in a remote scheduling web application")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("sandbox")
                .long("sandbox")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Sandbox salon YAML file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP service").arg(
                Arg::new("port")
                    .long("port")
                    .value_parser(value_parser!(u16))
                    .help("Listen port (overrides config and PORT)"),
            ),
        )
        .subcommand(
            Command::new("check")
                .about("Print free slots of a professional as JSON")
                .arg(
                    Arg::new("professional")
                        .long("professional")
                        .help("Professional name; defaults to the configured one"),
                )
                .arg(
                    Arg::new("date")
                        .long("date")
                        .value_parser(value_parser!(NaiveDate))
                        .help("Date (YYYY-MM-DD); defaults to today"),
                ),
        )
        .subcommand(
            Command::new("book")
                .about("Book an appointment and print the outcome as JSON")
                .arg(Arg::new("client").long("client").required(true).help("Client name"))
                .arg(
                    Arg::new("professional")
                        .long("professional")
                        .help("Professional name; defaults to the configured one"),
                )
                .arg(
                    Arg::new("date")
                        .long("date")
                        .required(true)
                        .value_parser(value_parser!(NaiveDate))
                        .help("Date (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .required(true)
                        .value_parser(|s: &str| s.parse::<TimeOfDay>().map_err(|e| e.to_string()))
                        .help("Start time (HH:MM)"),
                )
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .default_value("30")
                        .value_parser(value_parser!(u32))
                        .help("Duration in minutes"),
                )
                .arg(
                    Arg::new("service")
                        .long("service")
                        .action(ArgAction::Append)
                        .help("Service name; repeat for several"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(sandbox) = matches.get_one::<PathBuf>("sandbox") {
        config.sandbox = Some(sandbox.clone());
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("encoding output")?;
    println!("{text}");
    Ok(())
}

async fn check(config: &ServiceConfig, args: &ArgMatches) -> Result<bool> {
    let engine = build_engine(config, launcher_for(config)?)?;
    let professional = resolve_professional(
        args.get_one::<String>("professional").cloned(),
        config.default_professional.as_deref(),
    )?;
    let date = args
        .get_one::<NaiveDate>("date")
        .copied()
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match engine
        .check_availability(&AvailabilityQuery::new(professional, date))
        .await
    {
        Ok(result) => {
            print_json(&AvailabilityResponse::from(result))?;
            Ok(true)
        }
        Err(e) => {
            print_json(&slotpilot_service::dto::ErrorResponse::from(&e))?;
            Ok(false)
        }
    }
}

async fn book(config: &ServiceConfig, args: &ArgMatches) -> Result<bool> {
    let engine = build_engine(config, launcher_for(config)?)?;
    let professional = resolve_professional(
        args.get_one::<String>("professional").cloned(),
        config.default_professional.as_deref(),
    )?;
    let services: Vec<String> = args
        .get_many::<String>("service")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let request = BookingRequest::new(
        args.get_one::<String>("client").cloned().unwrap_or_default(),
        professional,
        args.get_one::<NaiveDate>("date")
            .copied()
            .context("--date is required")?,
        args.get_one::<TimeOfDay>("start")
            .copied()
            .context("--start is required")?,
        args.get_one::<u32>("duration").copied().unwrap_or(30),
    )
    .with_services(services);

    match BookingOutcome::from(engine.book(request).await) {
        BookingOutcome::Booked(body) => {
            print_json(&body)?;
            Ok(true)
        }
        BookingOutcome::Failed(body) => {
            print_json(&body)?;
            Ok(false)
        }
    }
}

async fn run(matches: ArgMatches) -> Result<bool> {
    let mut config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("serve", args)) => {
            if let Some(port) = args.get_one::<u16>("port") {
                config.server.port = *port;
            }
            serve(config).await?;
            Ok(true)
        }
        Some(("check", args)) => check(&config, args).await,
        Some(("book", args)) => book(&config, args).await,
        _ => Ok(false),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    match run(matches).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn parses_book_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "slotpilot", "book", "--client", "Carlos", "--date", "2025-03-14", "--start",
                "10:00", "--service", "Corte", "--service", "Barba",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<u32>("duration"), Some(&30));
        assert_eq!(args.get_many::<String>("service").unwrap().count(), 2);
        assert_eq!(
            args.get_one::<TimeOfDay>("start").map(ToString::to_string),
            Some("10:00".to_string())
        );
    }
}
