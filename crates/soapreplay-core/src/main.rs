//! soapreplay command-line interface

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use soapreplay_core::{ExistingTrace, RunConfig, RunReport, ScenarioPipeline};
use soapreplay_trace::ActionFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn side_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("client-side")
            .long("client-side")
            .action(ArgAction::SetTrue)
            .help("Keep client-side captures"),
    )
    .arg(
        Arg::new("service-side")
            .long("service-side")
            .action(ArgAction::SetTrue)
            .help("Keep service-side captures"),
    )
    .arg(
        Arg::new("parser")
            .long("parser")
            .value_name("NAME")
            .help("Trace reader (message-log, http-capture)"),
    )
}

fn cli() -> Command {
    Command::new("soapreplay")
        .version(soapreplay_core::VERSION)
        .about("Generate replay tests from captured SOAP traces")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(side_args(
            Command::new("generate")
                .about("Generate the scenario and stub units")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Run configuration (YAML or JSON)"),
                )
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Trace file"),
                )
                .arg(
                    Arg::new("assembly")
                        .long("assembly")
                        .value_name("FILE")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Type container manifest; may be repeated"),
                )
                .arg(
                    Arg::new("include")
                        .long("include")
                        .value_name("ACTION")
                        .action(ArgAction::Append)
                        .conflicts_with("exclude")
                        .help("Only generate calls with this action; may be repeated"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .value_name("ACTION")
                        .action(ArgAction::Append)
                        .help("Skip calls with this action; may be repeated"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("DIR")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output directory"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run report as JSON"),
                ),
        ))
        .subcommand(side_args(
            Command::new("list-actions")
                .about("List the actions captured in a trace")
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Trace file"),
                ),
        ))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Layer command-line flags over `config`
fn apply_flags(config: &mut RunConfig, args: &ArgMatches) {
    if let Some(trace) = args.get_one::<PathBuf>("trace") {
        config.trace = Some(trace.clone());
    }
    if let Some(parser) = args.get_one::<String>("parser") {
        config.parser = parser.clone();
    }
    let client = args.get_flag("client-side");
    let service = args.get_flag("service-side");
    if client || service {
        config.client_side = client;
        config.service_side = service;
    }
}

fn generate(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::new(),
    };
    apply_flags(&mut config, args);
    if let Some(paths) = args.get_many::<PathBuf>("assembly") {
        config.containers.extend(paths.cloned());
    }
    if let Some(actions) = args.get_many::<String>("include") {
        config.filter = ActionFilter::include(actions.cloned());
    }
    if let Some(actions) = args.get_many::<String>("exclude") {
        config.filter = ActionFilter::exclude(actions.cloned());
    }
    if let Some(dir) = args.get_one::<PathBuf>("out") {
        config.output.dir = dir.clone();
    }

    let pipeline = ScenarioPipeline::new();
    let report = match config.trace.clone() {
        Some(trace) => pipeline.run_supplied(&config, &mut ExistingTrace::new(trace))?,
        None => pipeline.run(&config)?,
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_actions(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let mut config = RunConfig::new();
    apply_flags(&mut config, args);
    let actions = ScenarioPipeline::new().list_actions(&config)?;
    for entry in &actions {
        println!("{:>6}  {}", entry.count, entry.action);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    println!("Trace: {}", report.trace.display());
    println!(
        "Messages: {} read, {} kept",
        report.messages_read, report.messages_kept
    );
    println!("Calls generated: {}", report.calls_generated());
    for skipped in &report.skipped_calls {
        println!("  skipped #{} {}: {}", skipped.index, skipped.action, skipped.reason);
    }
    for container in &report.skipped_containers {
        println!("  container {} skipped: {}", container.path.display(), container.reason);
    }
    println!("Primary unit: {}", report.primary_path.display());
    println!("Stub unit:    {}", report.stub_path.display());
}

fn report_json(report: &RunReport) -> serde_json::Value {
    serde_json::json!({
        "trace": report.trace,
        "messages_read": report.messages_read,
        "messages_kept": report.messages_kept,
        "methods": report.methods,
        "skipped_calls": report.skipped_calls.iter().map(|s| serde_json::json!({
            "index": s.index,
            "action": s.action,
            "reason": s.reason,
        })).collect::<Vec<_>>(),
        "skipped_containers": report.skipped_containers.iter().map(|c| serde_json::json!({
            "path": c.path,
            "reason": c.reason,
        })).collect::<Vec<_>>(),
        "primary": report.primary_path,
        "stubs": report.stub_path,
    })
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let result = match matches.subcommand() {
        Some(("generate", args)) => generate(args),
        Some(("list-actions", args)) => list_actions(args),
        _ => Ok(ExitCode::FAILURE),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
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
    fn flags_override_configuration() {
        let matches = cli().get_matches_from([
            "soapreplay",
            "generate",
            "--trace",
            "t.svclog",
            "--service-side",
            "--parser",
            "http-capture",
        ]);
        let Some(("generate", args)) = matches.subcommand() else {
            panic!("generate subcommand");
        };
        let mut config = RunConfig::new();
        apply_flags(&mut config, args);
        assert_eq!(config.trace, Some(PathBuf::from("t.svclog")));
        assert!(!config.client_side);
        assert!(config.service_side);
        assert_eq!(config.parser, "http-capture");
    }

    #[test]
    fn include_and_exclude_conflict() {
        let result = cli().try_get_matches_from([
            "soapreplay", "generate", "--include", "a", "--exclude", "b",
        ]);
        assert!(result.is_err());
    }
}
