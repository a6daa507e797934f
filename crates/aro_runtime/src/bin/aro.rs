//! ARO CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use aro_runtime::{Application, CONFIG_FILE, RuntimeConfig, check_sources, logging, run_tests, source};

/// What the invocation asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Run,
    Check,
    Test,
}

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    command: Command,
    dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    show_help: bool,
    show_version: bool,
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();
    let mut command_seen = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-v" | "--verbose" => config.verbose = true,
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path".into());
                }
                config.config_file = Some(PathBuf::from(&args[i]));
            }
            "run" | "check" | "test" if !command_seen => {
                command_seen = true;
                config.command = match args[i].as_str() {
                    "check" => Command::Check,
                    "test" => Command::Test,
                    _ => Command::Run,
                };
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            path => {
                if config.dir.is_some() {
                    return Err(format!("unexpected argument: {path}").into());
                }
                config.dir = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Reads the `--config` file, else `aro.toml` in the source directory when
/// present, else defaults. A directory given alongside `--config` overrides
/// the file's `source_dir`.
fn runtime_config(cli: &CliConfig) -> Result<RuntimeConfig, Box<dyn std::error::Error>> {
    let dir = cli.dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let implicit = dir.join(CONFIG_FILE);
    let file = cli
        .config_file
        .clone()
        .or_else(|| implicit.is_file().then_some(implicit));
    let mut config = match file {
        Some(path) => RuntimeConfig::from_file(&path)?,
        None => RuntimeConfig::default().with_source_dir(&dir),
    };
    if let (Some(_), Some(dir)) = (&cli.config_file, &cli.dir) {
        config.source_dir.clone_from(dir);
    }
    if cli.verbose {
        config.log_filter = "debug".to_string();
    }
    Ok(config)
}

async fn run(args: Vec<String>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = parse_args(args)?;

    if cli.show_help {
        print_help();
        return Ok(ExitCode::SUCCESS);
    }

    if cli.show_version {
        println!("aro {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let config = runtime_config(&cli)?;
    logging::init(&config.log_filter);

    match cli.command {
        Command::Check => check(&config),
        Command::Test => {
            let app = Application::load(config.with_handle_signals(false))?;
            let report = run_tests(app.engine()).await;
            println!("{report}");
            Ok(exit_code(report.is_success()))
        }
        Command::Run => {
            let app = Application::load(config)?;
            let outcome = app.run().await?;
            if let Some(response) = &outcome.response {
                println!("{response}");
            }
            if let Some(failure) = &outcome.failure {
                eprintln!("\x1b[31mError: {failure}\x1b[0m");
            }
            Ok(exit_code(outcome.is_success()))
        }
    }
}

fn check(config: &RuntimeConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let files = source::load(&config.source_dir)?;
    let report = check_sources(&files, &aro_stdlib::builtins(), &config.analyzer_config());
    println!("{report}");
    Ok(exit_code(!report.has_errors()))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_help() {
    println!(
        "\x1b[1mARO\x1b[0m - Action-Result-Object business language

\x1b[1mUSAGE:\x1b[0m
    aro [OPTIONS] [COMMAND] [DIR]

\x1b[1mCOMMANDS:\x1b[0m
    run      Check and run the application in DIR (default)
    check    Report syntax and semantic problems without running
    test     Run every '* Test' feature set

\x1b[1mARGUMENTS:\x1b[0m
    [DIR]    Directory containing .aro files (default: .)

\x1b[1mOPTIONS:\x1b[0m
    -c, --config PATH  Read settings from PATH instead of DIR/aro.toml
    -v, --verbose      Log at debug level unless RUST_LOG is set
    -h, --help         Print help information
    -V, --version      Print version information

\x1b[1mEXAMPLES:\x1b[0m
    aro                  Run the application in the current directory
    aro run app/         Run the application in app/
    aro check app/       Check app/ and list every problem
    aro test app/        Run the tests in app/

Press Ctrl+C to stop an application waiting for events."
    );
}
