//! hostguard - administrative command-line tool
//!
//! One-shot control client for the prevention engine: loads the
//! configuration and rules file, performs one administrative operation or
//! event check, and prints the result.
//!
//! # Usage
//!
//! ```bash
//! # Status report (default)
//! hostguard --status
//!
//! # Evaluate one event; exit code 1 when the verdict is deny
//! hostguard --check exec /usr/bin/nc
//!
//! # Add one rule, or a whole batch from a file
//! hostguard --add 'exec|block|10|/usr/bin/nc|no netcat'
//! hostguard --batch rules.conf
//! ```

use std::env;
use std::process::ExitCode;

use hostguard::{Category, Config, GuardEngine, ProcessInfo, Rule};

fn print_version() {
    println!("hostguard {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!(
        r#"hostguard - host intrusion-prevention engine control tool

USAGE:
    hostguard [OPTIONS] [COMMAND]

COMMANDS:
    --status                Print engine status and statistics (default)
    --rules                 List rules as JSON lines
    --check CATEGORY TARGET Evaluate one event (exec, dns or network);
                            exit code 1 when the verdict is deny
    --add LINE              Add one rule in text format:
                            category|action|priority|target|description
    --batch FILE            Load a rules file (transactional)
    --drain N               Drain up to N audit entries as JSON lines

OPTIONS:
    -h, --help              Print this help message
    -v, --version           Print version information
    -c, --config PATH       Path to config file
"#
    );
}

enum Command {
    Status,
    Rules,
    Check { category: String, target: String },
    Add { line: String },
    Batch { path: String },
    Drain { max: usize },
}

struct Args {
    help: bool,
    version: bool,
    config_path: Option<String>,
    command: Command,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();
        let mut result = Args {
            help: false,
            version: false,
            config_path: None,
            command: Command::Status,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => result.help = true,
                "-v" | "--version" => result.version = true,
                "-c" | "--config" => {
                    i += 1;
                    let path = args.get(i).ok_or("--config requires a path")?;
                    result.config_path = Some(path.clone());
                }
                "--status" => result.command = Command::Status,
                "--rules" => result.command = Command::Rules,
                "--check" => {
                    let category = args.get(i + 1).ok_or("--check requires CATEGORY TARGET")?;
                    let target = args.get(i + 2).ok_or("--check requires CATEGORY TARGET")?;
                    result.command = Command::Check {
                        category: category.clone(),
                        target: target.clone(),
                    };
                    i += 2;
                }
                "--add" => {
                    i += 1;
                    let line = args.get(i).ok_or("--add requires a rule line")?;
                    result.command = Command::Add { line: line.clone() };
                }
                "--batch" => {
                    i += 1;
                    let path = args.get(i).ok_or("--batch requires a file path")?;
                    result.command = Command::Batch { path: path.clone() };
                }
                "--drain" => {
                    i += 1;
                    let n = args.get(i).ok_or("--drain requires a count")?;
                    let max = n.parse().map_err(|_| format!("bad count: {}", n))?;
                    result.command = Command::Drain { max };
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
            i += 1;
        }

        Ok(result)
    }
}

fn print_status(engine: &GuardEngine) {
    let config = engine.config();
    let stats = engine.stats();

    println!("hostguard status:");
    println!("  engine:       {}", if engine.is_enabled() { "enabled" } else { "disabled" });
    println!("  log level:    {}", config.log_level);
    println!("  max rules:    {}", config.max_rules);
    println!("  config file:  {}", config.config_file);
    println!(
        "  rules file:   {}",
        config.rules_file.as_deref().unwrap_or("(none)")
    );
    println!("  rules loaded: {}", engine.rule_count());
    println!();
    println!("statistics:");
    println!("  exec blocks:    {}", stats.exec_blocks);
    println!("  dns blocks:     {}", stats.dns_blocks);
    println!("  network blocks: {}", stats.network_blocks);
    println!("  total events:   {}", stats.total_events);
    println!("  last event ms:  {}", stats.last_event_ms);
}

fn run(args: Args) -> Result<ExitCode, String> {
    // Load configuration
    let config = if let Some(ref path) = args.config_path {
        Config::load_from(std::path::Path::new(path))
            .map_err(|e| format!("failed to load config from {}: {}", path, e))?
    } else {
        Config::load()
    };

    env_logger::Builder::new()
        .filter_level(config.log_level_filter())
        .parse_default_env()
        .init();

    let engine = GuardEngine::new(config);

    // Populate from the configured rules file, if any
    if engine.config().rules_file.is_some() {
        if let Err(e) = engine.reload() {
            eprintln!("warning: failed to load rules file: {}", e);
        }
    }

    match args.command {
        Command::Status => print_status(&engine),
        Command::Rules => {
            for rule in engine.rules() {
                match serde_json::to_string(&rule) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("warning: failed to render rule {}: {}", rule.id, e),
                }
            }
        }
        Command::Check { category, target } => {
            let category = Category::from_str(&category)
                .ok_or(format!("unknown category: {}", category))?;
            let process = ProcessInfo::new(std::process::id(), "hostguard");
            let verdict = match category {
                Category::Exec => engine.check_exec(&target, &process),
                Category::Dns => engine.check_dns(&target, &process),
                Category::Network => engine.check_network(&target, &process),
            };
            match verdict.rule_id() {
                Some(id) if verdict.is_deny() => {
                    println!("deny (rule {})", id);
                    return Ok(ExitCode::from(1));
                }
                Some(id) => println!("allow, logged (rule {})", id),
                None => println!("allow"),
            }
        }
        Command::Add { line } => {
            let rule = Rule::parse_line(&line)
                .map_err(|e| format!("bad rule line: {}", e))?
                .ok_or("rule line is empty or a comment")?;
            let id = engine.add_rule(rule).map_err(|e| e.to_string())?;
            println!("added rule {}", id);
        }
        Command::Batch { path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read {}: {}", path, e))?;
            let count = engine.load_rules(&text).map_err(|e| e.to_string())?;
            println!("loaded {} rules", count);
        }
        Command::Drain { max } => {
            for entry in engine.drain_logs(max) {
                match serde_json::to_string(&entry) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("warning: failed to render entry: {}", e),
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
