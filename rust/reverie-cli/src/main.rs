//! Reverie CLI — load programs, start executions, drive bursts and feed
//! cognitive-call results back in.  Thin pass-throughs over the host
//! layer; no business logic lives here.

mod config;

use clap::{Parser as ClapParser, Subcommand};
use config::{CliConfig, CONFIG_FILE};
use reverie_bytecode::{disassemble, Instruction};
use reverie_provider_fs::AllowlistFs;
use reverie_rt::{FileStore, Host, HostError};
use reverie_vm::{BurstOutcome, FileCapability};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

// ANSI color helpers
fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}
fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

#[derive(ClapParser)]
#[command(name = "reverie", version, about = "The Reverie suspendable VM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a reverie.toml config file in the current directory
    Init,
    /// Load a compiled program (bytecode JSON) into the store
    Load {
        /// Path to the bytecode JSON file
        file: PathBuf,
    },
    /// Start a new execution of a loaded program
    Start {
        /// Program id
        program_id: String,
    },
    /// Load, start and drive a program until it waits or finishes
    Run {
        /// Path to the bytecode JSON file
        file: PathBuf,
    },
    /// Drive one burst of an execution
    Next {
        /// Execution id (defaults to the current execution)
        execution: Option<String>,
    },
    /// Report a cognitive-call result and resume
    Reply {
        /// The result value (JSON; bare text is taken as a string)
        result: String,
        /// Execution id (defaults to the current execution)
        #[arg(long)]
        execution: Option<String>,
    },
    /// Show an execution's persisted state
    Inspect {
        /// Execution id (defaults to the current execution)
        execution: Option<String>,
    },
    /// Show an execution's output log
    Output {
        /// Execution id (defaults to the current execution)
        execution: Option<String>,
    },
    /// Show a program's instruction listing
    Disasm {
        /// Program id
        program_id: String,
    },
    /// List stored programs or executions
    List {
        #[command(subcommand)]
        what: ListCommands,
    },
    /// Delete a stored program or execution
    Delete {
        #[command(subcommand)]
        what: DeleteCommands,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    Programs,
    Executions,
}

#[derive(Subcommand)]
enum DeleteCommands {
    Program { id: String },
    Execution { id: String },
}

/// Bytecode file shape: either a bare instruction array or an object
/// carrying the source text alongside it.
#[derive(Deserialize)]
struct ProgramFile {
    #[serde(default)]
    source: String,
    bytecode: Vec<Instruction>,
}

fn read_program_file(path: &PathBuf) -> Result<ProgramFile, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    if let Ok(bytecode) = serde_json::from_str::<Vec<Instruction>>(&text) {
        return Ok(ProgramFile {
            source: String::new(),
            bytecode,
        });
    }
    serde_json::from_str(&text).map_err(|e| format!("invalid program file: {e}"))
}

struct App {
    host: Host,
    files: Option<AllowlistFs>,
}

impl App {
    fn new(config: &CliConfig) -> Result<Self, String> {
        let store = FileStore::new(&config.store_dir)
            .map_err(|e| format!("cannot open store: {e}"))?;
        let host = Host::with_config(Arc::new(store), config.vm.clone());
        let files = if config.allowed_roots.is_empty() {
            None
        } else {
            Some(
                AllowlistFs::new(&config.allowed_roots)
                    .map_err(|e| format!("bad allowed_roots: {e}"))?,
            )
        };
        Ok(App { host, files })
    }

    fn files(&self) -> Option<&dyn FileCapability> {
        self.files.as_ref().map(|f| f as &dyn FileCapability)
    }

    fn resolve_execution(&self, given: Option<String>) -> Result<String, String> {
        if let Some(id) = given {
            return Ok(id);
        }
        self.host
            .current_execution()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no current execution; pass an execution id".to_string())
    }

    fn print_outcome(&self, execution_id: &str, outcome: &BurstOutcome) {
        match outcome {
            BurstOutcome::Waiting { prompt } => {
                println!("{} {}", yellow("waiting"), gray(execution_id));
                println!("  {}", cyan(prompt));
                println!("  {}", gray("reply with: reverie reply <result>"));
            }
            BurstOutcome::Complete => {
                println!("{} {}", green("complete"), gray(execution_id));
                if let Ok(output) = self.host.store().get_output(execution_id) {
                    if !output.is_empty() {
                        print!("{output}");
                    }
                }
            }
            BurstOutcome::Error { message } => {
                println!("{} {}", red("error"), gray(execution_id));
                println!("  {message}");
            }
        }
    }
}

fn parse_result(text: &str) -> serde_json::Value {
    serde_json::from_str(text)
        .unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn run_command(cli: Cli) -> Result<(), String> {
    if let Commands::Init = cli.command {
        if std::path::Path::new(CONFIG_FILE).exists() {
            return Err(format!("{CONFIG_FILE} already exists"));
        }
        std::fs::write(CONFIG_FILE, CliConfig::default_toml())
            .map_err(|e| format!("cannot write {CONFIG_FILE}: {e}"))?;
        println!("{} {CONFIG_FILE}", green("created"));
        return Ok(());
    }

    let config = CliConfig::load()?;
    let app = App::new(&config)?;
    let host_err = |e: HostError| e.to_string();

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Load { file } => {
            let program = read_program_file(&file)?;
            let id = app
                .host
                .load_program(&program.source, program.bytecode)
                .map_err(host_err)?;
            println!("{} {id}", green("loaded"));
        }
        Commands::Start { program_id } => {
            let id = app.host.start(&program_id).map_err(host_err)?;
            println!("{} {id}", green("started"));
        }
        Commands::Run { file } => {
            let program = read_program_file(&file)?;
            let program_id = app
                .host
                .load_program(&program.source, program.bytecode)
                .map_err(host_err)?;
            let execution_id = app.host.start(&program_id).map_err(host_err)?;
            let outcome = app
                .host
                .fetch_next(&execution_id, app.files())
                .map_err(host_err)?;
            app.print_outcome(&execution_id, &outcome);
        }
        Commands::Next { execution } => {
            let execution_id = app.resolve_execution(execution)?;
            let outcome = app
                .host
                .fetch_next(&execution_id, app.files())
                .map_err(host_err)?;
            app.print_outcome(&execution_id, &outcome);
        }
        Commands::Reply { result, execution } => {
            let execution_id = app.resolve_execution(execution)?;
            let result = parse_result(&result);
            let outcome = app
                .host
                .report_result_json(&execution_id, &result, app.files())
                .map_err(host_err)?;
            app.print_outcome(&execution_id, &outcome);
        }
        Commands::Inspect { execution } => {
            let execution_id = app.resolve_execution(execution)?;
            let record = app.host.inspect(&execution_id).map_err(host_err)?;
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| format!("cannot render record: {e}"))?;
            println!("{json}");
        }
        Commands::Output { execution } => {
            let execution_id = app.resolve_execution(execution)?;
            let output = app
                .host
                .store()
                .get_output(&execution_id)
                .map_err(|e| e.to_string())?;
            print!("{output}");
        }
        Commands::Disasm { program_id } => {
            let program = app
                .host
                .store()
                .get_program(&program_id)
                .map_err(|e| e.to_string())?;
            print!("{}", disassemble(&program.bytecode));
        }
        Commands::List { what } => {
            let ids = match what {
                ListCommands::Programs => app.host.list_programs().map_err(host_err)?,
                ListCommands::Executions => app.host.list_executions().map_err(host_err)?,
            };
            for id in ids {
                println!("{id}");
            }
        }
        Commands::Delete { what } => match what {
            DeleteCommands::Program { id } => {
                app.host.delete_program(&id).map_err(host_err)?;
                println!("{} {id}", green("deleted"));
            }
            DeleteCommands::Execution { id } => {
                app.host.delete_execution(&id).map_err(host_err)?;
                println!("{} {id}", green("deleted"));
            }
        },
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run_command(cli) {
        eprintln!("{} {message}", red("error:"));
        std::process::exit(1);
    }
}
