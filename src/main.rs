// pmachine: UCSD p-System p-machine emulator with an execution trace viewer

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use pmachine::interpreter::constants::CORE_DUMP_FILE;
use pmachine::interpreter::engine::{Interpreter, MachineConfig};
use pmachine::interpreter::errors::RuntimeError;
use pmachine::snapshot::MockTerminal;
use pmachine::storage::console::{ConsoleDevice, HostConsole};
use pmachine::storage::{MountMode, StorageManager};
use pmachine::ui::App;

/// Snapshot budget for the viewer (256 MB)
const DEFAULT_SNAPSHOT_LIMIT: usize = 256 * 1024 * 1024;

/// A disk image to attach before booting
#[derive(Debug, Clone)]
struct MountSpec {
    unit: u16,
    path: PathBuf,
    mode: MountMode,
}

/// Parse `UNIT=PATH[:ro|rw|forget]`
fn parse_mount(text: &str) -> Result<MountSpec, String> {
    let (unit, rest) = text
        .split_once('=')
        .ok_or_else(|| format!("expected UNIT=PATH, got '{}'", text))?;
    let unit: u16 = unit
        .trim()
        .parse()
        .map_err(|_| format!("bad unit number '{}'", unit))?;

    let (path, mode) = match rest.rsplit_once(':') {
        Some((path, "ro")) => (path, MountMode::ReadOnly),
        Some((path, "rw")) => (path, MountMode::ReadWrite),
        Some((path, "forget")) => (path, MountMode::Forget),
        _ => (rest, MountMode::default()),
    };
    if path.is_empty() {
        return Err(format!("missing image path in '{}'", text));
    }

    Ok(MountSpec {
        unit,
        path: PathBuf::from(path),
        mode,
    })
}

#[derive(Parser, Debug)]
#[command(name = "pmachine")]
#[command(about = "Boot a UCSD p-System disk image on an emulated p-machine")]
struct Args {
    /// Attach a disk image: UNIT=PATH[:ro|rw|forget] (repeatable)
    #[arg(long = "mount", value_parser = parse_mount, required = true)]
    mounts: Vec<MountSpec>,

    /// Unit holding the system file
    #[arg(long = "boot-unit", default_value_t = 4)]
    boot_unit: u16,

    /// Name of the system code file on the boot unit
    #[arg(long = "system-file", default_value = "SYSTEM.PASCAL")]
    system_file: String,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,

    /// Return execution errors instead of calling the system's handler
    #[arg(long = "no-traps")]
    no_traps: bool,

    /// Record every instruction and browse the run in the trace viewer
    #[arg(long)]
    viewer: bool,

    /// Scripted console input for the viewer
    #[arg(long)]
    input: Option<PathBuf>,

    /// Snapshot memory budget in bytes
    #[arg(long = "snapshot-limit")]
    snapshot_limit: Option<usize>,
}

/// Initialize logging on stderr; `RUST_LOG` overrides the default filter
fn init_logging(trace: bool) {
    let default = if trace { "pmachine=trace" } else { "pmachine=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Dump memory when the machine cannot continue
fn dump_if_fatal(interpreter: &Interpreter, result: &Result<(), RuntimeError>) {
    if matches!(result, Err(RuntimeError::Panic { .. }) | Err(RuntimeError::Trap(_))) {
        if let Err(e) = interpreter.write_core_dump(Path::new(CORE_DUMP_FILE)) {
            error!("failed to write {}: {}", CORE_DUMP_FILE, e);
        }
    }
}

fn run_viewer(interpreter: Interpreter, outcome: Option<String>) -> io::Result<()> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(interpreter, outcome);
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn main() {
    let args = Args::parse();
    init_logging(args.trace);

    let mut storage = StorageManager::new();
    for mount in &args.mounts {
        if let Err(e) = storage.mount(mount.unit, &mount.path, mount.mode) {
            error!("cannot mount {} on unit {}: {}", mount.path.display(), mount.unit, e);
            process::exit(1);
        }
    }

    let console: Box<dyn ConsoleDevice> = if args.viewer {
        let input = match &args.input {
            Some(path) => match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("cannot read {}: {}", path.display(), e);
                    process::exit(1);
                }
            },
            None => Vec::new(),
        };
        Box::new(MockTerminal::with_input(&input))
    } else {
        Box::new(HostConsole)
    };

    let config = MachineConfig {
        trace: args.trace,
        deliver_traps: !args.no_traps,
        break_on_bpt: false,
        snapshot_limit: args
            .viewer
            .then(|| args.snapshot_limit.unwrap_or(DEFAULT_SNAPSHOT_LIMIT)),
    };

    let mut interpreter = Interpreter::new(storage, console, config);
    if let Err(e) = interpreter.boot(args.boot_unit, &args.system_file) {
        error!("boot failed: {}", e);
        process::exit(1);
    }

    let result = interpreter.run();
    dump_if_fatal(&interpreter, &result);
    if let Err(e) = &result {
        error!("machine stopped: {}", e);
    }
    info!(
        instructions = interpreter.instructions(),
        elapsed = ?interpreter.elapsed(),
        "run finished"
    );

    if args.viewer {
        let outcome = result.as_ref().err().map(|e| e.to_string());
        if let Err(e) = run_viewer(interpreter, outcome) {
            error!("viewer error: {}", e);
            process::exit(1);
        }
    } else if result.is_err() {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mount_modes() {
        let spec = parse_mount("4=system.vol:ro").unwrap();
        assert_eq!(spec.unit, 4);
        assert_eq!(spec.path, PathBuf::from("system.vol"));
        assert_eq!(spec.mode, MountMode::ReadOnly);

        let spec = parse_mount("5=work.vol").unwrap();
        assert_eq!(spec.mode, MountMode::Forget);

        assert!(parse_mount("work.vol").is_err());
        assert!(parse_mount("x=work.vol").is_err());
        assert!(parse_mount("4=:rw").is_err());
    }
}
