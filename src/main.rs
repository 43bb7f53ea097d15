//! Entry point for **monswitch**.
//!
//! ```text
//! monswitch [--simulate[=N]] <main|above|all|list|serve>
//! ```
//!
//! `main`, `above` and `all` apply one layout and print the result as JSON.
//! `list` prints the captured baseline.  `serve` reads layout requests from
//! stdin, one per line, and answers each with a JSON line on stdout.
//!
//! `--simulate` swaps the Win32 backend for an in-memory one with `N`
//! displays (default 3); it is the only backend on non-Windows hosts.

use log::{error, info};
use monswitch::applicator::ApplyPolicy;
use monswitch::config::Config;
use monswitch::ipc::listener::LineListener;
use monswitch::layout::{Layout, LayoutCommand, LayoutResult};
use monswitch::sim::SimulatedBackend;
use monswitch::switcher::{dispatch, dispatch_to, LayoutSwitcher};
use monswitch::traits::{CommandSource, DisplayBackend};
use std::io::{self, BufReader};
use std::sync::{mpsc, Arc};

const USAGE: &str = "usage: monswitch [--simulate[=N]] <main|above|all|list|serve>";

/// Upper bound for `--simulate=N`.
const MAX_SIMULATED: usize = 16;

/// Resolve the config directory (`%APPDATA%\monswitch` or
/// `$XDG_CONFIG_HOME/monswitch`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("APPDATA")
        .or_else(|_| std::env::var("XDG_CONFIG_HOME"))
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            format!("{}/.config", home)
        });
    std::path::PathBuf::from(base).join("monswitch")
}

/// Try to load the config from `<config dir>/config.json`, falling back to
/// compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Arguments

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply(Layout),
    List,
    Serve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    action: Action,
    /// Number of simulated displays, if simulating.
    simulate: Option<usize>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut action = None;
    let mut simulate = None;
    for arg in args {
        let next = if arg == "--simulate" {
            simulate = Some(3);
            continue;
        } else if let Some(n) = arg.strip_prefix("--simulate=") {
            let n: usize = n
                .parse()
                .map_err(|_| format!("--simulate: expected a display count, got {:?}", n))?;
            if n > MAX_SIMULATED {
                return Err(format!("--simulate: at most {} displays", MAX_SIMULATED));
            }
            simulate = Some(n);
            continue;
        } else if arg == "list" {
            Action::List
        } else if arg == "serve" {
            Action::Serve
        } else if let Some(layout) = Layout::parse(arg) {
            Action::Apply(layout)
        } else {
            return Err(format!("unknown argument: {:?}", arg));
        };
        if action.replace(next).is_some() {
            return Err("only one action may be given".into());
        }
    }
    let action = action.ok_or_else(|| "missing action".to_string())?;
    Ok(Args { action, simulate })
}

//  Main

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    let policy = load_config().apply.policy();
    let code = match args.simulate {
        Some(n) => {
            info!("using simulated backend with {} display(s)", n);
            run(SimulatedBackend::desk(n), policy, args.action)
        }
        None => run_native(policy, args.action),
    };
    std::process::exit(code);
}

#[cfg(target_os = "windows")]
fn run_native(policy: ApplyPolicy, action: Action) -> i32 {
    run(monswitch::win32::gdi::GdiBackend::new(), policy, action)
}

#[cfg(not(target_os = "windows"))]
fn run_native(_policy: ApplyPolicy, _action: Action) -> i32 {
    error!("the display backend is only available on Windows; use --simulate");
    1
}

/// Capture the baseline and perform `action`.  Returns the exit code.
fn run<B>(backend: B, policy: ApplyPolicy, action: Action) -> i32
where
    B: DisplayBackend + Send + Sync + 'static,
{
    let switcher = Arc::new(LayoutSwitcher::new(backend, policy));
    match action {
        Action::List => print_json(switcher.baseline().displays()),
        Action::Apply(layout) => match dispatch(switcher, layout).recv() {
            Ok(result) => match print_json(&result) {
                0 => exit_code(&result),
                code => code,
            },
            Err(_) => {
                error!("{}: worker exited without a result", layout);
                1
            }
        },
        Action::Serve => {
            let stdin = LineListener::new(BufReader::new(io::stdin()), io::stdout());
            serve(switcher, stdin)
        }
    }
}

/// Exit code for an applied layout: 0 on success, 2 if the displays did
/// not end up as requested.
fn exit_code(result: &LayoutResult) -> i32 {
    if result.success {
        0
    } else {
        2
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            error!("failed to encode output: {}", e);
            1
        }
    }
}

/// Answer layout requests from `source` until it is exhausted.
///
/// Returns 1 if the source stopped on an error.
fn serve<B, S>(switcher: Arc<LayoutSwitcher<B>>, mut source: S) -> i32
where
    B: DisplayBackend + Send + Sync + 'static,
    S: CommandSource + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel::<LayoutCommand>();
    let listener = std::thread::spawn(move || source.run(cmd_tx));

    info!("monswitch running");
    for cmd in cmd_rx {
        info!("request: {}", cmd.layout);
        dispatch_to(Arc::clone(&switcher), cmd.layout, cmd.reply);
    }
    match listener.join() {
        Ok(Ok(())) => {
            info!("input closed, exiting");
            0
        }
        Ok(Err(e)) => {
            error!("listener error: {}", e);
            1
        }
        Err(_) => {
            error!("listener thread panicked");
            1
        }
    }
}
