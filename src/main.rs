//! Guest Bridge - supervise a headless VM guest and bridge its surface
//! protocol to disk.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guest_bridge::config::{ConfigLoader, GuestConfig};
use guest_bridge::supervisor::GuestSupervisor;

#[derive(Parser)]
#[command(
    name = "guest-bridge",
    about = "Supervise a headless VM guest and bridge its surface protocol to disk",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file (default: ./.guest-bridge.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run deadline in seconds; 0 disables the deadline.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Where to capture the guest's combined output.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Readiness marker to wait for in the output.
    #[arg(long)]
    ready_marker: Option<String>,

    /// Never inject the marker-echo command.
    #[arg(long)]
    no_inject: bool,

    /// Command to send once after readiness (include a trailing newline
    /// if the guest shell needs one).
    #[arg(long)]
    post_ready_send: Option<String>,

    /// Substring to await in the output after the post-ready send.
    #[arg(long)]
    post_ready_expect: Option<String>,

    /// Mirror guest output lines to stdout.
    #[arg(long)]
    mirror: bool,

    /// Forward this process's stdin to the guest.
    #[arg(long)]
    pass_stdin: bool,

    /// Output directory for the surface bridge (omit to disable the
    /// surface/window pipeline).
    #[arg(long)]
    bridge_dir: Option<PathBuf>,

    /// Guest executable and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    guest: Vec<String>,
}

impl Cli {
    /// Apply CLI values over the loaded config.
    fn apply(self, mut config: GuestConfig) -> GuestConfig {
        if !self.guest.is_empty() {
            let mut guest = self.guest;
            config.program = guest.remove(0);
            config.args = guest;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(ready_marker) = self.ready_marker {
            config.ready_marker = ready_marker;
        }
        if self.no_inject {
            config.inject_marker = Some(false);
        }
        if let Some(send) = self.post_ready_send {
            config.post_ready_send = Some(send);
        }
        if let Some(expect) = self.post_ready_expect {
            config.post_ready_expect = Some(expect);
        }
        if self.mirror {
            config.mirror_output = true;
        }
        if self.pass_stdin {
            config.pass_stdin = true;
        }
        if let Some(bridge_dir) = self.bridge_dir {
            config.bridge_dir = Some(bridge_dir);
        }
        config
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}


#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = match cli.config.clone() {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => cli.apply(config),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if config.program.is_empty() {
        eprintln!("error: no guest executable given (pass it as trailing arguments or in the config file)");
        return ExitCode::FAILURE;
    }

    let log_file = config.log_file.clone();
    let supervisor = GuestSupervisor::new(config);
    match supervisor.run().await {
        Ok(outcome) => {
            tracing::info!(?outcome, "run finished");
            let code = outcome.exit_code();
            u8::try_from(code.rem_euclid(256)).map_or(ExitCode::FAILURE, ExitCode::from)
        }
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("log: {}", log_file.display());
            ExitCode::FAILURE
        }
    }
}
