use std::path::PathBuf;
use std::process;

use amiibo_core::backup::run_stamp;
use amiibo_core::core_api::Mode;
use amiibo_core::doctor::{Doctor, RunConfig};
use amiibo_core::repair::{FixOptions, RandSource};
use amiibo_render::{render_json_report, render_text_report};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Check and fix NTAG215 amiibo dumps (.nfc and .bin) for Switch emulation.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory containing NFC and BIN files
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,
    /// Rewrite files in place (default is a dry run)
    #[arg(long)]
    fix: bool,
    /// Convert V2/V3 .nfc files to V4
    #[arg(long = "convert-v4")]
    convert_v4: bool,
    #[arg(long = "no-uid")]
    no_uid: bool,
    #[arg(long = "no-bcc")]
    no_bcc: bool,
    #[arg(long = "no-password")]
    no_password: bool,
    #[arg(long = "no-pack")]
    no_pack: bool,
    #[arg(long = "no-dlb")]
    no_dlb: bool,
    #[arg(long = "no-cfg")]
    no_cfg: bool,
    #[arg(long)]
    json: bool,
    /// Log per-file decisions to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn fix_options(&self) -> FixOptions {
        FixOptions {
            uid: !self.no_uid,
            bcc: !self.no_bcc,
            password: !self.no_password,
            pack: !self.no_pack,
            dlb: !self.no_dlb,
            cfg: !self.no_cfg,
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            root: self.directory.clone(),
            mode: if self.fix { Mode::Fix } else { Mode::DryRun },
            upgrade: self.convert_v4,
            fixes: self.fix_options(),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.directory.is_dir() {
        eprintln!("Directory {} does not exist!", cli.directory.display());
        process::exit(1);
    }

    let mut doctor = Doctor::new(cli.run_config(), &run_stamp(), RandSource::thread());
    let report = doctor.run().unwrap_or_else(|e| {
        eprintln!("Error scanning {}: {e}", cli.directory.display());
        process::exit(1);
    });

    if cli.json {
        let rendered = serde_json::to_string_pretty(&render_json_report(&report))
            .unwrap_or_else(|e| {
                eprintln!("Error rendering JSON output: {e}");
                process::exit(1);
            });
        println!("{rendered}");
        return;
    }

    print!("{}", render_text_report(&report));
}
