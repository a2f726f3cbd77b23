#[macro_use]
extern crate log;

mod config;

use config::{Config, ConfigError};

use clap::Parser;
use kestrel_core::{
    Bios, BiosError, Breakpoint, Cycle, Exe, ExeError, Fault, StopReason, System, CPU_HZ,
    SHELL_ENTRY,
};
use thiserror::Error;

use std::path::PathBuf;
use std::process::ExitCode;

/// Cycles run between draining the GPU and SPU output queues.
const SLICE: Cycle = CPU_HZ / 60;

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bios(#[from] BiosError),

    #[error(transparent)]
    Exe(#[from] ExeError),

    #[error("no BIOS given, either with --bios or in the config file")]
    NoBios,

    #[error("the BIOS didn't reach the shell in time")]
    ShellNotReached,

    #[error("stopped: {0}")]
    Fault(Fault),
}

/// Run a Playstation BIOS, and optionally an executable, without any video or audio output.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// BIOS image
    #[arg(short, long)]
    bios: Option<PathBuf>,

    /// PS-X EXE to side-load when the BIOS starts the shell
    #[arg(short, long)]
    exe: Option<PathBuf>,

    /// Emulated seconds to run for
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Config file to use instead of the one in the config directory
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Opts {
    /// Let the command line override the config file.
    fn apply(self, config: &mut Config) {
        if let Some(bios) = self.bios {
            config.bios = bios;
        }
        if self.exe.is_some() {
            config.exe = self.exe;
        }
        if let Some(seconds) = self.seconds {
            config.run_seconds = seconds;
        }
    }
}

/// Counts of what was produced for the host.
#[derive(Default)]
struct Output {
    gp0_words: usize,
    samples: usize,
}

impl Output {
    fn drain(&mut self, system: &mut System) {
        let io = &mut system.cpu.bus_mut().io;
        self.gp0_words += io.gpu.drain_gp0().count();
        self.samples += io.spu.drain_samples().count();
    }
}

/// Run until the BIOS jumps to the shell.
fn run_to_shell(system: &mut System, cycles: Cycle) -> Result<(), RunError> {
    let mut bp = Breakpoint::new(SHELL_ENTRY);
    match system.run_debug(cycles, &mut bp) {
        StopReason::Break => Ok(()),
        StopReason::Time => Err(RunError::ShellNotReached),
        StopReason::Fault(fault) => Err(RunError::Fault(fault)),
    }
}

fn run(config: &Config) -> Result<(), RunError> {
    if config.bios.as_os_str().is_empty() {
        return Err(RunError::NoBios);
    }

    let bios = Bios::from_file(&config.bios)?;
    info!("loaded BIOS '{}'", bios.name());

    let mut system = System::new(bios);
    let mut output = Output::default();

    let total = (config.run_seconds * CPU_HZ as f64) as Cycle;

    if let Some(path) = &config.exe {
        let exe = Exe::load(path)?;
        run_to_shell(&mut system, total)?;
        system.sideload(&exe);
    }

    let start = system.cpu.bus().schedule.now();

    while system.cpu.bus().schedule.now() - start < total {
        match system.run(SLICE) {
            StopReason::Time => (),
            StopReason::Break => debug!("break at {:08x}", system.cpu.pc()),
            StopReason::Fault(fault) => {
                if config.stop_on_fault {
                    return Err(RunError::Fault(fault));
                }
                warn!("{fault}, continuing");
            }
        }
        output.drain(&mut system);
    }

    info!(
        "ran {} cycles: {} frames, {} GP0 words, {} audio frames",
        system.cpu.bus().schedule.now(),
        system.frame_count(),
        output.gp0_words,
        output.samples,
    );

    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    let config = Config::load(opts.config.as_deref());
    let level = config
        .as_ref()
        .map_or("info", |config| config.log_level.as_str())
        .to_string();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let res = config.map_err(RunError::from).and_then(|mut config| {
        opts.apply(&mut config);
        run(&config)
    });

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
