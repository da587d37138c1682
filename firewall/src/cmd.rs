use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::{
    app::Application,
    config::{Settings, XdpMode},
    ebpf::AyaKernel,
    shutdown::Shutdown,
};

#[derive(Parser)]
#[command(name = "firewall", disable_help_subcommand = true)]
pub struct Cmd {
    /// Set the log verbose.
    #[arg(
        short = 'v',
        default_value = "info",
        value_name = "verbose",
        global = true,
        value_parser = ["debug","info","warn","error"]
    )]
    pub verbose: String,

    /// Network interface to attach the XDP program to. (e.g. -i eth0)
    #[arg(short = 'i', value_name = "iface", global = true)]
    pub iface: Option<String>,

    /// Path the packet counter map is pinned at.
    #[arg(short = 'p', value_name = "path", global = true)]
    pub pin_path: Option<PathBuf>,

    /// Compiled eBPF object to load.
    #[arg(short = 'o', value_name = "object", global = true)]
    pub object: Option<PathBuf>,

    /// How often the counter is read. (e.g. 1s, 500ms)
    #[arg(short = 't', value_name = "interval", global = true)]
    pub interval: Option<String>,

    /// XDP attach mode
    #[arg(short = 'm', value_name = "MODE", value_enum, global = true)]
    pub xdp_mode: Option<XdpMode>,

    #[command(subcommand)]
    pub sub_cmd: SubCmd,
}

#[derive(Subcommand, Clone)]
pub enum SubCmd {
    /// Attach the firewall and report the packet counter until interrupted
    Run(Run),

    /// Check whether the firewall ebpf program can be loaded, pinned and attached
    Check(Run),
}

impl SubCmd {
    pub fn config(&self) -> Option<&PathBuf> {
        match self {
            SubCmd::Run(run) | SubCmd::Check(run) => run.config.as_ref(),
        }
    }
}

#[derive(Parser, Clone)]
pub struct Run {
    /// Optional configuration file, flags take precedence over it
    pub config: Option<PathBuf>,
}

impl Cmd {
    /// Resolve the effective settings: defaults, then the config file, then flags.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match self.sub_cmd.config() {
            Some(path) => Settings::load_config_path(path)?,
            None => Settings::default(),
        };

        if let Some(iface) = &self.iface {
            settings.iface = iface.to_owned();
        }
        if let Some(pin_path) = &self.pin_path {
            settings.pin_path = pin_path.to_owned();
        }
        if let Some(object) = &self.object {
            settings.object = object.to_owned();
        }
        if let Some(interval) = &self.interval {
            settings.poll_interval = interval.to_owned();
        }
        if let Some(mode) = self.xdp_mode {
            settings.xdp_mode = mode;
        }
        settings.check()?;

        Ok(settings)
    }

    /// Carry out the selected subcommand against the running kernel.
    pub async fn execute(self) -> Result<()> {
        let settings = self.settings()?;
        let kernel = AyaKernel::new(&settings.object, settings.xdp_mode);
        let app = Application::new(kernel, settings);

        match self.sub_cmd {
            SubCmd::Run(_) => {
                let shutdown = Shutdown::listen()?;
                app.run(shutdown.recv()).await?;
            }
            SubCmd::Check(_) => {
                app.check()?;
            }
        }

        Ok(())
    }
}
