use std::{fs::File, io, path::Path, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

/// Longest accepted gap between two counter reads.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runtime settings of the firewall coordinator.
///
/// Built from defaults, optionally overlaid with a YAML file, then with
/// command line flags (see [`crate::cmd::Cmd::settings`]).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_iface")]
    pub iface: String,

    #[serde(rename(deserialize = "pinPath"), default = "default_pin_path")]
    pub pin_path: PathBuf,

    #[serde(default = "default_object")]
    pub object: PathBuf,

    #[serde(
        rename(deserialize = "pollInterval"),
        default = "default_poll_interval"
    )]
    pub poll_interval: String,

    #[serde(rename(deserialize = "xdpMode"), default)]
    pub xdp_mode: XdpMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iface: default_iface(),
            pin_path: default_pin_path(),
            object: default_object(),
            poll_interval: default_poll_interval(),
            xdp_mode: XdpMode::default(),
        }
    }
}

impl Settings {
    pub fn load_config_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .open(path)
            .with_context(|| format!("failed to open config '{}'", path.display()))?;

        Self::load_config(file)
    }

    pub fn load_config<R>(reader: R) -> Result<Self>
    where
        R: io::Read,
    {
        let settings: Self = serde_yaml::from_reader(reader)?;
        settings.check()?;

        Ok(settings)
    }

    pub fn check(&self) -> Result<()> {
        // the kernel limit includes the trailing NUL
        if self.iface.is_empty() || self.iface.len() >= libc::IFNAMSIZ {
            return Err(anyhow!(
                "interface name '{}' must be 1 to {} bytes long",
                self.iface,
                libc::IFNAMSIZ - 1
            ));
        }

        if !self.pin_path.is_absolute() {
            return Err(anyhow!(
                "pin path '{}' must be absolute",
                self.pin_path.display()
            ));
        }

        self.interval()?;

        Ok(())
    }

    pub fn interval(&self) -> Result<Duration> {
        let interval = humantime::parse_duration(&self.poll_interval)
            .with_context(|| format!("failed to parse poll interval '{}'", self.poll_interval))?;
        if interval.is_zero() || interval > MAX_POLL_INTERVAL {
            return Err(anyhow!(
                "poll interval '{}' must be greater than zero and at most {}",
                self.poll_interval,
                humantime::format_duration(MAX_POLL_INTERVAL)
            ));
        }

        Ok(interval)
    }
}

/// How the XDP program is hooked into the interface.
#[derive(ValueEnum, Deserialize, Default, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick the best supported mode
    #[default]
    Default,

    /// Generic mode, works on every driver
    Skb,

    /// Native driver mode
    Driver,

    /// Offloaded to the NIC
    Hw,
}

fn default_iface() -> String {
    String::from("eth0")
}

fn default_pin_path() -> PathBuf {
    PathBuf::from("/sys/fs/bpf/my_map")
}

fn default_object() -> PathBuf {
    PathBuf::from("target/bpfel-unknown-none/release/firewall")
}

// The counter is sampled once per second unless configured otherwise.
fn default_poll_interval() -> String {
    String::from("1s")
}
