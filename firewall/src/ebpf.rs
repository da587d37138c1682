use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aya::{
    maps::Array,
    programs::{xdp::XdpLinkId, Xdp, XdpFlags},
    Ebpf, EbpfLoader,
};
use aya_log::EbpfLogger;
use firewall_common::{CounterValue, COUNTER_MAP, PROGRAM_NAME};
use log::{debug, info, warn};

use crate::{
    config::XdpMode,
    kernel::{Artifact, CounterMap, Kernel},
    util,
};

/// Loads the firewall object file with aya.
#[derive(Debug, Clone)]
pub struct AyaKernel {
    object: PathBuf,
    mode: XdpMode,
}

impl AyaKernel {
    pub fn new<P: AsRef<Path>>(object: P, mode: XdpMode) -> Self {
        Self {
            object: object.as_ref().to_path_buf(),
            mode,
        }
    }
}

impl Kernel for AyaKernel {
    type Artifact = Firewall;

    fn remove_memlock(&self) -> Result<()> {
        util::remove_memlock()
    }

    fn load(&self) -> Result<Firewall> {
        let mut ebpf = EbpfLoader::new().load_file(&self.object).with_context(|| {
            format!(
                "failed to load the eBPF object '{}'",
                self.object.display()
            )
        })?;

        if let Err(e) = EbpfLogger::init(&mut ebpf) {
            // The object may simply carry no log statements.
            warn!("failed to initialize eBPF logger: {}", e);
        }

        let prog: &mut Xdp = ebpf
            .program_mut(PROGRAM_NAME)
            .with_context(|| format!("program {} not found", PROGRAM_NAME))?
            .try_into()
            .context("xdp program has wrong type")?;
        prog.load()
            .with_context(|| format!("failed to load the {} program to the kernel", PROGRAM_NAME))?;
        info!("loaded eBPF object '{}'", self.object.display());

        Ok(Firewall {
            ebpf,
            flags: self.mode.into(),
        })
    }

    fn if_index(&self, iface: &str) -> Result<u32> {
        util::lookup_interface(iface)
    }
}

impl From<XdpMode> for XdpFlags {
    fn from(mode: XdpMode) -> Self {
        match mode {
            XdpMode::Default => XdpFlags::empty(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Driver => XdpFlags::DRV_MODE,
            XdpMode::Hw => XdpFlags::HW_MODE,
        }
    }
}

/// The loaded object. Dropping it closes the program and map descriptors.
pub struct Firewall {
    ebpf: Ebpf,
    flags: XdpFlags,
}

impl Firewall {
    fn program_mut(&mut self) -> Result<&mut Xdp> {
        let prog: &mut Xdp = self
            .ebpf
            .program_mut(PROGRAM_NAME)
            .with_context(|| format!("program {} not found", PROGRAM_NAME))?
            .try_into()
            .context("xdp program has wrong type")?;
        Ok(prog)
    }
}

impl CounterMap for Firewall {
    fn lookup(&self, key: u32) -> Result<u64> {
        let map = self
            .ebpf
            .map(COUNTER_MAP)
            .with_context(|| format!("map {} not found", COUNTER_MAP))?;
        let counter = Array::<_, CounterValue>::try_from(map)
            .with_context(|| format!("map {} has unexpected type", COUNTER_MAP))?;

        counter
            .get(&key, 0)
            .with_context(|| format!("failed to lookup key {} in {}", key, COUNTER_MAP))
    }
}

impl Artifact for Firewall {
    type Link = XdpLinkId;

    fn pin(&mut self, path: &Path) -> Result<()> {
        let map = self
            .ebpf
            .map_mut(COUNTER_MAP)
            .with_context(|| format!("map {} not found", COUNTER_MAP))?;
        map.pin(path)
            .with_context(|| format!("failed to pin map {} at {}", COUNTER_MAP, path.display()))
    }

    fn attach(&mut self, if_index: u32) -> Result<XdpLinkId> {
        let flags = self.flags;
        self.program_mut()?
            .attach_to_if_index(if_index, flags)
            .with_context(|| format!("failed to attach xdp on interface index {}", if_index))
    }

    fn detach(&mut self, link: XdpLinkId) -> Result<()> {
        self.program_mut()?
            .detach(link)
            .context("failed to detach xdp program")?;
        debug!("detached {}", PROGRAM_NAME);

        Ok(())
    }
}
