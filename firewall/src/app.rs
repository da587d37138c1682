use std::future::Future;

use anyhow::Result;
use log::{debug, info};

use crate::{
    collector,
    config::Settings,
    kernel::Kernel,
    teardown::{Report, Teardown},
    util,
};

pub struct Application<K> {
    pub kernel: K,
    pub settings: Settings,
}

impl<K> Application<K>
where
    K: Kernel,
{
    pub fn new(kernel: K, settings: Settings) -> Self {
        Self { kernel, settings }
    }

    /// Acquire every resource in order: memlock, interface index, artifact,
    /// pinned map, XDP link.
    ///
    /// The interface is resolved before anything is loaded so an unknown name
    /// fails without side effects. If a later step fails, whatever was already
    /// acquired is released when the returned error unwinds the [`Teardown`].
    pub fn start(&self) -> Result<Teardown<K::Artifact>> {
        match util::uname() {
            Ok(sys) => info!("start firewall, kernel: {:?}", sys.release),
            Err(e) => debug!("failed to read kernel release: {}", e),
        }

        self.kernel.remove_memlock()?;

        let iface = &self.settings.iface;
        let if_index = self.kernel.if_index(iface)?;
        debug!("interface {} has index {}", iface, if_index);

        let mut teardown = Teardown::new(self.kernel.load()?);

        teardown.pin(self.settings.pin_path.clone())?;
        info!("pinned packet counter at {}", self.settings.pin_path.display());

        teardown.attach(if_index)?;
        info!(
            "attached the XDP program to the {} network interface ({:?} mode)",
            iface, self.settings.xdp_mode
        );

        Ok(teardown)
    }

    /// Report the packet counter until `cancel` resolves, then tear down.
    ///
    /// A failed counter read still releases every resource before the error
    /// is returned.
    pub async fn run<C>(&self, cancel: C) -> Result<Report>
    where
        C: Future<Output = ()>,
    {
        let interval = self.settings.interval()?;
        let mut teardown = self.start()?;

        info!("Counting incoming packets on {}..", self.settings.iface);
        let polled = collector::run(&teardown, interval, cancel, |count| {
            info!("Received {} packets", count)
        })
        .await;

        let report = teardown.release();
        info!(
            "released {} resources, {} warnings",
            report.released, report.warnings
        );

        let summary = polled?;
        debug!(
            "polled {} times, last count {:?}",
            summary.ticks, summary.last
        );

        Ok(report)
    }

    /// Acquire everything once and release it straight away.
    pub fn check(&self) -> Result<Report> {
        let mut teardown = self.start()?;
        let report = teardown.release();
        info!(
            "check passed on {}, released {} resources, {} warnings",
            self.settings.iface, report.released, report.warnings
        );

        Ok(report)
    }
}
