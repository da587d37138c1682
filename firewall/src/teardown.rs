//! Ordered release of everything the coordinator acquired.
//!
//! Steps are recorded as resources are acquired and walked in reverse, so the
//! link goes before the artifact and the artifact before its pin. A failing step
//! is logged and counted, the walk always continues. Dropping a [`Teardown`]
//! that was not released explicitly runs the same walk, which covers every
//! early return during startup.

use std::{fmt, io, path::PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::{
    kernel::{Artifact, CounterMap},
    pin,
};

enum Step<L> {
    /// The pin and the directories created for it, deepest first.
    Unpin(PathBuf, Vec<PathBuf>),
    Close,
    Detach(L),
}

impl<L> fmt::Display for Step<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Unpin(path, _) => write!(f, "unpin {}", path.display()),
            Step::Close => write!(f, "close eBPF objects"),
            Step::Detach(_) => write!(f, "detach xdp link"),
        }
    }
}

/// Outcome of a teardown walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Steps that completed.
    pub released: usize,
    /// Steps that failed and were skipped over.
    pub warnings: usize,
}

pub struct Teardown<A: Artifact> {
    artifact: Option<A>,
    steps: Vec<Step<A::Link>>,
}

impl<A: Artifact> Teardown<A> {
    /// Take ownership of a freshly loaded artifact.
    pub fn new(artifact: A) -> Self {
        Self {
            artifact: Some(artifact),
            steps: Vec::with_capacity(3),
        }
    }

    /// Pin the counter map and register its removal.
    ///
    /// The artifact's own release is registered right after the pin, so the
    /// pin outlives the map descriptors during teardown. Directories created
    /// for the pin are removed with it, or right away if pinning fails.
    pub fn pin(&mut self, path: PathBuf) -> Result<()> {
        let created = pin::prepare(&path)?;
        if let Err(e) = self.artifact_mut().and_then(|a| a.pin(&path)) {
            pin::remove_dirs(&created);
            return Err(e);
        }
        self.steps.push(Step::Unpin(path, created));
        self.steps.push(Step::Close);

        Ok(())
    }

    /// Attach the program and register the detach.
    pub fn attach(&mut self, if_index: u32) -> Result<()> {
        let link = self.artifact_mut()?.attach(if_index)?;
        self.steps.push(Step::Detach(link));

        Ok(())
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Detach(_)))
    }

    /// Walk the recorded steps newest first. Calling it again is a no-op.
    pub fn release(&mut self) -> Report {
        let mut report = Report::default();

        while let Some(step) = self.steps.pop() {
            debug!("teardown: {}", step);
            let result = match step {
                Step::Detach(link) => match self.artifact.as_mut() {
                    Some(artifact) => artifact.detach(link),
                    None => Err(anyhow!("eBPF objects already closed")),
                },
                Step::Close => {
                    drop(self.artifact.take());
                    Ok(())
                }
                Step::Unpin(ref path, ref dirs) => match pin::unpin(path) {
                    Ok(()) => {
                        pin::remove_dirs(dirs);
                        Ok(())
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        pin::remove_dirs(dirs);
                        Err(anyhow!("pinned map {} is already gone", path.display()))
                    }
                    Err(e) => Err(anyhow!("failed to unpin map {}: {}", path.display(), e)),
                },
            };

            match result {
                Ok(()) => report.released += 1,
                Err(e) => {
                    warn!("{:#}", e);
                    report.warnings += 1;
                }
            }
        }

        // loaded but never pinned
        if let Some(artifact) = self.artifact.take() {
            drop(artifact);
            report.released += 1;
        }

        report
    }

    fn artifact_mut(&mut self) -> Result<&mut A> {
        self.artifact
            .as_mut()
            .ok_or_else(|| anyhow!("eBPF objects already closed"))
    }
}

impl<A: Artifact> CounterMap for Teardown<A> {
    fn lookup(&self, key: u32) -> Result<u64> {
        match &self.artifact {
            Some(artifact) => artifact.lookup(key),
            None => Err(anyhow!("eBPF objects already closed")),
        }
    }
}

impl<A: Artifact> Drop for Teardown<A> {
    fn drop(&mut self) {
        if self.steps.is_empty() && self.artifact.is_none() {
            return;
        }

        let report = self.release();
        info!(
            "released {} resources, {} warnings",
            report.released, report.warnings
        );
    }
}
