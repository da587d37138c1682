use std::path::Path;

use anyhow::Result;

/// Process-level operations performed before the artifact is usable.
pub trait Kernel {
    type Artifact: Artifact;

    /// Make sure the process may lock the memory the artifact needs.
    fn remove_memlock(&self) -> Result<()>;

    /// Load the compiled artifact, verifying its program. Called once.
    fn load(&self) -> Result<Self::Artifact>;

    /// Resolve an interface name to the index the program is attached to.
    fn if_index(&self, iface: &str) -> Result<u32>;
}

/// Read access to the packet counter map.
pub trait CounterMap {
    fn lookup(&self, key: u32) -> Result<u64>;
}

/// A loaded program and its counter map. Dropping the artifact releases both.
pub trait Artifact: CounterMap {
    /// Active binding of the program to an interface.
    type Link;

    /// Expose the counter map at `path`. Fails if `path` is already taken.
    fn pin(&mut self, path: &Path) -> Result<()>;

    fn attach(&mut self, if_index: u32) -> Result<Self::Link>;

    fn detach(&mut self, link: Self::Link) -> Result<()>;
}
