#![no_std]

/// Name of the XDP entry point inside the compiled artifact.
pub const PROGRAM_NAME: &str = "xdp_filter_ip_range";

/// Name of the packet counter map inside the compiled artifact.
pub const COUNTER_MAP: &str = "PKT_COUNT";

/// The counter map is an array with a single slot.
pub const COUNTER_KEY: u32 = 0;
pub const COUNTER_ENTRIES: u32 = 1;

/// Value type of the counter map, keys are `u32` indices.
pub type CounterValue = u64;
