use aya_ebpf::{macros::map, maps::Array};
use firewall_common::{CounterValue, COUNTER_ENTRIES};

#[map(name = "PKT_COUNT")]
pub(crate) static PKT_COUNT: Array<CounterValue> = Array::with_max_entries(COUNTER_ENTRIES, 0);
