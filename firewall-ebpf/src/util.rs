use core::sync::atomic::{AtomicU64, Ordering};

use firewall_common::COUNTER_KEY;

use crate::map::PKT_COUNT;

/// Bumps the single packet counter slot. Fails only if the slot is missing.
#[inline]
pub fn count_packet() -> Result<(), i64> {
    let slot = PKT_COUNT.get_ptr_mut(COUNTER_KEY).ok_or(-1i64)?;

    // The array is shared between CPUs.
    let counter = unsafe { AtomicU64::from_ptr(slot) };
    counter.fetch_add(1, Ordering::Relaxed);

    Ok(())
}
