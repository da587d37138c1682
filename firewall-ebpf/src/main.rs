#![no_std]
#![no_main]

use aya_ebpf::{bindings::xdp_action, macros::xdp, programs::XdpContext};
use aya_log_ebpf::error;

mod map;
mod util;

#[xdp]
pub fn xdp_filter_ip_range(ctx: XdpContext) -> u32 {
    match util::count_packet() {
        Ok(_) => xdp_action::XDP_PASS,
        Err(e) => {
            error!(&ctx, "count packet by err: {}", e);
            xdp_action::XDP_PASS
        }
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
