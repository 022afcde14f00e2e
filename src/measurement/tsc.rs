//! Cycle-counter access and the ramp-up busy loop.
//!
//! Provides serialized cycle-counter reads:
//! - x86_64: `lfence; rdtsc` with compiler fences
//! - aarch64: `isb; mrs cntvct_el0`
//! - Fallback: `std::time::Instant` nanoseconds for other platforms

/// Read the per-core cycle counter with appropriate serialization.
///
/// On x86_64 the `lfence` forces all prior instructions to complete before
/// the timestamp counter is read, so instruction reordering cannot skew a
/// measured interval. Monotonic non-decreasing within one core's execution;
/// no error path.
#[inline]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        read_cycles_x86_64()
    }

    #[cfg(target_arch = "aarch64")]
    {
        read_cycles_aarch64()
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        read_cycles_fallback()
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn read_cycles_x86_64() -> u64 {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    let cycles: u64;
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") cycles,
            out("rdx") _,
            options(nostack, nomem),
        );
    }

    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    cycles
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn read_cycles_aarch64() -> u64 {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    let cycles: u64;
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) cycles,
            options(nostack, nomem),
        );
    }

    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);

    cycles
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn read_cycles_fallback() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();

    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Ramp-up spin length in cycles: about 200 ms at an assumed 2 GHz.
/// Wall-clock approximate on purpose; the exact duration does not matter.
pub const RAMP_UP_CYCLES: u64 = 400_000_000;

/// Spin until the core has had time to escalate to its steady power state.
///
/// Power management takes tens to hundreds of milliseconds to settle at an
/// elevated frequency; sampling immediately would measure the transition
/// rather than the sustained rate. Every worker calls this once, after
/// binding to its core and before any timed sample. Unbounded busy-wait:
/// if the cycle counter does not advance, this spins forever.
pub fn ramp_up() {
    let start = read_cycles();
    while read_cycles().wrapping_sub(start) < RAMP_UP_CYCLES {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_monotonic() {
        let a = read_cycles();
        let b = read_cycles();
        assert!(b >= a, "cycle counter went backwards: {a} -> {b}");
    }

    #[test]
    fn consecutive_reads_advance() {
        // Two fenced reads are never free; the counter must tick between them
        // on every supported platform.
        let a = read_cycles();
        let mut b = read_cycles();
        for _ in 0..1000 {
            if b != a {
                break;
            }
            b = read_cycles();
        }
        assert!(b > a);
    }
}
