//! Thread-to-core pinning.

use crate::error::Error;

/// Pin the calling thread to exactly one logical core.
///
/// Must succeed before any cycle measurement on that thread: a worker the
/// scheduler can migrate between cores reads a different core's cycle
/// counter mid-sample and produces a plausible-looking but wrong number.
/// Callers treat failure as fatal for the whole run.
pub fn bind_to_cpu(core: usize) -> Result<(), Error> {
    if core_affinity::set_for_current(core_affinity::CoreId { id: core }) {
        Ok(())
    } else {
        Err(Error::AffinityBind { core })
    }
}
