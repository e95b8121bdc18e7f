//! Common data structures.

use serde::Serialize;

/// Outcome of checking whether a VM fits into the free capacity of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AllocationVerdict {
    NotEnoughPes,
    NotEnoughRam,
    NotEnoughBandwidth,
    NotEnoughStorage,
    Success,
}
