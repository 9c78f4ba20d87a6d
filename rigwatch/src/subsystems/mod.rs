//! Shipped example subsystem bindings (spec §2): concrete Collector/Checker
//! pairs proving the scheduler, cache, and fanout work end to end. Each is
//! structurally no different from a third-party subsystem a deployer might
//! add.

pub mod cpu;
pub mod gpu_hang;
pub mod kernel_log;
pub mod memory;
