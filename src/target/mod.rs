//! The debuggee side of the register cache.
use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use crate::regcache::buffer::RegisterBuffer;

#[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu"))]
pub mod ptrace;
pub mod snapshot;

/// Where register values ultimately come from: a live process, a core file,
/// a remote stub.
///
/// `regnum == None` means "every register". Implementations only ever see the
/// cache's [`RegisterBuffer`], so they cannot re-enter the cache that called
/// them.
pub trait Target {
    /// Supply the requested register(s) into `regs`, or mark them unavailable.
    fn fetch_registers(&mut self, regs: &mut RegisterBuffer, regnum: Option<usize>) -> Result<()>;

    /// Transmit the cached bytes of the requested register(s) to the debuggee.
    fn store_registers(&mut self, regs: &RegisterBuffer, regnum: Option<usize>) -> Result<()>;

    /// Hook run before a store, e.g. to fetch registers sharing a hardware
    /// slot with the one being written.
    fn prepare_to_store(&mut self, _regs: &mut RegisterBuffer) -> Result<()> {
        Ok(())
    }

    /// Registers the debuggee cannot change; writes to them are dropped.
    fn cannot_store_register(&self, _regnum: usize) -> bool {
        false
    }

    /// Store every write even when the value is unchanged (e.g. hardware
    /// registers where the write itself has an effect).
    fn always_store(&self) -> bool {
        false
    }
}

/// A target shared by every live cache talking to it.
pub type TargetRef = Rc<RefCell<dyn Target>>;
