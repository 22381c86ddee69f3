use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use tracing::trace;

use crate::regcache::buffer::RegisterBuffer;
use crate::target::Target;

/// A frozen set of register values, the way a core file provides them.
///
/// Registers missing from the snapshot are reported unavailable. Stores are
/// refused.
#[derive(Clone, Debug, Default)]
pub struct SnapshotTarget {
    values: HashMap<usize, Vec<u8>>,
}

impl SnapshotTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(mut self, regnum: usize, bytes: impl Into<Vec<u8>>) -> Self {
        self.values.insert(regnum, bytes.into());
        self
    }

    fn supply_one(&self, regs: &mut RegisterBuffer, regnum: usize) -> Result<()> {
        let value = self.values.get(&regnum).map(Vec::as_slice);
        if let Some(bytes) = value {
            let expected = regs.descriptor().size(regnum);
            if bytes.len() != expected {
                bail!(
                    "snapshot holds {} bytes for register {}, expected {expected}",
                    bytes.len(),
                    regs.architecture().register_name(regnum)
                );
            }
        }
        regs.supply(regnum, value);
        Ok(())
    }
}

impl Target for SnapshotTarget {
    fn fetch_registers(&mut self, regs: &mut RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        match regnum {
            Some(regnum) => self.supply_one(regs, regnum),
            None => {
                trace!("supplying {} registers from snapshot", self.values.len());
                (0..regs.descriptor().raw_count())
                    .try_for_each(|regnum| self.supply_one(regs, regnum))
            }
        }
    }

    fn store_registers(&mut self, _regs: &RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        Err(anyhow!(
            "cannot store register {regnum:?}: register snapshots are read-only"
        ))
    }
}
