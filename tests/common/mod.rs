#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Result, bail};
use regcache::arch::pseudo::{Piece, SubRegisterResolver};
use regcache::arch::{Architecture, ByteOrder, RegisterDef, RegisterGroup, RegisterType};
use regcache::regcache::buffer::RegisterBuffer;
use regcache::target::{Target, TargetRef};
use regcache::{CacheOptions, RegisterCache};

pub const R0: usize = 0;
pub const R1: usize = 1;
pub const R2: usize = 2;
pub const PC: usize = 3;
/// Pseudo: `R1:R0`, R1 most significant.
pub const P0: usize = 4;
/// Pseudo: low 16 bits of R1.
pub const R1L: usize = 5;

/// Two 32-bit registers glued into a 64-bit pseudo register, plus a 16-bit
/// read-only register and a program counter.
pub fn toy_architecture(order: ByteOrder) -> Arc<Architecture> {
    Architecture::builder("toy")
        .byte_order(order)
        .raw_registers([
            RegisterDef::new("r0", RegisterType::Uint32, RegisterGroup::General),
            RegisterDef::new("r1", RegisterType::Uint32, RegisterGroup::General),
            RegisterDef::new("r2", RegisterType::Uint16, RegisterGroup::System).read_only(),
            RegisterDef::new("pc", RegisterType::CodePtr, RegisterGroup::General),
        ])
        .pseudo_registers(
            [
                RegisterDef::new("p0", RegisterType::Uint64, RegisterGroup::General),
                RegisterDef::new("r1l", RegisterType::Uint16, RegisterGroup::General),
            ],
            Arc::new(SubRegisterResolver::new(vec![
                Piece::Concat(vec![R1, R0]),
                Piece::Low { raw: R1 },
            ])),
        )
        .pc("pc")
        .build()
}

/// Scriptable target recording every call it receives.
#[derive(Debug, Default)]
pub struct MockTarget {
    /// What the "debuggee" currently holds.
    pub values: HashMap<usize, Vec<u8>>,
    /// Registers the target reports as unavailable.
    pub unavailable: HashSet<usize>,
    /// Registers the target cannot store.
    pub cannot_store: HashSet<usize>,
    pub fetches: Vec<Option<usize>>,
    pub stores: Vec<Option<usize>>,
    pub prepares: usize,
    pub fail_fetches: bool,
    pub fail_stores: bool,
    pub always_store: bool,
}

impl MockTarget {
    pub fn with_value(mut self, regnum: usize, bytes: &[u8]) -> Self {
        self.values.insert(regnum, bytes.to_vec());
        self
    }

    pub fn fetches_of(&self, regnum: usize) -> usize {
        self.fetches
            .iter()
            .filter(|f| f.is_none_or(|r| r == regnum))
            .count()
    }

    fn supply_one(&self, regs: &mut RegisterBuffer, regnum: usize) {
        if self.unavailable.contains(&regnum) {
            regs.supply(regnum, None);
        } else if let Some(bytes) = self.values.get(&regnum) {
            regs.supply(regnum, Some(bytes.as_slice()));
        }
        // otherwise: silently supply nothing
    }
}

impl Target for MockTarget {
    fn fetch_registers(&mut self, regs: &mut RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        self.fetches.push(regnum);
        if self.fail_fetches {
            bail!("link to debuggee lost");
        }
        match regnum {
            Some(r) => self.supply_one(regs, r),
            None => {
                for r in 0..regs.descriptor().raw_count() {
                    self.supply_one(regs, r);
                }
            }
        }
        Ok(())
    }

    fn store_registers(&mut self, regs: &RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        self.stores.push(regnum);
        if self.fail_stores {
            bail!("write rejected by debuggee");
        }
        let targets: Vec<usize> = match regnum {
            Some(r) => vec![r],
            None => (0..regs.descriptor().raw_count()).collect(),
        };
        for r in targets {
            self.values.insert(r, regs.bytes(r).to_vec());
        }
        Ok(())
    }

    fn prepare_to_store(&mut self, _regs: &mut RegisterBuffer) -> Result<()> {
        self.prepares += 1;
        Ok(())
    }

    fn cannot_store_register(&self, regnum: usize) -> bool {
        self.cannot_store.contains(&regnum)
    }

    fn always_store(&self) -> bool {
        self.always_store
    }
}

pub type SharedMock = Rc<RefCell<MockTarget>>;

/// A passthrough cache over `mock`, plus the handle to inspect it with.
pub fn live_cache(
    arch: Arc<Architecture>,
    mock: MockTarget,
    options: CacheOptions,
) -> (RegisterCache, SharedMock) {
    let mock = Rc::new(RefCell::new(mock));
    let target: TargetRef = mock.clone();
    (RegisterCache::new(arch, target, options), mock)
}

/// A big-endian toy target holding r0 = 1, r1 = 2, pc = 0x1000.
pub fn toy_target() -> MockTarget {
    MockTarget::default()
        .with_value(R0, &[0, 0, 0, 1])
        .with_value(R1, &[0, 0, 0, 2])
        .with_value(R2, &[0xab, 0xcd])
        .with_value(PC, &0x1000u64.to_be_bytes())
}
