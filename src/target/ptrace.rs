//! Live x86-64 Linux process, reached through ptrace register sets.
//!
//! Part of what makes this module weird is the intersection of
//! c structs, the `libc` crate, `memoffset`, and the raw register layout:
//! each raw register is a byte window into either `user_regs_struct` or
//! `user_fpregs_struct`.
use std::collections::HashMap;

use anyhow::Result;
use libc::{user_fpregs_struct, user_regs_struct};
use memoffset::offset_of;
use nix::sys::ptrace::{getregset, regset, setregset};
use nix::unistd::Pid;
use tracing::trace;

use crate::arch::Architecture;
use crate::regcache::buffer::RegisterBuffer;
use crate::target::Target;

/// Which ptrace register set a raw register lives in, and where.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Location {
    /// Byte offset into `user_regs_struct`.
    Regs(usize),
    /// Byte offset into `user_fpregs_struct`.
    Fpu(usize),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RegSet {
    General,
    Float,
}

impl Location {
    fn regset(&self) -> RegSet {
        match self {
            Location::Regs(_) => RegSet::General,
            Location::Fpu(_) => RegSet::Float,
        }
    }
}

/// Every `user_regs_struct` field, named as the architecture names the register.
macro_rules! GP_FIELDS {
    ($macro:ident) => {
        $macro! {
            r15, r14, r13, r12, rbp, rbx, r11, r10, r9, r8, rax, rcx, rdx, rsi, rdi,
            orig_rax, rip, cs, eflags, rsp, ss, fs_base, gs_base, ds, es, fs, gs
        }
    };
}

macro_rules! DEFINE_GP_OFFSETS {
    ( $( $field:ident ),* ) => {
        fn gp_offset(name: &str) -> Option<usize> {
            match name {
                $( stringify!($field) => Some(offset_of!(user_regs_struct, $field)), )*
                _ => None,
            }
        }
    };
}

GP_FIELDS!(DEFINE_GP_OFFSETS);

fn fp_offset(name: &str) -> Option<usize> {
    let indexed = |prefix: &str, count: usize| -> Option<usize> {
        name.strip_prefix(prefix)?
            .parse::<usize>()
            .ok()
            .filter(|i| *i < count)
    };

    let offset = match name {
        "fctrl" => offset_of!(user_fpregs_struct, cwd),
        "fstat" => offset_of!(user_fpregs_struct, swd),
        "ftag" => offset_of!(user_fpregs_struct, ftw),
        "fop" => offset_of!(user_fpregs_struct, fop),
        "fioff" => offset_of!(user_fpregs_struct, rip),
        "fooff" => offset_of!(user_fpregs_struct, rdp),
        "mxcsr" => offset_of!(user_fpregs_struct, mxcsr),
        // each st(i) occupies a 16-byte slot, of which the first 10 are significant
        _ if name.starts_with("st") => offset_of!(user_fpregs_struct, st_space) + indexed("st", 8)? * 16,
        _ if name.starts_with("xmm") => {
            offset_of!(user_fpregs_struct, xmm_space) + indexed("xmm", 16)? * 16
        }
        _ => return None,
    };
    Some(offset)
}

fn struct_as_bytes<T>(value: &T) -> &[u8] {
    let len = std::mem::size_of::<T>();
    // SAFETY: Only reinterpreting the provided reference as bytes.
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), len) }
}

fn struct_as_bytes_mut<T>(value: &mut T) -> &mut [u8] {
    let len = std::mem::size_of::<T>();
    // SAFETY: `T` is one of the plain-data ptrace structs; any byte pattern is valid.
    unsafe { std::slice::from_raw_parts_mut((value as *mut T).cast::<u8>(), len) }
}

/// A stopped, ptrace-attached process.
#[derive(Clone, Debug)]
pub struct PtraceTarget {
    pid: Pid,
    locations: HashMap<usize, Location>,
}

impl PtraceTarget {
    /// Map every raw register of `arch` that ptrace can reach.
    pub fn new(pid: Pid, arch: &Architecture) -> Self {
        let locations = (0..arch.raw_count())
            .filter_map(|regnum| {
                let name = arch.register_name(regnum);
                gp_offset(name)
                    .map(Location::Regs)
                    .or_else(|| fp_offset(name).map(Location::Fpu))
                    .map(|loc| (regnum, loc))
            })
            .collect();

        Self { pid, locations }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn registers_in(&self, set: RegSet) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.locations.iter().filter_map(move |(regnum, loc)| match loc {
            Location::Regs(offset) if set == RegSet::General => Some((*regnum, *offset)),
            Location::Fpu(offset) if set == RegSet::Float => Some((*regnum, *offset)),
            _ => None,
        })
    }

    fn supply_from(&self, regs: &mut RegisterBuffer, set: RegSet, bytes: &[u8]) {
        for (regnum, offset) in self.registers_in(set) {
            let size = regs.descriptor().size(regnum);
            regs.supply(regnum, Some(&bytes[offset..offset + size]));
        }
    }

    fn fetch_set(&self, regs: &mut RegisterBuffer, set: RegSet) -> Result<()> {
        trace!("PTRACE_GETREGSET {set:?} for {}", self.pid);
        match set {
            RegSet::General => {
                let gp = getregset::<regset::NT_PRSTATUS>(self.pid)?;
                self.supply_from(regs, set, struct_as_bytes(&gp));
            }
            RegSet::Float => {
                let fp = getregset::<regset::NT_PRFPREG>(self.pid)?;
                self.supply_from(regs, set, struct_as_bytes(&fp));
            }
        }
        Ok(())
    }

    /// Patch `targets` into `bytes` from the cache.
    fn collect_into(regs: &RegisterBuffer, targets: &[(usize, usize)], bytes: &mut [u8]) {
        for &(regnum, offset) in targets {
            let size = regs.descriptor().size(regnum);
            regs.collect(regnum, &mut bytes[offset..offset + size]);
        }
    }

    fn store_set(&self, regs: &RegisterBuffer, set: RegSet, only: Option<usize>) -> Result<()> {
        // read-modify-write: registers we are not storing keep the process's values
        let targets: Vec<(usize, usize)> = self
            .registers_in(set)
            .filter(|(regnum, _)| only.is_none_or(|r| r == *regnum))
            .collect();

        trace!("PTRACE_SETREGSET {set:?} for {} ({} registers)", self.pid, targets.len());
        match set {
            RegSet::General => {
                let mut gp = getregset::<regset::NT_PRSTATUS>(self.pid)?;
                Self::collect_into(regs, &targets, struct_as_bytes_mut(&mut gp));
                setregset::<regset::NT_PRSTATUS>(self.pid, gp)?;
            }
            RegSet::Float => {
                let mut fp = getregset::<regset::NT_PRFPREG>(self.pid)?;
                Self::collect_into(regs, &targets, struct_as_bytes_mut(&mut fp));
                setregset::<regset::NT_PRFPREG>(self.pid, fp)?;
            }
        }
        Ok(())
    }
}

impl Target for PtraceTarget {
    fn fetch_registers(&mut self, regs: &mut RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        match regnum.map(|r| self.locations.get(&r).copied()) {
            // ptrace has no way to reach this one
            Some(None) => {
                if let Some(r) = regnum {
                    regs.mark_unavailable(r);
                }
            }
            Some(Some(loc)) => self.fetch_set(regs, loc.regset())?,
            None => {
                self.fetch_set(regs, RegSet::General)?;
                self.fetch_set(regs, RegSet::Float)?;
            }
        }
        Ok(())
    }

    fn store_registers(&mut self, regs: &RegisterBuffer, regnum: Option<usize>) -> Result<()> {
        match regnum {
            Some(r) => match self.locations.get(&r) {
                Some(loc) => self.store_set(regs, loc.regset(), Some(r)),
                None => Ok(()),
            },
            None => {
                self.store_set(regs, RegSet::General, None)?;
                self.store_set(regs, RegSet::Float, None)
            }
        }
    }

    fn cannot_store_register(&self, regnum: usize) -> bool {
        !self.locations.contains_key(&regnum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_64;

    #[test]
    fn every_linux_raw_register_is_reachable() {
        let arch = x86_64::linux_architecture();
        let target = PtraceTarget::new(Pid::from_raw(1), &arch);

        assert_eq!(target.locations.len(), arch.raw_count());
        let rax = arch.regnum_by_name("rax").unwrap();
        assert_eq!(
            target.locations[&rax],
            Location::Regs(offset_of!(user_regs_struct, rax))
        );
        let st1 = arch.regnum_by_name("st1").unwrap();
        assert_eq!(
            target.locations[&st1],
            Location::Fpu(offset_of!(user_fpregs_struct, st_space) + 16)
        );
    }
}
