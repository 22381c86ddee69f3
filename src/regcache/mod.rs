//! The register cache: a lazily populated, validity-tracked copy of a
//! target's raw register file, with a uniform "cooked" numbering that also
//! covers pseudo registers.
//!
//! A cache is either *passthrough* (bound to a live [`Target`]: misses are
//! fetched, writes are stored immediately) or *detached* (a snapshot used for
//! unwinding and the like: misses are errors, writes only touch the cache).
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::arch::{Architecture, ByteOrder};
use crate::error::{Error, Result};
use crate::target::TargetRef;
use crate::value::RegisterValue;

pub mod buffer;
pub mod descriptor;
pub mod dump;
pub mod flat;

use buffer::{RegisterBuffer, RegisterStatus};
use descriptor::RegisterDescriptor;

/// Per-cache behaviour knobs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheOptions {
    /// Legacy behaviour: a register the target cannot supply reads as zero
    /// instead of failing with [`Error::Unavailable`].
    pub synthetic_zero: bool,
    /// Skip the target store when writing the value already cached.
    /// Targets reporting [`Target::always_store`](crate::target::Target::always_store)
    /// override this.
    pub suppress_redundant_stores: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            synthetic_zero: false,
            suppress_redundant_stores: true,
        }
    }
}

/// Which numbering a partial transfer goes through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Numbering {
    Raw,
    Cooked,
}

pub struct RegisterCache {
    regs: RegisterBuffer,
    target: Option<TargetRef>,
    options: CacheOptions,
}

impl fmt::Debug for RegisterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterCache")
            .field("arch", &self.architecture().name())
            .field("passthrough", &self.is_passthrough())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RegisterCache {
    /// A cache bound to a live target.
    pub fn new(arch: Arc<Architecture>, target: TargetRef, options: CacheOptions) -> Self {
        Self {
            regs: RegisterBuffer::new(arch, options.synthetic_zero),
            target: Some(target),
            options,
        }
    }

    /// A cache with no target behind it.
    pub fn detached(arch: Arc<Architecture>, options: CacheOptions) -> Self {
        Self {
            regs: RegisterBuffer::new(arch, options.synthetic_zero),
            target: None,
            options,
        }
    }

    pub fn architecture(&self) -> &Arc<Architecture> {
        self.regs.architecture()
    }

    pub fn descriptor(&self) -> &RegisterDescriptor {
        self.regs.descriptor()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.architecture().byte_order()
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn is_passthrough(&self) -> bool {
        self.target.is_some()
    }

    pub fn register_status(&self, regnum: usize) -> RegisterStatus {
        self.regs.status(regnum)
    }

    fn check_raw(&self, regnum: usize, len: usize) {
        let desc = self.descriptor();
        assert!(
            regnum < desc.raw_count(),
            "raw register number {regnum} out of range (raw count {})",
            desc.raw_count()
        );
        assert_eq!(
            len,
            desc.size(regnum),
            "buffer of {len} bytes for {}-byte register {}",
            desc.size(regnum),
            self.architecture().register_name(regnum)
        );
    }

    fn check_cooked(&self, regnum: usize, len: usize) {
        let desc = self.descriptor();
        assert!(
            regnum < desc.cooked_count(),
            "register number {regnum} out of range (cooked count {})",
            desc.cooked_count()
        );
        assert_eq!(
            len,
            desc.size(regnum),
            "buffer of {len} bytes for {}-byte register {}",
            desc.size(regnum),
            self.architecture().register_name(regnum)
        );
    }

    /// Ask the target to supply `regnum` (or everything, for `None`).
    fn fetch(&mut self, regnum: Option<usize>) -> Result<()> {
        let Some(target) = &self.target else {
            return Ok(());
        };
        let mut target = target.try_borrow_mut().map_err(|_| Error::TargetBusy)?;

        trace!(
            "fetching {} from target",
            regnum.map_or("all registers", |r| self.regs.architecture().register_name(r))
        );
        target.fetch_registers(&mut self.regs, regnum)?;
        Ok(())
    }

    /// Fetch every raw register the target can provide in one request.
    pub fn fetch_all(&mut self) -> Result<()> {
        self.fetch(None)
    }

    pub fn raw_read(&mut self, regnum: usize, buf: &mut [u8]) -> Result<()> {
        self.check_raw(regnum, buf.len());

        if self.regs.status(regnum) == RegisterStatus::NotFetched {
            if !self.is_passthrough() {
                return Err(Error::NotCached {
                    regnum,
                    name: self.architecture().register_name(regnum).to_string(),
                });
            }
            self.fetch(Some(regnum))?;
            // the target had its chance; it did not supply a value
            if self.regs.status(regnum) == RegisterStatus::NotFetched {
                self.regs.supply(regnum, None);
            }
        }

        match self.regs.status(regnum) {
            RegisterStatus::Valid => {
                self.regs.collect(regnum, buf);
                Ok(())
            }
            _ => Err(Error::Unavailable {
                regnum,
                name: self.architecture().register_name(regnum).to_string(),
            }),
        }
    }

    pub fn raw_write(&mut self, regnum: usize, buf: &[u8]) -> Result<()> {
        self.check_raw(regnum, buf.len());
        let name = self.regs.architecture().register_name(regnum);

        let Some(target) = &self.target else {
            if !self.regs.architecture().is_read_only(regnum) {
                self.regs.bytes_mut(regnum).copy_from_slice(buf);
                self.regs.set_status(regnum, RegisterStatus::Valid);
            }
            return Ok(());
        };
        let mut target = target.try_borrow_mut().map_err(|_| Error::TargetBusy)?;

        if self.regs.architecture().is_read_only(regnum) || target.cannot_store_register(regnum) {
            trace!("register {name} cannot be stored, ignoring write");
            return Ok(());
        }

        let suppress = self.options.suppress_redundant_stores && !target.always_store();
        if suppress
            && self.regs.status(regnum) == RegisterStatus::Valid
            && self.regs.bytes(regnum) == buf
        {
            trace!("register {name} unchanged, skipping store");
            return Ok(());
        }

        target.prepare_to_store(&mut self.regs)?;
        self.regs.bytes_mut(regnum).copy_from_slice(buf);
        self.regs.set_status(regnum, RegisterStatus::Valid);

        trace!("storing {name} to target");
        if let Err(e) = target.store_registers(&self.regs, Some(regnum)) {
            warn!("failed to store register {name}: {e:#}");
            // whatever the target now holds, the cached bytes are not it
            self.regs.set_status(regnum, RegisterStatus::NotFetched);
            return Err(e.into());
        }

        Ok(())
    }

    pub fn cooked_read(&mut self, regnum: usize, buf: &mut [u8]) -> Result<()> {
        self.check_cooked(regnum, buf.len());
        if regnum < self.descriptor().raw_count() {
            return self.raw_read(regnum, buf);
        }

        let resolver = self
            .architecture()
            .resolver()
            .cloned()
            .expect("architecture with pseudo registers should have a resolver");
        resolver.read(self, regnum, buf)
    }

    pub fn cooked_write(&mut self, regnum: usize, buf: &[u8]) -> Result<()> {
        self.check_cooked(regnum, buf.len());
        if regnum < self.descriptor().raw_count() {
            return self.raw_write(regnum, buf);
        }

        let resolver = self
            .architecture()
            .resolver()
            .cloned()
            .expect("architecture with pseudo registers should have a resolver");
        resolver.write(self, regnum, buf)
    }

    fn read_numbered(&mut self, numbering: Numbering, regnum: usize, buf: &mut [u8]) -> Result<()> {
        match numbering {
            Numbering::Raw => self.raw_read(regnum, buf),
            Numbering::Cooked => self.cooked_read(regnum, buf),
        }
    }

    fn write_numbered(&mut self, numbering: Numbering, regnum: usize, buf: &[u8]) -> Result<()> {
        match numbering {
            Numbering::Raw => self.raw_write(regnum, buf),
            Numbering::Cooked => self.cooked_write(regnum, buf),
        }
    }

    /// Read or write `[offset, offset + len)` of one register, preserving the
    /// bytes outside that window.
    fn transfer_part(
        &mut self,
        numbering: Numbering,
        regnum: usize,
        offset: usize,
        read_into: Option<&mut [u8]>,
        write_from: Option<&[u8]>,
    ) -> Result<()> {
        let count = match numbering {
            Numbering::Raw => self.descriptor().raw_count(),
            Numbering::Cooked => self.descriptor().cooked_count(),
        };
        assert!(regnum < count, "register number {regnum} out of range");

        let size = self.descriptor().size(regnum);
        let len = match (&read_into, write_from) {
            (Some(out), _) => out.len(),
            (None, Some(input)) => input.len(),
            (None, None) => 0,
        };
        assert!(
            offset + len <= size,
            "transfer of [{offset}, {}) exceeds {size}-byte register {}",
            offset + len,
            self.architecture().register_name(regnum)
        );
        if len == 0 {
            return Ok(());
        }

        let mut scratch = vec![0u8; self.descriptor().max_size()];
        let whole = &mut scratch[..size];

        let covers_whole = offset == 0 && len == size;
        if read_into.is_some() || !covers_whole {
            self.read_numbered(numbering, regnum, whole)?;
        }

        if let Some(out) = read_into {
            out.copy_from_slice(&whole[offset..offset + len]);
        }

        if let Some(input) = write_from {
            whole[offset..offset + len].copy_from_slice(input);
            self.write_numbered(numbering, regnum, whole)?;
        }

        Ok(())
    }

    pub fn raw_read_part(&mut self, regnum: usize, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.transfer_part(Numbering::Raw, regnum, offset, Some(buf), None)
    }

    pub fn raw_write_part(&mut self, regnum: usize, offset: usize, buf: &[u8]) -> Result<()> {
        self.transfer_part(Numbering::Raw, regnum, offset, None, Some(buf))
    }

    pub fn cooked_read_part(&mut self, regnum: usize, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.transfer_part(Numbering::Cooked, regnum, offset, Some(buf), None)
    }

    pub fn cooked_write_part(&mut self, regnum: usize, offset: usize, buf: &[u8]) -> Result<()> {
        self.transfer_part(Numbering::Cooked, regnum, offset, None, Some(buf))
    }

    fn read_whole(&mut self, numbering: Numbering, regnum: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.descriptor().size(regnum)];
        self.read_numbered(numbering, regnum, &mut buf)?;
        Ok(buf)
    }

    fn write_integer(&mut self, numbering: Numbering, regnum: usize, value: u64) -> Result<()> {
        let mut buf = vec![0u8; self.descriptor().size(regnum)];
        self.byte_order().write_unsigned(&mut buf, value);
        self.write_numbered(numbering, regnum, &buf)
    }

    pub fn raw_read_unsigned(&mut self, regnum: usize) -> Result<u64> {
        let bytes = self.read_whole(Numbering::Raw, regnum)?;
        Ok(self.byte_order().read_unsigned(&bytes))
    }

    pub fn raw_read_signed(&mut self, regnum: usize) -> Result<i64> {
        let bytes = self.read_whole(Numbering::Raw, regnum)?;
        Ok(self.byte_order().read_signed(&bytes))
    }

    pub fn raw_write_unsigned(&mut self, regnum: usize, value: u64) -> Result<()> {
        self.write_integer(Numbering::Raw, regnum, value)
    }

    pub fn raw_write_signed(&mut self, regnum: usize, value: i64) -> Result<()> {
        self.write_integer(Numbering::Raw, regnum, value as u64)
    }

    pub fn cooked_read_unsigned(&mut self, regnum: usize) -> Result<u64> {
        let bytes = self.read_whole(Numbering::Cooked, regnum)?;
        Ok(self.byte_order().read_unsigned(&bytes))
    }

    pub fn cooked_read_signed(&mut self, regnum: usize) -> Result<i64> {
        let bytes = self.read_whole(Numbering::Cooked, regnum)?;
        Ok(self.byte_order().read_signed(&bytes))
    }

    pub fn cooked_write_unsigned(&mut self, regnum: usize, value: u64) -> Result<()> {
        self.write_integer(Numbering::Cooked, regnum, value)
    }

    pub fn cooked_write_signed(&mut self, regnum: usize, value: i64) -> Result<()> {
        self.write_integer(Numbering::Cooked, regnum, value as u64)
    }

    /// Typed value of any register, raw or pseudo.
    pub fn cooked_read_value(&mut self, regnum: usize) -> Result<RegisterValue> {
        let bytes = self.read_whole(Numbering::Cooked, regnum)?;
        let ty = self.descriptor().register_type(regnum);
        Ok(RegisterValue::from_bytes(ty, self.byte_order(), &bytes))
    }

    fn pc_regnum(&self) -> Result<usize> {
        let arch = self.architecture();
        arch.pc_regnum()
            .ok_or_else(|| Error::NoProgramCounter(arch.name().to_string()))
    }

    pub fn read_pc(&mut self) -> Result<u64> {
        let pc = self.pc_regnum()?;
        self.cooked_read_unsigned(pc)
    }

    pub fn write_pc(&mut self, value: u64) -> Result<()> {
        let pc = self.pc_regnum()?;
        self.cooked_write_unsigned(pc, value)
    }

    /// Forget everything cached; the next read of each register refetches.
    /// Stale bytes stay in the buffer but are unreachable.
    pub fn invalidate_all(&mut self) {
        debug!("registers changed, invalidating {} cache", self.architecture().name());
        self.regs.invalidate_all();
    }

    pub fn invalidate(&mut self, regnum: usize) {
        self.regs.set_status(regnum, RegisterStatus::NotFetched);
    }

    /// Copy every raw register from `src` into `dst` through the normal
    /// read/write paths, so either side may talk to its target.
    pub fn copy(dst: &mut RegisterCache, src: &mut RegisterCache) -> Result<()> {
        assert!(
            Arc::ptr_eq(dst.architecture(), src.architecture()),
            "register caches belong to different architectures"
        );

        for regnum in 0..src.descriptor().raw_count() {
            let mut buf = vec![0u8; src.descriptor().size(regnum)];
            match src.raw_read(regnum, &mut buf) {
                // a snapshot keeps read-only registers too
                Ok(()) if !dst.is_passthrough() => dst.regs.supply(regnum, Some(&buf)),
                Ok(()) => dst.raw_write(regnum, &buf)?,
                Err(Error::Unavailable { .. }) if !dst.is_passthrough() => {
                    dst.regs.mark_unavailable(regnum);
                }
                Err(Error::Unavailable { .. } | Error::NotCached { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Copy bytes and validity wholesale, without touching any target.
    /// `dst` must be detached.
    pub fn copy_no_passthrough(dst: &mut RegisterCache, src: &RegisterCache) {
        assert!(
            !dst.is_passthrough(),
            "cannot overwrite a live register cache without going through its target"
        );
        dst.regs.clone_from_buffer(&src.regs);
    }

    /// A detached copy populated through `self`'s read path (fetching from
    /// the target as needed).
    pub fn duplicate(&mut self) -> Result<RegisterCache> {
        let mut dup = RegisterCache::detached(self.architecture().clone(), self.options);
        RegisterCache::copy(&mut dup, self)?;
        Ok(dup)
    }

    /// A detached copy of exactly what is cached right now.
    pub fn duplicate_no_passthrough(&self) -> RegisterCache {
        let mut dup = RegisterCache::detached(self.architecture().clone(), self.options);
        RegisterCache::copy_no_passthrough(&mut dup, self);
        dup
    }
}
