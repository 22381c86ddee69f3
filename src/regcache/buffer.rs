use std::sync::Arc;

use strum::Display;
use tracing::trace;

use crate::arch::Architecture;
use crate::regcache::descriptor::RegisterDescriptor;

/// Validity of one cached raw register.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum RegisterStatus {
    /// Never fetched, or invalidated since.
    #[default]
    NotFetched,
    Valid,
    /// The target cannot provide a value for this stop.
    Unavailable,
}

/// Raw register bytes plus their validity.
///
/// This is the only part of a cache a [`Target`](crate::target::Target) gets
/// to see: it supplies fetched values into it and collects values to store
/// out of it.
#[derive(Clone, Debug)]
pub struct RegisterBuffer {
    arch: Arc<Architecture>,
    bytes: Vec<u8>,
    status: Vec<RegisterStatus>,
    /// `supply(.., None)` zero-fills instead of marking unavailable.
    synthetic_zero: bool,
}

impl RegisterBuffer {
    pub(crate) fn new(arch: Arc<Architecture>, synthetic_zero: bool) -> Self {
        let desc = arch.descriptor();
        let bytes = vec![0; desc.raw_buffer_size()];
        let status = vec![RegisterStatus::NotFetched; desc.raw_count()];
        Self {
            arch,
            bytes,
            status,
            synthetic_zero,
        }
    }

    pub fn architecture(&self) -> &Arc<Architecture> {
        &self.arch
    }

    pub fn descriptor(&self) -> &RegisterDescriptor {
        self.arch.descriptor()
    }

    fn check_raw(&self, regnum: usize) {
        assert!(
            regnum < self.status.len(),
            "raw register number {regnum} out of range (raw count {})",
            self.status.len()
        );
    }

    pub fn status(&self, regnum: usize) -> RegisterStatus {
        self.check_raw(regnum);
        self.status[regnum]
    }

    pub(crate) fn set_status(&mut self, regnum: usize, status: RegisterStatus) {
        self.check_raw(regnum);
        self.status[regnum] = status;
    }

    /// Record a value fetched from the target.
    ///
    /// `None` means the target has no value for this register: it is marked
    /// unavailable, or zero-filled when the cache opted into synthetic zeros.
    pub fn supply(&mut self, regnum: usize, value: Option<&[u8]>) {
        self.check_raw(regnum);
        match value {
            Some(value) => {
                let span = self.descriptor().span(regnum);
                assert_eq!(
                    value.len(),
                    span.len(),
                    "supplied {} bytes for {}-byte register {}",
                    value.len(),
                    span.len(),
                    self.arch.register_name(regnum)
                );
                self.bytes[span].copy_from_slice(value);
                self.status[regnum] = RegisterStatus::Valid;
            }
            None if self.synthetic_zero => self.supply_zeroed(regnum),
            None => self.mark_unavailable(regnum),
        }
    }

    /// Supply an all-zero value and mark it valid.
    pub fn supply_zeroed(&mut self, regnum: usize) {
        self.check_raw(regnum);
        let span = self.descriptor().span(regnum);
        self.bytes[span].fill(0);
        self.status[regnum] = RegisterStatus::Valid;
    }

    pub fn mark_unavailable(&mut self, regnum: usize) {
        self.check_raw(regnum);
        trace!("register {} marked unavailable", self.arch.register_name(regnum));
        self.status[regnum] = RegisterStatus::Unavailable;
    }

    /// Copy the cached bytes of `regnum` into `out`, whatever their status.
    pub fn collect(&self, regnum: usize, out: &mut [u8]) {
        out.copy_from_slice(self.bytes(regnum));
    }

    /// Cached bytes of `regnum`, whatever their status.
    pub fn bytes(&self, regnum: usize) -> &[u8] {
        self.check_raw(regnum);
        &self.bytes[self.descriptor().span(regnum)]
    }

    pub(crate) fn bytes_mut(&mut self, regnum: usize) -> &mut [u8] {
        self.check_raw(regnum);
        let span = self.arch.descriptor().span(regnum);
        &mut self.bytes[span]
    }

    pub(crate) fn invalidate_all(&mut self) {
        self.status.fill(RegisterStatus::NotFetched);
    }

    /// Overwrite this buffer with `other`'s bytes and validity.
    pub(crate) fn clone_from_buffer(&mut self, other: &RegisterBuffer) {
        assert!(
            Arc::ptr_eq(&self.arch, &other.arch),
            "register buffers belong to different architectures"
        );
        self.bytes.copy_from_slice(&other.bytes);
        self.status.copy_from_slice(&other.status);
    }
}
