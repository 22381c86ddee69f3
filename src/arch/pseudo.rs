//! Table-driven pseudo registers built from pieces of raw registers.
use crate::arch::{ByteOrder, PseudoRegisterResolver};
use crate::error::Result;
use crate::regcache::RegisterCache;

/// How one pseudo register maps onto the raw register file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Piece {
    /// The least significant bytes of a raw register, whichever end of the
    /// buffer those live at.
    Low { raw: usize },
    /// An explicit byte window into a raw register (e.g. x86 `ah`).
    Slice { raw: usize, offset: usize },
    /// Raw registers glued together, most significant first.
    Concat(Vec<usize>),
}

/// Resolver for architectures whose pseudo registers are all views of raw
/// registers. Entry `i` describes pseudo register `raw_count + i`.
#[derive(Clone, Debug)]
pub struct SubRegisterResolver {
    pieces: Vec<Piece>,
}

impl SubRegisterResolver {
    pub fn new(pieces: Vec<Piece>) -> Self {
        Self { pieces }
    }

    fn piece(&self, cache: &RegisterCache, regnum: usize) -> &Piece {
        let raw_count = cache.architecture().raw_count();
        &self.pieces[regnum - raw_count]
    }

    /// Raw registers of a concatenation in buffer order.
    fn buffer_order(order: ByteOrder, regs: &[usize]) -> Vec<usize> {
        match order {
            ByteOrder::Big => regs.to_vec(),
            ByteOrder::Little => regs.iter().rev().copied().collect(),
        }
    }
}

/// Byte offset of a `len`-byte window covering the low part of a raw register.
fn low_offset(cache: &RegisterCache, raw: usize, len: usize) -> usize {
    let raw_size = cache.descriptor().size(raw);
    match cache.architecture().byte_order() {
        ByteOrder::Little => 0,
        ByteOrder::Big => raw_size - len,
    }
}

impl PseudoRegisterResolver for SubRegisterResolver {
    fn read(&self, cache: &mut RegisterCache, regnum: usize, buf: &mut [u8]) -> Result<()> {
        match self.piece(cache, regnum).clone() {
            Piece::Low { raw } => {
                let offset = low_offset(cache, raw, buf.len());
                cache.raw_read_part(raw, offset, buf)
            }
            Piece::Slice { raw, offset } => cache.raw_read_part(raw, offset, buf),
            Piece::Concat(regs) => {
                let order = cache.architecture().byte_order();
                let mut at = 0;
                for raw in Self::buffer_order(order, &regs) {
                    let size = cache.descriptor().size(raw);
                    cache.raw_read(raw, &mut buf[at..at + size])?;
                    at += size;
                }
                Ok(())
            }
        }
    }

    fn write(&self, cache: &mut RegisterCache, regnum: usize, buf: &[u8]) -> Result<()> {
        match self.piece(cache, regnum).clone() {
            Piece::Low { raw } => {
                let offset = low_offset(cache, raw, buf.len());
                cache.raw_write_part(raw, offset, buf)
            }
            Piece::Slice { raw, offset } => cache.raw_write_part(raw, offset, buf),
            Piece::Concat(regs) => {
                let order = cache.architecture().byte_order();
                let mut at = 0;
                for raw in Self::buffer_order(order, &regs) {
                    let size = cache.descriptor().size(raw);
                    cache.raw_write(raw, &buf[at..at + size])?;
                    at += size;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86_64;
    use crate::regcache::CacheOptions;

    #[test]
    fn x86_sub_registers_alias_their_parent() {
        let arch = x86_64::architecture();
        let n = |name: &str| arch.regnum_by_name(name).unwrap();
        let mut cache = RegisterCache::detached(arch.clone(), CacheOptions::default());

        cache.raw_write_unsigned(n("rax"), 0x1122_3344_5566_7788).unwrap();
        assert_eq!(cache.cooked_read_unsigned(n("eax")).unwrap(), 0x5566_7788);
        assert_eq!(cache.cooked_read_unsigned(n("ax")).unwrap(), 0x7788);
        assert_eq!(cache.cooked_read_unsigned(n("al")).unwrap(), 0x88);
        assert_eq!(cache.cooked_read_unsigned(n("ah")).unwrap(), 0x77);

        cache.cooked_write_unsigned(n("ah"), 0xff).unwrap();
        assert_eq!(cache.raw_read_unsigned(n("rax")).unwrap(), 0x1122_3344_5566_ff88);

        cache.cooked_write_signed(n("eax"), -1).unwrap();
        assert_eq!(cache.raw_read_unsigned(n("rax")).unwrap(), 0x1122_3344_ffff_ffff);
        assert_eq!(cache.cooked_read_signed(n("eax")).unwrap(), -1);
    }

    #[test]
    fn sub_register_of_uncached_parent_fails() {
        let arch = x86_64::architecture();
        let mut cache = RegisterCache::detached(arch.clone(), CacheOptions::default());
        let eax = arch.regnum_by_name("eax").unwrap();

        assert!(cache.cooked_read_unsigned(eax).unwrap_err().is_unavailable());
    }
}
