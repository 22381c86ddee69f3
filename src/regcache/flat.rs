//! Flat byte-offset access to the raw register area.
//!
//! Some consumers still think of "the registers" as one contiguous byte array
//! laid out by the descriptor. This adapter serves them on top of the
//! per-register API; new code should address registers by number instead.
use std::ops::Range;

use crate::error::Result;
use crate::regcache::RegisterCache;

pub struct FlatRegisters<'a> {
    cache: &'a mut RegisterCache,
}

impl<'a> FlatRegisters<'a> {
    pub fn new(cache: &'a mut RegisterCache) -> Self {
        Self { cache }
    }

    /// Total size of the flat area.
    pub fn len(&self) -> usize {
        self.cache.descriptor().raw_buffer_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw registers overlapping `range`, with the overlap expressed both as
    /// an offset into the register and as an offset into `range`.
    fn overlapping(&self, range: Range<usize>) -> Vec<(usize, usize, Range<usize>)> {
        assert!(
            range.end <= self.len(),
            "flat register range {range:?} exceeds {} bytes",
            self.len()
        );

        let desc = self.cache.descriptor();
        (0..desc.raw_count())
            .filter_map(|regnum| {
                let span = desc.span(regnum);
                let start = span.start.max(range.start);
                let end = span.end.min(range.end);
                (start < end).then(|| {
                    (
                        regnum,
                        start - span.start,
                        start - range.start..end - range.start,
                    )
                })
            })
            .collect()
    }

    /// Fill `out` from the flat area starting at `offset`. Bytes not covered
    /// by any register read as zero.
    pub fn read_bytes(&mut self, offset: usize, out: &mut [u8]) -> Result<()> {
        out.fill(0);
        for (regnum, reg_offset, window) in self.overlapping(offset..offset + out.len()) {
            self.cache.raw_read_part(regnum, reg_offset, &mut out[window])?;
        }
        Ok(())
    }

    /// Write `bytes` into the flat area starting at `offset`, one register at
    /// a time. Bytes not covered by any register are dropped.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        for (regnum, reg_offset, window) in self.overlapping(offset..offset + bytes.len()) {
            self.cache.raw_write_part(regnum, reg_offset, &bytes[window])?;
        }
        Ok(())
    }
}
