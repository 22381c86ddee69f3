//! `maint print raw-registers` style table of a cache's layout and contents.
use std::fmt::Write;

use strum::Display;

use crate::error::{Error, Result};
use crate::regcache::RegisterCache;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum DumpKind {
    /// Raw registers only, straight from the buffer.
    Raw,
    /// Every register number, pseudo registers included.
    Cooked,
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Render the table. Values are fetched on demand, so dumping a live cache
/// may talk to the target.
pub fn dump(cache: &mut RegisterCache, kind: DumpKind) -> Result<String> {
    let arch = cache.architecture().clone();
    let count = match kind {
        DumpKind::Raw => arch.raw_count(),
        DumpKind::Cooked => arch.cooked_count(),
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:>4} {:>6} {:>4} {:<10} Value",
        "Name", "Nr", "Offset", "Size", "Type"
    );

    for regnum in 0..count {
        let desc = cache.descriptor();
        let (offset, size, ty) = (desc.offset(regnum), desc.size(regnum), desc.register_type(regnum));

        let mut bytes = vec![0u8; size];
        let read = match kind {
            DumpKind::Raw => cache.raw_read(regnum, &mut bytes),
            DumpKind::Cooked => cache.cooked_read(regnum, &mut bytes),
        };
        let value = match read {
            Ok(()) => hex(&bytes),
            Err(Error::NotCached { .. }) => "<not fetched>".to_string(),
            Err(e) if e.is_unavailable() => "<unavailable>".to_string(),
            Err(e) => return Err(e),
        };

        let _ = writeln!(
            out,
            "{:<10} {:>4} {:>6} {:>4} {:<10} {}",
            arch.register_name(regnum),
            regnum,
            offset,
            size,
            ty.to_string(),
            value
        );
    }

    Ok(out)
}
