//! x86-64 register file.
//!
//! Raw numbering follows the usual debugger ordering (general purpose,
//! segment, x87, SSE). The Linux variant appends the ptrace-only registers.
//! The 32/16/8-bit sub-registers are pseudo registers over the 64-bit ones.
use std::sync::Arc;

use crate::arch::pseudo::{Piece, SubRegisterResolver};
use crate::arch::{Architecture, OsAbi, RegisterDef, RegisterGroup, RegisterType};

/// This is your single source of truth for the 64-bit integer registers.
macro_rules! GP_REGISTER_LIST {
    ($macro:ident) => {
        $macro! {
            // (name, type)
            (rax, Uint64);
            (rbx, Uint64);
            (rcx, Uint64);
            (rdx, Uint64);
            (rsi, Uint64);
            (rdi, Uint64);
            (rbp, DataPtr);
            (rsp, DataPtr);
            (r8, Uint64);
            (r9, Uint64);
            (r10, Uint64);
            (r11, Uint64);
            (r12, Uint64);
            (r13, Uint64);
            (r14, Uint64);
            (r15, Uint64);
            (rip, CodePtr);
            (eflags, Uint32);
            (cs, Uint32);
            (ss, Uint32);
            (ds, Uint32);
            (es, Uint32);
            (fs, Uint32);
            (gs, Uint32);
        }
    };
}

macro_rules! DEFINE_GP {
    ( $( ($name:ident, $ty:ident); )* ) => {
        const GENERAL: &[RegisterDef] = &[
            $(
                RegisterDef::new(stringify!($name), RegisterType::$ty, RegisterGroup::General),
            )*
        ];
    };
}

GP_REGISTER_LIST!(DEFINE_GP);

const X87: &[RegisterDef] = &[
    RegisterDef::new("st0", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st1", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st2", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st3", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st4", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st5", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st6", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("st7", RegisterType::I387Ext, RegisterGroup::Float),
    RegisterDef::new("fctrl", RegisterType::Uint16, RegisterGroup::Float),
    RegisterDef::new("fstat", RegisterType::Uint16, RegisterGroup::Float),
    RegisterDef::new("ftag", RegisterType::Uint16, RegisterGroup::Float),
    RegisterDef::new("fop", RegisterType::Uint16, RegisterGroup::Float),
    RegisterDef::new("fioff", RegisterType::Uint64, RegisterGroup::Float),
    RegisterDef::new("fooff", RegisterType::Uint64, RegisterGroup::Float),
];

const SSE: &[RegisterDef] = &[
    RegisterDef::new("xmm0", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm1", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm2", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm3", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm4", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm5", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm6", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm7", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm8", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm9", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm10", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm11", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm12", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm13", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm14", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("xmm15", RegisterType::Vec128, RegisterGroup::Vector),
    RegisterDef::new("mxcsr", RegisterType::Uint32, RegisterGroup::Vector),
];

/// Only reachable through ptrace on Linux.
const LINUX: &[RegisterDef] = &[
    // ptrace exposes this as the way to get the ID of a syscall.
    RegisterDef::new("orig_rax", RegisterType::Int64, RegisterGroup::System),
    RegisterDef::new("fs_base", RegisterType::DataPtr, RegisterGroup::System),
    RegisterDef::new("gs_base", RegisterType::DataPtr, RegisterGroup::System),
];

#[derive(Clone, Copy)]
enum Part {
    Low,
    /// Bits 8..16, the legacy `ah`-style registers.
    High8,
}

// (pseudo name, parent, type, part)
const SUB_REGISTERS: &[(&str, &str, RegisterType, Part)] = &[
    ("eax", "rax", RegisterType::Int32, Part::Low),
    ("ebx", "rbx", RegisterType::Int32, Part::Low),
    ("ecx", "rcx", RegisterType::Int32, Part::Low),
    ("edx", "rdx", RegisterType::Int32, Part::Low),
    ("esi", "rsi", RegisterType::Int32, Part::Low),
    ("edi", "rdi", RegisterType::Int32, Part::Low),
    ("ebp", "rbp", RegisterType::Int32, Part::Low),
    ("esp", "rsp", RegisterType::Int32, Part::Low),
    ("r8d", "r8", RegisterType::Int32, Part::Low),
    ("r9d", "r9", RegisterType::Int32, Part::Low),
    ("r10d", "r10", RegisterType::Int32, Part::Low),
    ("r11d", "r11", RegisterType::Int32, Part::Low),
    ("r12d", "r12", RegisterType::Int32, Part::Low),
    ("r13d", "r13", RegisterType::Int32, Part::Low),
    ("r14d", "r14", RegisterType::Int32, Part::Low),
    ("r15d", "r15", RegisterType::Int32, Part::Low),
    ("ax", "rax", RegisterType::Int16, Part::Low),
    ("bx", "rbx", RegisterType::Int16, Part::Low),
    ("cx", "rcx", RegisterType::Int16, Part::Low),
    ("dx", "rdx", RegisterType::Int16, Part::Low),
    ("si", "rsi", RegisterType::Int16, Part::Low),
    ("di", "rdi", RegisterType::Int16, Part::Low),
    ("bp", "rbp", RegisterType::Int16, Part::Low),
    ("sp16", "rsp", RegisterType::Int16, Part::Low),
    ("al", "rax", RegisterType::Int8, Part::Low),
    ("bl", "rbx", RegisterType::Int8, Part::Low),
    ("cl", "rcx", RegisterType::Int8, Part::Low),
    ("dl", "rdx", RegisterType::Int8, Part::Low),
    ("sil", "rsi", RegisterType::Int8, Part::Low),
    ("dil", "rdi", RegisterType::Int8, Part::Low),
    ("bpl", "rbp", RegisterType::Int8, Part::Low),
    ("spl", "rsp", RegisterType::Int8, Part::Low),
    ("ah", "rax", RegisterType::Int8, Part::High8),
    ("bh", "rbx", RegisterType::Int8, Part::High8),
    ("ch", "rcx", RegisterType::Int8, Part::High8),
    ("dh", "rdx", RegisterType::Int8, Part::High8),
];

/// Generic x86-64, without any OS-specific registers.
pub fn architecture() -> Arc<Architecture> {
    build(OsAbi::None, &[GENERAL, X87, SSE])
}

/// x86-64 as seen through Linux ptrace.
pub fn linux_architecture() -> Arc<Architecture> {
    build(OsAbi::Linux, &[GENERAL, X87, SSE, LINUX])
}

fn build(osabi: OsAbi, tables: &[&[RegisterDef]]) -> Arc<Architecture> {
    let raw: Vec<RegisterDef> = tables.iter().flat_map(|t| t.iter().copied()).collect();
    let raw_index = |name: &str| {
        raw.iter()
            .position(|r| r.name == name)
            .unwrap_or_else(|| panic!("no raw register named {name}"))
    };

    let mut pseudo = Vec::with_capacity(SUB_REGISTERS.len());
    let mut pieces = Vec::with_capacity(SUB_REGISTERS.len());
    for &(name, parent, ty, part) in SUB_REGISTERS {
        let raw = raw_index(parent);
        pseudo.push(RegisterDef::new(name, ty, RegisterGroup::General));
        pieces.push(match part {
            Part::Low => Piece::Low { raw },
            Part::High8 => Piece::Slice { raw, offset: 1 },
        });
    }

    let name = match osabi {
        OsAbi::None => "x86_64".to_string(),
        abi => format!("x86_64-{abi}"),
    };
    Architecture::builder(name)
        .osabi(osabi)
        .raw_registers(raw)
        .pseudo_registers(pseudo, Arc::new(SubRegisterResolver::new(pieces)))
        .pc("rip")
        .sp("rsp")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_variant_appends_ptrace_registers() {
        let generic = architecture();
        let linux = linux_architecture();

        assert_eq!(linux.raw_count(), generic.raw_count() + LINUX.len());
        assert_eq!(linux.regnum_by_name("orig_rax"), Some(generic.raw_count()));
        assert_eq!(linux.pc_regnum(), linux.regnum_by_name("rip"));
        // sub-registers are numbered after every raw register
        assert!(linux.regnum_by_name("eax").unwrap() >= linux.raw_count());
    }

    #[test]
    fn layout_is_packed_in_register_order() {
        let arch = architecture();
        let desc = arch.descriptor();
        let xmm0 = arch.regnum_by_name("xmm0").unwrap();

        assert_eq!(desc.offset(1), 8);
        assert_eq!(desc.size(xmm0), 16);
        assert_eq!(desc.max_size(), 16);
    }
}
