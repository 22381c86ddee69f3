//! Registers for risc-v 64.
//!
//! The calling convention follows standard save/restore semantics:
//! caller saves temporaries (t-registers), callee saves s-registers.
use std::sync::Arc;

use crate::arch::{Architecture, RegisterDef, RegisterGroup, RegisterType};

macro_rules! gpr {
    ($name:literal) => {
        RegisterDef::new($name, RegisterType::Uint64, RegisterGroup::General)
    };
}

macro_rules! fpr {
    ($name:literal) => {
        RegisterDef::new($name, RegisterType::Double, RegisterGroup::Float)
    };
}

const REGISTERS: &[RegisterDef] = &[
    // hardwired to 0; stores are dropped
    gpr!("x0").read_only(),
    gpr!("x1"), // (ra) return address
    RegisterDef::new("x2", RegisterType::DataPtr, RegisterGroup::General), // (sp)
    gpr!("x3"), // (gp) global pointer
    gpr!("x4"), // (tp) thread pointer
    gpr!("x5"),
    gpr!("x6"),
    gpr!("x7"),
    RegisterDef::new("x8", RegisterType::DataPtr, RegisterGroup::General), // (s0/fp)
    gpr!("x9"),
    gpr!("x10"), // (a0) function arguments / return values
    gpr!("x11"),
    gpr!("x12"),
    gpr!("x13"),
    gpr!("x14"),
    gpr!("x15"),
    gpr!("x16"),
    gpr!("x17"),
    gpr!("x18"),
    gpr!("x19"),
    gpr!("x20"),
    gpr!("x21"),
    gpr!("x22"),
    gpr!("x23"),
    gpr!("x24"),
    gpr!("x25"),
    gpr!("x26"),
    gpr!("x27"),
    gpr!("x28"),
    gpr!("x29"),
    gpr!("x30"),
    gpr!("x31"),
    RegisterDef::new("pc", RegisterType::CodePtr, RegisterGroup::General),
    fpr!("f0"),
    fpr!("f1"),
    fpr!("f2"),
    fpr!("f3"),
    fpr!("f4"),
    fpr!("f5"),
    fpr!("f6"),
    fpr!("f7"),
    fpr!("f8"),
    fpr!("f9"),
    fpr!("f10"),
    fpr!("f11"),
    fpr!("f12"),
    fpr!("f13"),
    fpr!("f14"),
    fpr!("f15"),
    fpr!("f16"),
    fpr!("f17"),
    fpr!("f18"),
    fpr!("f19"),
    fpr!("f20"),
    fpr!("f21"),
    fpr!("f22"),
    fpr!("f23"),
    fpr!("f24"),
    fpr!("f25"),
    fpr!("f26"),
    fpr!("f27"),
    fpr!("f28"),
    fpr!("f29"),
    fpr!("f30"),
    fpr!("f31"),
    RegisterDef::new("fcsr", RegisterType::Uint32, RegisterGroup::Float),
];

/// riscv64 has no pseudo registers; every number is a raw register.
pub fn architecture() -> Arc<Architecture> {
    Architecture::builder("riscv64")
        .raw_registers(REGISTERS.iter().copied())
        .pc("pc")
        .sp("x2")
        .build()
}
