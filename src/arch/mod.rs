//! Architecture descriptions: the register file layout a [`RegisterCache`]
//! is built over.
//!
//! An [`Architecture`] is the single source of truth for register names,
//! numbering and types. Raw registers come first (numbers `0..raw_count`),
//! pseudo registers follow them. The derived byte layout
//! ([`RegisterDescriptor`]) is computed once and shared by every cache.
use std::fmt;
use std::sync::{Arc, OnceLock};

use strum::{Display, EnumIter, EnumString};

use crate::error::Result;
use crate::regcache::RegisterCache;
use crate::regcache::descriptor::RegisterDescriptor;

pub mod pseudo;
pub mod registry;
pub mod riscv64;
pub mod x86_64;

pub use registry::{ArchRegistry, OsAbi};

/// Semantic value type of a register. Only its width matters to the cache;
/// printers use the rest.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum RegisterType {
    /// Zero-width placeholder, e.g. an unnamed hole in the numbering.
    #[strum(to_string = "void")]
    Void,
    #[strum(to_string = "int8")]
    Int8,
    #[strum(to_string = "int16")]
    Int16,
    #[strum(to_string = "int32")]
    Int32,
    #[strum(to_string = "int64")]
    Int64,
    #[strum(to_string = "uint8")]
    Uint8,
    #[strum(to_string = "uint16")]
    Uint16,
    #[strum(to_string = "uint32")]
    Uint32,
    #[strum(to_string = "uint64")]
    Uint64,
    /// 64-bit code address (program counter, return address).
    #[strum(to_string = "code_ptr")]
    CodePtr,
    /// 64-bit data address (stack and frame pointers).
    #[strum(to_string = "data_ptr")]
    DataPtr,
    #[strum(to_string = "float")]
    Float,
    #[strum(to_string = "double")]
    Double,
    /// x87 80-bit extended precision.
    #[strum(to_string = "i387_ext")]
    I387Ext,
    #[strum(to_string = "vec64")]
    Vec64,
    #[strum(to_string = "vec128")]
    Vec128,
}

impl RegisterType {
    /// Register width in bytes.
    pub const fn byte_width(&self) -> usize {
        match self {
            RegisterType::Void => 0,
            RegisterType::Int8 | RegisterType::Uint8 => 1,
            RegisterType::Int16 | RegisterType::Uint16 => 2,
            RegisterType::Int32 | RegisterType::Uint32 | RegisterType::Float => 4,
            RegisterType::Int64
            | RegisterType::Uint64
            | RegisterType::CodePtr
            | RegisterType::DataPtr
            | RegisterType::Double
            | RegisterType::Vec64 => 8,
            RegisterType::I387Ext => 10,
            RegisterType::Vec128 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Decode up to 8 bytes as an unsigned integer.
    pub fn read_unsigned(&self, bytes: &[u8]) -> u64 {
        assert!(bytes.len() <= 8, "cannot extract a {}-byte integer", bytes.len());
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        match self {
            ByteOrder::Little => bytes.iter().rev().fold(0, fold),
            ByteOrder::Big => bytes.iter().fold(0, fold),
        }
    }

    /// Decode up to 8 bytes as a sign-extended integer.
    pub fn read_signed(&self, bytes: &[u8]) -> i64 {
        let raw = self.read_unsigned(bytes);
        let bits = bytes.len() * 8;
        if bits == 0 || bits == 64 {
            return raw as i64;
        }
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }

    /// Encode `value` into `out`, truncating to `out.len()` bytes.
    pub fn write_unsigned(&self, out: &mut [u8], value: u64) {
        assert!(out.len() <= 8, "cannot store a {}-byte integer", out.len());
        let len = out.len();
        for (i, b) in out.iter_mut().enumerate() {
            let shift = match self {
                ByteOrder::Little => i * 8,
                ByteOrder::Big => (len - 1 - i) * 8,
            };
            *b = (value >> shift) as u8;
        }
    }
}

/// Broad grouping for registers, used for display and filtering.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, PartialEq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RegisterGroup {
    General,
    Float,
    Vector,
    System,
}

/// Static description of one register.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterDef {
    pub name: &'static str,
    pub ty: RegisterType,
    pub group: RegisterGroup,
    /// Hard-wired registers whose stores are silently dropped.
    pub read_only: bool,
}

impl RegisterDef {
    pub const fn new(name: &'static str, ty: RegisterType, group: RegisterGroup) -> Self {
        Self {
            name,
            ty,
            group,
            read_only: false,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Synthesizes pseudo registers out of raw registers.
///
/// Only ever invoked for `raw_count <= regnum < cooked_count`. Implementations
/// access raw state through the cache they are handed, never directly.
pub trait PseudoRegisterResolver: fmt::Debug {
    fn read(&self, cache: &mut RegisterCache, regnum: usize, buf: &mut [u8]) -> Result<()>;

    fn write(&self, cache: &mut RegisterCache, regnum: usize, buf: &[u8]) -> Result<()>;
}

/// Fully described register file for one architecture variant.
#[derive(Debug)]
pub struct Architecture {
    name: String,
    osabi: OsAbi,
    byte_order: ByteOrder,
    raw: Vec<RegisterDef>,
    pseudo: Vec<RegisterDef>,
    resolver: Option<Arc<dyn PseudoRegisterResolver>>,
    pc: Option<usize>,
    sp: Option<usize>,
    legacy_offsets: Option<Vec<usize>>,
    descriptor: OnceLock<RegisterDescriptor>,
}

impl Architecture {
    pub fn builder(name: impl Into<String>) -> ArchitectureBuilder {
        ArchitectureBuilder {
            name: name.into(),
            osabi: OsAbi::None,
            byte_order: ByteOrder::Little,
            raw: Vec::new(),
            pseudo: Vec::new(),
            resolver: None,
            pc: None,
            sp: None,
            legacy_offsets: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn osabi(&self) -> OsAbi {
        self.osabi
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn raw_count(&self) -> usize {
        self.raw.len()
    }

    pub fn cooked_count(&self) -> usize {
        self.raw.len() + self.pseudo.len()
    }

    /// Definition of raw or pseudo register `regnum`.
    pub fn register(&self, regnum: usize) -> &RegisterDef {
        assert!(
            regnum < self.cooked_count(),
            "register number {regnum} out of range for {}",
            self.name
        );
        if regnum < self.raw.len() {
            &self.raw[regnum]
        } else {
            &self.pseudo[regnum - self.raw.len()]
        }
    }

    pub fn register_name(&self, regnum: usize) -> &'static str {
        self.register(regnum).name
    }

    /// Every register, raw then pseudo, paired with its number.
    pub fn registers(&self) -> impl Iterator<Item = (usize, &RegisterDef)> {
        self.raw.iter().chain(self.pseudo.iter()).enumerate()
    }

    /// Map a user-facing name (`rax`, `$rax`) to its register number.
    pub fn regnum_by_name(&self, name: &str) -> Option<usize> {
        let name = name.strip_prefix('$').unwrap_or(name);
        match name {
            "pc" if self.pc.is_some() => self.pc,
            "sp" if self.sp.is_some() => self.sp,
            _ => self.registers().find(|(_, r)| r.name == name).map(|(i, _)| i),
        }
    }

    pub fn pc_regnum(&self) -> Option<usize> {
        self.pc
    }

    pub fn resolver(&self) -> Option<&Arc<dyn PseudoRegisterResolver>> {
        self.resolver.as_ref()
    }

    pub fn is_read_only(&self, regnum: usize) -> bool {
        self.register(regnum).read_only
    }

    /// Byte layout of the register file, built on first use.
    pub fn descriptor(&self) -> &RegisterDescriptor {
        self.descriptor.get_or_init(|| {
            let type_of = |i: usize| self.register(i).ty;
            match &self.legacy_offsets {
                Some(offsets) => RegisterDescriptor::build_legacy(
                    self.raw_count(),
                    self.pseudo.len(),
                    type_of,
                    |i| offsets[i],
                ),
                None => RegisterDescriptor::build(self.raw_count(), self.pseudo.len(), type_of),
            }
        })
    }
}

#[derive(Debug)]
pub struct ArchitectureBuilder {
    name: String,
    osabi: OsAbi,
    byte_order: ByteOrder,
    raw: Vec<RegisterDef>,
    pseudo: Vec<RegisterDef>,
    resolver: Option<Arc<dyn PseudoRegisterResolver>>,
    pc: Option<&'static str>,
    sp: Option<&'static str>,
    legacy_offsets: Option<Vec<usize>>,
}

impl ArchitectureBuilder {
    pub fn osabi(mut self, osabi: OsAbi) -> Self {
        self.osabi = osabi;
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn raw_registers(mut self, registers: impl IntoIterator<Item = RegisterDef>) -> Self {
        self.raw.extend(registers);
        self
    }

    pub fn pseudo_registers(
        mut self,
        registers: impl IntoIterator<Item = RegisterDef>,
        resolver: Arc<dyn PseudoRegisterResolver>,
    ) -> Self {
        self.pseudo.extend(registers);
        self.resolver = Some(resolver);
        self
    }

    pub fn pc(mut self, name: &'static str) -> Self {
        self.pc = Some(name);
        self
    }

    pub fn sp(mut self, name: &'static str) -> Self {
        self.sp = Some(name);
        self
    }

    /// Deprecated layout mode: raw registers live at the given (possibly
    /// overlapping) byte offsets instead of being packed in order.
    pub fn legacy_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.legacy_offsets = Some(offsets);
        self
    }

    pub fn build(self) -> Arc<Architecture> {
        if let Some(offsets) = &self.legacy_offsets {
            assert_eq!(
                offsets.len(),
                self.raw.len(),
                "legacy offsets must cover every raw register"
            );
        }

        let lookup = |name: &'static str| -> usize {
            self.raw
                .iter()
                .chain(self.pseudo.iter())
                .position(|r| r.name == name)
                .unwrap_or_else(|| panic!("unknown register {name} in {}", self.name))
        };
        let pc = self.pc.map(lookup);
        let sp = self.sp.map(lookup);

        Arc::new(Architecture {
            name: self.name,
            osabi: self.osabi,
            byte_order: self.byte_order,
            raw: self.raw,
            pseudo: self.pseudo,
            resolver: self.resolver,
            pc,
            sp,
            legacy_offsets: self.legacy_offsets,
            descriptor: OnceLock::new(),
        })
    }
}
