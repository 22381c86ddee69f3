//! Selection of an [`Architecture`] variant by machine name and OS ABI.
use std::sync::Arc;

use strum::{Display, EnumString};
use tracing::debug;

use crate::arch::{Architecture, riscv64, x86_64};
use crate::error::{Error, Result};

/// Operating system ABI an architecture variant is specialised for.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, Hash, PartialEq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OsAbi {
    /// Not specialised for any OS.
    #[default]
    None,
    Linux,
    NetBsd,
    FreeBsd,
}

type Constructor = fn() -> Arc<Architecture>;

#[derive(Debug)]
struct Variant {
    machine: &'static str,
    osabi: Option<OsAbi>,
    build: Constructor,
}

/// Registered architecture variants.
///
/// Lookup prefers the most specific match: a variant registered for the
/// requested OS ABI beats a generic one. Among equally specific variants the
/// first registered wins.
#[derive(Debug, Default)]
pub struct ArchRegistry {
    variants: Vec<Variant>,
}

impl ArchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the architectures this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("x86_64", None, x86_64::architecture);
        registry.register("x86_64", Some(OsAbi::Linux), x86_64::linux_architecture);
        registry.register("riscv64", None, riscv64::architecture);
        registry
    }

    /// Add a variant. `osabi == None` registers a generic fallback.
    pub fn register(&mut self, machine: &'static str, osabi: Option<OsAbi>, build: Constructor) {
        self.variants.push(Variant {
            machine,
            osabi,
            build,
        });
    }

    pub fn lookup(&self, machine: &str, osabi: OsAbi) -> Result<Arc<Architecture>> {
        let mut best: Option<&Variant> = None;
        for variant in self.variants.iter().filter(|v| v.machine == machine) {
            match variant.osabi {
                Some(abi) if abi == osabi => {
                    best = Some(variant);
                    break;
                }
                Some(_) => {}
                None if best.is_none() => best = Some(variant),
                None => {}
            }
        }

        let variant = best.ok_or_else(|| Error::UnknownArchitecture(machine.to_string()))?;
        debug!(
            "selected architecture {} (osabi {:?}) for {machine}/{osabi}",
            variant.machine, variant.osabi
        );
        Ok((variant.build)())
    }

    /// The architecture matching the machine this debugger runs on.
    pub fn host(&self, osabi: OsAbi) -> Result<Arc<Architecture>> {
        self.lookup(std::env::consts::ARCH, osabi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_variant_wins() {
        let registry = ArchRegistry::with_builtin();

        let linux = registry.lookup("x86_64", OsAbi::Linux).unwrap();
        assert_eq!(linux.osabi(), OsAbi::Linux);

        let generic = registry.lookup("x86_64", OsAbi::NetBsd).unwrap();
        assert_eq!(generic.osabi(), OsAbi::None);

        let riscv = registry.lookup("riscv64", OsAbi::Linux).unwrap();
        assert_eq!(riscv.name(), "riscv64");
    }

    #[test]
    fn unknown_machine_is_an_error() {
        let registry = ArchRegistry::with_builtin();
        assert!(matches!(
            registry.lookup("vax", OsAbi::None),
            Err(Error::UnknownArchitecture(m)) if m == "vax"
        ));
    }

    #[test]
    fn osabi_parses_from_cli_text() {
        assert_eq!("Linux".parse::<OsAbi>().ok(), Some(OsAbi::Linux));
        assert_eq!(OsAbi::NetBsd.to_string(), "netbsd");
    }
}
