use std::fmt::Write;

use anyhow::{Result, anyhow};
use tracing::trace;

use crate::arch::{RegisterGroup, RegisterType};
use crate::process::Process;
use crate::regcache::RegisterCache;
use crate::regcache::dump::{DumpKind, dump};
use crate::value::display_register;

#[derive(Default)]
pub struct Debugger {
    /// Flag if the program is currently being debugged.
    debugging: bool,
    /// Last non-empty command, replayed on an empty line a la gdb.
    last_command: Option<String>,
}

impl Debugger {
    pub fn new() -> Debugger {
        Debugger::default()
    }

    pub fn next(&mut self, command: String, process: &mut Process) -> Result<DispatchResult> {
        let command = if command.trim().is_empty() {
            trace!("next editor command is empty line, will replay last command");
            match self.last_command.clone() {
                Some(last) => last,
                None => return Ok(DispatchResult::Normal),
            }
        } else {
            command
        };
        self.last_command = Some(command.clone());

        let cmd = Command::try_from(command)?;
        self.dispatch_command(cmd, process)
    }

    fn dispatch_command(
        &mut self,
        command: Command,
        process: &mut Process,
    ) -> Result<DispatchResult> {
        let mut res = DispatchResult::Normal;
        match command {
            Command::Run(args) => {
                let status = process.attach(args)?;
                println!("Started inferior, {status:?}");
                self.debugging = true;
            }
            Command::Continue => {
                process.resume()?;
                let status = process.wait_on_signal()?;
                println!("{status:?}");
            }
            Command::InfoRegisters(filter) => {
                print!("{}", info_registers(process.registers()?, filter.as_deref())?);
            }
            Command::InfoAllRegisters => {
                print!("{}", info_all_registers(process.registers()?)?);
            }
            Command::Print(name) => {
                println!("{}", print_register(process.registers()?, &name)?);
            }
            Command::Set(name, value) => {
                set_register(process.registers()?, &name, &value)?;
            }
            Command::Flush => {
                process.registers()?.invalidate_all();
                println!("Register cache flushed.");
            }
            Command::MaintPrint(kind) => {
                print!("{}", dump(process.registers()?, kind)?);
            }
            Command::Quit => {
                process.destroy()?;
                self.debugging = false;
                res = DispatchResult::Exit;
            }
        }

        Ok(res)
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging
    }
}

fn lookup(cache: &RegisterCache, name: &str) -> Result<usize> {
    cache
        .architecture()
        .regnum_by_name(name)
        .ok_or_else(|| anyhow!("Invalid register `{}'", name.trim_start_matches('$')))
}

fn register_line(out: &mut String, cache: &mut RegisterCache, regnum: usize) -> Result<()> {
    let name = cache.architecture().register_name(regnum);
    let value = display_register(cache, regnum)?;
    let _ = writeln!(out, "{name:<10} {value}");
    Ok(())
}

/// `info registers [group|name]`: the general registers by default.
pub fn info_registers(cache: &mut RegisterCache, filter: Option<&str>) -> Result<String> {
    let arch = cache.architecture().clone();
    let mut out = String::new();
    let group = match filter {
        None => RegisterGroup::General,
        Some(f) => match f.parse::<RegisterGroup>() {
            Ok(group) => group,
            Err(_) => {
                let regnum = lookup(cache, f)?;
                register_line(&mut out, cache, regnum)?;
                return Ok(out);
            }
        },
    };

    for (regnum, def) in arch.registers() {
        if def.group == group && regnum < arch.raw_count() {
            register_line(&mut out, cache, regnum)?;
        }
    }
    Ok(out)
}

/// `info all-registers`: every register number, pseudo registers included.
pub fn info_all_registers(cache: &mut RegisterCache) -> Result<String> {
    let mut out = String::new();
    for regnum in 0..cache.architecture().cooked_count() {
        register_line(&mut out, cache, regnum)?;
    }
    Ok(out)
}

/// `print $reg`
pub fn print_register(cache: &mut RegisterCache, name: &str) -> Result<String> {
    let regnum = lookup(cache, name)?;
    display_register(cache, regnum).map_err(Into::into)
}

fn parse_integer(value: &str) -> Result<u64> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => digits.parse::<u64>()?,
    };
    Ok(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

/// `set $reg value`
pub fn set_register(cache: &mut RegisterCache, name: &str, value: &str) -> Result<()> {
    let regnum = lookup(cache, name)?;
    let ty = cache.descriptor().register_type(regnum);
    let bits = match ty {
        RegisterType::Float => u64::from(value.parse::<f32>()?.to_bits()),
        RegisterType::Double => value.parse::<f64>()?.to_bits(),
        RegisterType::I387Ext | RegisterType::Vec64 | RegisterType::Vec128 | RegisterType::Void => {
            return Err(anyhow!("Cannot assign to a register of type {ty}"));
        }
        _ => parse_integer(value)?,
    };
    cache.cooked_write_unsigned(regnum, bits)?;
    Ok(())
}

#[derive(Clone, Debug)]
pub enum DispatchResult {
    Normal,
    Exit,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Start the inferior process.
    Run(Vec<String>),
    Continue,
    /// `info registers`, optionally narrowed to a group or one register.
    InfoRegisters(Option<String>),
    InfoAllRegisters,
    Print(String),
    Set(String, String),
    /// Drop everything the register cache holds.
    Flush,
    MaintPrint(DumpKind),
    /// Exit the debugger (and kill inferior process if it was launched).
    Quit,
}

impl TryFrom<String> for Command {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Command> {
        let mut words = value.split_whitespace();
        let cmd = words.next().unwrap_or("").to_lowercase();
        let args: Vec<String> = words.map(|s| s.to_string()).collect();

        let one_arg = |what: &str| -> Result<String> {
            match args.as_slice() {
                [arg] => Ok(arg.clone()),
                _ => Err(anyhow!("usage: {cmd} {what}")),
            }
        };

        let command = match cmd.as_str() {
            "run" | "r" => Command::Run(args.clone()),
            "continue" | "c" => Command::Continue,
            "info" | "i" => match args.first().map(String::as_str) {
                Some("registers" | "r") => Command::InfoRegisters(args.get(1).cloned()),
                Some("all-registers") => Command::InfoAllRegisters,
                _ => return Err(anyhow!("unknown info command: {:?}", value)),
            },
            "print" | "p" => Command::Print(one_arg("$register")?),
            "set" => {
                let rest: Vec<&str> = args.iter().map(String::as_str).filter(|a| *a != "=").collect();
                match rest.as_slice() {
                    [name, value] => {
                        Command::Set(name.to_string(), value.trim_start_matches('=').to_string())
                    }
                    [assignment] if assignment.contains('=') => {
                        let (name, value) = assignment.split_once('=').unwrap_or_default();
                        Command::Set(name.to_string(), value.to_string())
                    }
                    _ => return Err(anyhow!("usage: set $register = value")),
                }
            }
            "flush" => Command::Flush,
            "maint" | "maintenance" => match args.as_slice() {
                [print, what] if print == "print" && what == "raw-registers" => {
                    Command::MaintPrint(DumpKind::Raw)
                }
                [print, what] if print == "print" && what == "cooked-registers" => {
                    Command::MaintPrint(DumpKind::Cooked)
                }
                _ => return Err(anyhow!("unknown maintenance command: {:?}", value)),
            },
            "quit" | "q" => Command::Quit,
            _ => return Err(anyhow!("unknown command: {:?}", value)),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Command {
        Command::try_from(s.to_string()).unwrap()
    }

    #[test]
    fn parses_register_commands() {
        assert_eq!(parse("info registers"), Command::InfoRegisters(None));
        assert_eq!(
            parse("i r float"),
            Command::InfoRegisters(Some("float".to_string()))
        );
        assert_eq!(parse("info all-registers"), Command::InfoAllRegisters);
        assert_eq!(parse("p $rip"), Command::Print("$rip".to_string()));
        assert_eq!(
            parse("set $rax = 0x10"),
            Command::Set("$rax".to_string(), "0x10".to_string())
        );
        assert_eq!(
            parse("set $eax=-1"),
            Command::Set("$eax".to_string(), "-1".to_string())
        );
        assert_eq!(
            parse("maint print raw-registers"),
            Command::MaintPrint(DumpKind::Raw)
        );
        assert_eq!(parse("run a b"), Command::Run(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Command::try_from("print".to_string()).is_err());
        assert!(Command::try_from("info frobs".to_string()).is_err());
        assert!(Command::try_from("set $rax".to_string()).is_err());
        assert!(Command::try_from("explode".to_string()).is_err());
    }

    #[test]
    fn integer_values() {
        assert_eq!(parse_integer("0x10").unwrap(), 16);
        assert_eq!(parse_integer("42").unwrap(), 42);
        assert_eq!(parse_integer("-1").unwrap(), u64::MAX);
        assert!(parse_integer("zz").is_err());
    }
}
