use anyhow::{Result, anyhow};
use nix::sys::ptrace;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork};
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::arch::Architecture;
use crate::options::Options;
use crate::regcache::{CacheOptions, RegisterCache};
use crate::target::TargetRef;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessState {
    /// Debugger hasn't launched the inferior process, so we don't
    /// know what it's state is yet.
    Unknown,
    /// The inferior process is stopped, awaiting a nudge from debugger.
    Stopped,
    Running,
    /// The inferior process exited normally.
    Exited,
    /// The inferior process was killed by a signal.
    Terminated,
}

/// The primary struct containing information about the process being debugged.
pub struct Process {
    cli_options: Options,
    arch: Arc<Architecture>,
    /// State of the inferior process.
    state: ProcessState,
    pid: Option<Pid>,
    /// The one live register cache for the inferior. Created at the first
    /// stop and invalidated every time the inferior runs.
    regcache: Option<RegisterCache>,
}

impl Process {
    pub fn new(cli_options: Options, arch: Arc<Architecture>) -> Self {
        Process {
            cli_options,
            arch,
            state: ProcessState::Unknown,
            pid: None,
            regcache: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn architecture(&self) -> &Arc<Architecture> {
        &self.arch
    }

    /// Spawn the configured executable under ptrace and wait for its first stop.
    pub fn attach(&mut self, args: Vec<String>) -> Result<WaitStatus> {
        if matches!(self.state, ProcessState::Stopped | ProcessState::Running) {
            return Err(anyhow!("Inferior process is already being debugged"));
        }

        let args = if args.is_empty() {
            self.cli_options.args.clone()
        } else {
            args
        };
        trace!(
            "Spawning inferior process {:?} {:?}",
            self.cli_options.executable, args
        );
        let pid = launch_executable(self.cli_options.executable.as_path(), args)?;

        self.pid = Some(pid);
        self.regcache = None;
        self.state = ProcessState::Running;
        self.wait_on_signal()
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn expect_pid(&self) -> Pid {
        self.pid().expect("Should have PID at this point")
    }

    pub fn resume(&mut self) -> Result<()> {
        if !matches!(self.state, ProcessState::Stopped) {
            return Err(anyhow!("Inferior process not stopped"));
        }

        // registers changed: nothing cached survives the inferior running
        if let Some(cache) = self.regcache.as_mut() {
            cache.invalidate_all();
        }

        let pid = self.expect_pid();
        ptrace::cont(pid, None)?;
        self.state = ProcessState::Running;

        Ok(())
    }

    pub fn wait_on_signal(&mut self) -> Result<WaitStatus> {
        let wait_status = waitpid(self.expect_pid(), None)?;

        match wait_status {
            WaitStatus::Exited(_, _) => self.state = ProcessState::Exited,
            WaitStatus::Signaled(_, _, _) => self.state = ProcessState::Terminated,
            WaitStatus::Stopped(_, _) => self.state = ProcessState::Stopped,
            _ => {}
        };
        debug!("inferior {:?} -> {:?}", wait_status, self.state);

        match self.state {
            ProcessState::Stopped if self.regcache.is_none() => {
                let target = live_target(self.expect_pid(), &self.arch)?;
                self.regcache = Some(RegisterCache::new(
                    self.arch.clone(),
                    target,
                    self.cache_options(),
                ));
            }
            ProcessState::Exited | ProcessState::Terminated => self.regcache = None,
            _ => {}
        }

        Ok(wait_status)
    }

    fn cache_options(&self) -> CacheOptions {
        self.cli_options.cache_options()
    }

    /// The live register cache; only available while the inferior is stopped.
    pub fn registers(&mut self) -> Result<&mut RegisterCache> {
        if self.state != ProcessState::Stopped {
            return Err(anyhow!("Inferior process is not stopped"));
        }
        self.regcache
            .as_mut()
            .ok_or_else(|| anyhow!("No register cache for the inferior"))
    }

    pub fn destroy(&mut self) -> Result<()> {
        if !matches!(self.state, ProcessState::Stopped | ProcessState::Running) {
            return Ok(());
        }

        let pid = self.expect_pid();
        self.regcache = None;

        if self.state == ProcessState::Running {
            // tell the inferior to STOP and wait for it
            kill(pid, Some(Signal::SIGSTOP))?;
            waitpid(pid, None)?;
        }

        // let the inferior know we are done tracing it
        ptrace::detach(pid, None)?;
        kill(pid, Some(Signal::SIGCONT))?;

        // we launched the inferior process, so we should reap it here
        kill(pid, Some(Signal::SIGKILL))?;
        self.wait_on_signal()?;

        Ok(())
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu"))]
fn live_target(pid: Pid, arch: &Architecture) -> Result<TargetRef> {
    use crate::target::ptrace::PtraceTarget;
    use std::cell::RefCell;
    use std::rc::Rc;

    Ok(Rc::new(RefCell::new(PtraceTarget::new(pid, arch))))
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu")))]
fn live_target(_pid: Pid, arch: &Architecture) -> Result<TargetRef> {
    Err(anyhow!(
        "live register access for {} is not supported on this host",
        arch.name()
    ))
}

fn launch_executable(name: &Path, args: Vec<String>) -> Result<Pid> {
    let filename = CString::new(name.as_os_str().as_bytes())?;

    // Build argv as &[&CStr] while retaining owned CString storage.
    let mut cstr_storage = Vec::with_capacity(args.len() + 1);
    cstr_storage.push(filename.clone());
    for arg in args {
        cstr_storage.push(CString::new(arg)?);
    }

    match unsafe { fork()? } {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            if let Err(e) = ptrace::traceme() {
                error!("PTRACE_TRACEME failed: {e}");
                std::process::exit(127);
            }

            let cstr_args: Vec<&CStr> = cstr_storage.iter().map(|s| s.as_c_str()).collect();
            let e = execvp(filename.as_c_str(), &cstr_args);
            error!("exec of {:?} failed: {e:?}", name);
            std::process::exit(127);
        }
    }
}
