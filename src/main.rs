use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use regcache::{
    arch::ArchRegistry,
    debugger::{Debugger, DispatchResult},
    logging::setup_logging,
    options::Options,
    process::Process,
};
use tracing::info;

fn main() -> Result<()> {
    let options = Options::parse();
    let _log_guard = setup_logging(options.log_file.as_deref(), options.log_level)?;

    let arch = ArchRegistry::with_builtin().host(options.osabi)?;
    info!("using register layout {}", arch.name());

    let mut debugger = Debugger::new();
    let mut process = Process::new(options, arch);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("(regcache) ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            // EOF behaves like `quit`
            process.destroy()?;
            break;
        };

        match debugger.next(line?, &mut process) {
            Ok(DispatchResult::Normal) => {}
            Ok(DispatchResult::Exit) => break,
            Err(e) => println!("Error: {:?}", e),
        }
    }

    Ok(())
}
