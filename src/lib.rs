pub mod arch;
pub mod debugger;
pub mod error;
pub mod logging;
pub mod options;
pub mod process;
pub mod regcache;
pub mod target;
pub mod value;

pub use error::{Error, Result};
pub use regcache::{CacheOptions, RegisterCache};
