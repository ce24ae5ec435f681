//! System Definitions (ABI).
//!
//! Contém as constantes e tipos que definem a interface entre o Kernel e o Mundo.

pub mod error;
pub mod types;

pub use error::Errno;
pub use types::{Pgid, Pid, Sid, Tid};
