//! Core Module
//!
//! Contém a lógica central do kernel: entry point, logging, pânico,
//! contexto por CPU + mensageria SMP, registro de processos e estados
//! de energia.

pub mod entry;
pub mod handoff;
pub mod logging;
pub mod panic;
pub mod power;
pub mod process;
pub mod smp;
