//! # Synchronization Primitives
//!
//! Primitivas de sincronização para ambiente SMP.
//!
//! ## Regras
//!
//! - **Spinlock**: seções críticas MUITO curtas; seguro dentro de IRQ
//!   handlers porque desabilita interrupções enquanto segura o lock.
//! - **Ordem de Lock**: sempre adquirir na mesma ordem para evitar
//!   deadlock. No registro de processos: tabela global antes de jail.

pub mod spinlock;

pub use spinlock::{Spinlock, SpinlockGuard};
