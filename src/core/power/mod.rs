/// Arquivo: core/power/mod.rs
///
/// Propósito: Estados de Energia do Sistema (ACPI G/S-States) e a
/// transição controlada para Soft Off, consumidora do protocolo de
/// shutdown do registro de processos.

use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use crate::core::process::{registry, Process};
use crate::core::smp::message;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU8, Ordering};

/// Estados Globais de Energia (ACPI)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerState {
    /// G0 (S0): Working - Sistema totalmente operacional.
    Working = 0,

    /// G1 (S3): Suspend-to-RAM - Contexto salvo na RAM.
    SuspendToRam = 3,

    /// G2 (S5): Soft Off - Desligado via software, fonte energizada.
    SoftOff = 5,
}

impl From<u8> for PowerState {
    fn from(val: u8) -> Self {
        match val {
            3 => PowerState::SuspendToRam,
            5 => PowerState::SoftOff,
            _ => PowerState::Working, // Default seguro
        }
    }
}

// Estado atual do sistema.
static CURRENT_STATE: AtomicU8 = AtomicU8::new(PowerState::Working as u8);

/// Retorna o estado atual de energia.
pub fn current_state() -> PowerState {
    PowerState::from(CURRENT_STATE.load(Ordering::Relaxed))
}

/// Define o estado atual (uso interno pelo gerenciador de power).
pub(crate) fn set_state(state: PowerState) {
    CURRENT_STATE.store(state as u8, Ordering::Relaxed);
}

/// Transição controlada para Soft Off (S5).
///
/// 1. Encerra todo o userspace (não retorna até convergir).
/// 2. Para as outras CPUs (Halt via mensageria, melhor esforço).
/// 3. Trava a CPU atual. O corte de energia real é do firmware.
pub fn transition_to_soft_off(caller: &Arc<Process>) -> ! {
    crate::kinfo!("(PWR) Iniciando transicao para Soft Off");

    registry::shutdown_all_user_processes(caller);

    message::broadcast_halt_best_effort();
    set_state(PowerState::SoftOff);

    crate::kinfo!("(PWR) Sistema parado. Pode desligar.");
    Cpu::hang();
}
