//! Panic Handler e Erro Fatal de Kernel.
//!
//! Um kernel não tem supervisor externo: violação de invariante não é
//! recuperável. O caminho fatal é um só:
//! 1. Desabilita interrupções (evita loop de panics).
//! 2. Loga na Serial (para o desenvolvedor).
//! 3. Melhor esforço: manda Halt para as outras CPUs.
//! 4. Trava a CPU (hlt loop).

use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

/// Evita recursão se o próprio caminho de pânico falhar.
static IN_PANIC: AtomicBool = AtomicBool::new(false);

/// Erro fatal de kernel: violação de contrato/invariante.
///
/// Distinto de `Errno`: não existe valor de retorno para "o kernel está
/// inconsistente". Continuar arriscaria corrupção silenciosa entre CPUs.
pub fn fatal(msg: &str) -> ! {
    Cpu::disable_interrupts();

    if !IN_PANIC.swap(true, Ordering::SeqCst) {
        crate::kerror!("============ ERRO FATAL DE KERNEL ============");
        crate::kerror!(msg);
        crate::kerror!("==============================================");

        // Parar as outras CPUs antes de travar esta.
        crate::core::smp::message::broadcast_halt_best_effort();
    }

    Cpu::hang();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    Cpu::disable_interrupts();

    if !IN_PANIC.swap(true, Ordering::SeqCst) {
        crate::kerror!("=============== KERNEL PANIC =================");
        if let Some(location) = info.location() {
            crate::kerror!(location.file());
            crate::kerror!("  linha=", location.line() as u64);
        }
        crate::kerror!("==============================================");

        crate::core::smp::message::broadcast_halt_best_effort();
    }

    Cpu::hang();
}
