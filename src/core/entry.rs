//! Entry Point Lógico do Kernel.
//!
//! `kernel_main` é o primeiro código Rust de alto nível após o `_start`.
//!
//! # Responsabilidades
//! 1. **Validação**: o Bootloader passou informações coerentes?
//! 2. **Orquestração**: subsistemas na ordem estrita de dependência
//!    (Serial -> Heap -> PerCPU -> Mensageria -> Interrupções -> Processos).
//! 3. **Transição**: entrega o controle ao loop ocioso (o scheduler
//!    externo assume a partir dos hooks).

use crate::arch::traits::CpuOps;
use crate::arch::x86_64::acpi::madt::Madt;
use crate::arch::Cpu;
use crate::core::handoff::{BootInfo, BOOT_MAGIC};
use crate::core::process::{registry, Process, ProcessKind};
use crate::core::smp::{message, percpu, topology};
use crate::sys::Pid;

/// Função principal do Kernel (High-Level).
///
/// Chamada pelo `_start` com a stack já configurada. Não retorna.
pub fn kernel_main(boot_info: &'static BootInfo) -> ! {
    // 1. Sanity Check
    // Se a magia falhar, não podemos confiar em nada. Nem em logar.
    if boot_info.magic != BOOT_MAGIC {
        Cpu::hang();
    }

    crate::drivers::serial::init();
    crate::kinfo!("Brasa OS Kernel - Iniciando");
    crate::kinfo!("Protocolo de Boot v=", boot_info.version as u64);

    // 2. Heap (habilita Vec/Arc/Box)
    crate::mm::init();

    // 3. Contexto per-CPU do BSP + arena de mensagens
    percpu::register_current(0);
    message::init_pool();

    // 4. Firmware: MADT -> topologia + registro de interrupções.
    //    Tabela ausente/corrompida degrada em silêncio para PIC legacy.
    let madt = unsafe { Madt::from_addr(boot_info.madt_addr) };
    match madt.as_ref() {
        Some(madt) => topology::populate_from_madt(madt),
        None => topology::register_bsp_only(),
    }
    unsafe {
        crate::arch::x86_64::interrupts::init(madt.as_ref());
    }

    // 5. Processos fundadores: o processo de kernel (este contexto) e o
    //    finalizador, responsável por colher processos mortos.
    let kernel_process = Process::new(
        registry::allocate_pid(),
        Pid::KERNEL,
        ProcessKind::Kernel,
        "kernel",
        None,
    );
    registry::register_new(kernel_process.clone());

    let finalizer = Process::new(
        registry::allocate_pid(),
        kernel_process.pid(),
        ProcessKind::Kernel,
        "finalizador",
        None,
    );
    registry::set_finalizer(finalizer.pid());
    registry::register_new(finalizer);

    crate::kinfo!("(BOOT) Nucleo pronto, processos=", registry::process_count() as u64);

    // 6. Self tests (feature self_test)
    #[cfg(feature = "self_test")]
    run_self_tests();

    // 7. Loop ocioso: drena mensagens e dorme até a próxima interrupção.
    idle_loop();
}

/// Entry dos Application Processors (APs).
///
/// O trampolim de bringup (externo a este núcleo) chega aqui com stack
/// própria. Cada AP registra seu contexto e entra no loop ocioso; o
/// scheduler assume via IPI de mensageria.
pub fn ap_main(logical_id: u32) -> ! {
    let ctx = percpu::register_current(logical_id);
    unsafe {
        crate::arch::x86_64::apic::lapic::init();
    }
    crate::kinfo!("(BOOT) AP online, id=", ctx.id() as u64);
    idle_loop();
}

fn idle_loop() -> ! {
    let ctx = percpu::current();
    loop {
        ctx.smp_process_pending_messages();
        Cpu::halt();
    }
}

#[cfg(feature = "self_test")]
fn run_self_tests() {
    crate::kinfo!("(TEST) Rodando self tests do nucleo");
    crate::arch::test::run_interrupt_tests();
    crate::core::smp::test::run_smp_tests();
    crate::core::process::test::run_process_tests();
}
