//! Brasa Kernel Library.
//!
//! Ponto central de exportação dos módulos do Kernel.
//! Este crate implementa o núcleo de concorrência do Brasa OS:
//! contexto de execução por CPU, mensageria entre processadores,
//! registro global de processos e roteamento de interrupções.

#![no_std]

// Habilitar alocação dinâmica (necessário para Vec/Box/Arc)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, ACPI, APIC)
pub mod drivers; // Drivers Específicos (Serial, PIC)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Entry, Logging, SMP, Processos, Power
pub mod klib; // Utilitários Internos
pub mod mm; // Heap do Kernel
pub mod sched; // Fronteira com o Scheduler
pub mod sync; // Primitivas de Sincronização
pub mod sys; // Definições de Sistema (Erros, Tipos)

// Re-exportar BootInfo para acesso fácil no binário
pub use crate::core::handoff::BootInfo;
