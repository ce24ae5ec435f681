//! Interface Abstrata de CPU (HAL).
//! Define as operações que qualquer arquitetura (x86, ARM, RISC-V) deve implementar.

/// ID físico do núcleo atual (APIC ID em x86, Hart ID em RISC-V).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct CoreId(pub u32);

pub trait CpuOps {
    /// Retorna o ID de hardware do núcleo atual.
    fn current_id() -> CoreId;

    /// Verifica se este é o Bootstrap Processor (BSP).
    fn is_bsp() -> bool;

    /// Para a execução da CPU até a próxima interrupção (instrução HLT).
    /// Economiza energia em loops ociosos.
    fn halt();

    /// Dica para a CPU que estamos em um spinloop (PAUSE).
    fn relax();

    /// Barreira de memória completa.
    fn memory_fence();

    /// Desabilita interrupções globalmente (CLI).
    /// Crítico para seções atômicas no kernel.
    fn disable_interrupts();

    /// Habilita interrupções globalmente (STI).
    fn enable_interrupts();

    /// Verifica se as interrupções estão habilitadas.
    fn are_interrupts_enabled() -> bool;

    /// Lê a base do armazenamento local da CPU (GS em x86_64).
    /// Zero significa "não instalado".
    fn cpu_local_base() -> usize;

    /// Instala a base do armazenamento local da CPU atual.
    ///
    /// # Safety
    /// O ponteiro deve referenciar o contexto per-CPU desta CPU e
    /// permanecer válido pela vida do boot.
    unsafe fn set_cpu_local_base(base: usize);

    /// Entra em loop infinito de halt com interrupções desabilitadas.
    /// Usado em pânicos irrecuperáveis.
    fn hang() -> ! {
        Self::disable_interrupts();
        loop {
            Self::halt();
        }
    }
}
