/// Arquivo: core/smp/ipi.rs
///
/// Propósito: Camada de sinalização entre processadores (IPIs).
/// A mensageria (`message.rs`) enfileira o trabalho; a IPI só ACORDA a
/// CPU alvo caso ela não esteja ativamente drenando a fila.
///
/// Detalhes de Implementação:
/// - Um único vetor para mensageria: o conteúdo vai na fila, não no
///   vetor. (Halt, TLB e callback são tipos de mensagem, não vetores.)
/// - O handler roda em contexto de interrupção: EOI + dreno.

use super::percpu;
use crate::arch::x86_64::apic::lapic;

/// Vetor da IPI de mensageria SMP.
pub const IPI_VECTOR_MESSAGE: u8 = 0xFB;
/// Vetor de spurious do LAPIC (reservado, nunca reutilizar).
pub const IPI_VECTOR_SPURIOUS: u8 = 0xFF;

/// Acorda uma CPU para drenar a fila de mensagens.
pub fn send_message_ipi(dest_apic_id: u32) {
    // SAFETY: vetor fixo do kernel, handler instalado no boot do core.
    unsafe {
        lapic::send_ipi(dest_apic_id, IPI_VECTOR_MESSAGE);
    }
}

/// Acorda todas as outras CPUs (shorthand all-but-self).
pub fn broadcast_message_ipi() {
    // SAFETY: idem `send_message_ipi`.
    unsafe {
        lapic::broadcast_ipi(IPI_VECTOR_MESSAGE);
    }
}

/// Handler do vetor de mensageria. A IDT (externa a este núcleo) roteia
/// IPI_VECTOR_MESSAGE para cá.
pub fn smp_ipi_handler() {
    let ctx = percpu::current();
    ctx.enter_irq();
    // SAFETY: estamos dentro de um handler de interrupção.
    unsafe {
        lapic::eoi();
    }
    // leave_irq drena a fila ao voltar à profundidade 0.
    ctx.leave_irq();
}
