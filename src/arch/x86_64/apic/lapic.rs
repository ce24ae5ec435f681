/// Arquivo: x86_64/apic/lapic.rs
///
/// Propósito: Driver para o Local APIC (LAPIC).
/// Cada core da CPU possui seu próprio LAPIC.
/// Funções principais:
/// - Receber interrupções do I/O APIC.
/// - Gerar IPIs (Inter-Processor Interrupts) para os outros cores.
/// - Enviar sinal de End of Interrupt (EOI).
///
/// Detalhes de Implementação:
/// - MSR `IA32_APIC_BASE` habilita globalmente.
/// - MMIO (padrão 0xFEE00000) para os registradores de controle.
/// - IPIs saem pelo par ICR_HIGH/ICR_LOW; o envio espera o bit de
///   Delivery Status baixar.

use crate::arch::x86_64::cpu::Cpu;
use core::ptr::NonNull;
use volatile::VolatilePtr;

// --- Registradores e Constantes ---
const IA32_APIC_BASE_MSR: u32 = 0x1B;
/// Endereço físico padrão (assumido identity-mapped)
const LAPIC_BASE_ADDR: u64 = 0xFEE0_0000;

// Offsets MMIO
const REG_ID: usize = 0x020;
const REG_EOI: usize = 0x0B0;
const REG_SVR: usize = 0x0F0; // Spurious Interrupt Vector
const REG_ESR: usize = 0x280; // Error Status Register
const REG_ICR_LOW: usize = 0x300; // Interrupt Command Register (baixo)
const REG_ICR_HIGH: usize = 0x310; // Interrupt Command Register (alto)
const REG_LVT_TIMER: usize = 0x320;

// Bits e Flags
const APIC_ENABLE_BIT: u64 = 1 << 11; // MSR Enable
const SVR_SOFT_ENABLE: u32 = 1 << 8; // Software Enable no registro SVR
const ICR_ASSERT: u32 = 1 << 14;
const ICR_DELIVERY_PENDING: u32 = 1 << 12;
/// Shorthand 11b: todos os cores exceto o emissor
const ICR_DEST_ALL_BUT_SELF: u32 = 0b11 << 18;

// --- Helpers de Acesso MMIO (Privados) ---

#[inline]
unsafe fn reg(offset: usize) -> VolatilePtr<'static, u32> {
    let ptr = NonNull::new_unchecked((LAPIC_BASE_ADDR as *mut u32).add(offset / 4));
    VolatilePtr::new(ptr)
}

#[inline]
unsafe fn read(offset: usize) -> u32 {
    reg(offset).read()
}

#[inline]
unsafe fn write(offset: usize, value: u32) {
    reg(offset).write(value);
}

/// Inicializa o Local APIC do core atual.
///
/// # Safety
///
/// - Ring 0, endereço 0xFEE00000 mapeado.
/// - Chamar uma vez por core, pelo próprio core.
pub unsafe fn init() {
    // 1. Habilitar LAPIC globalmente via MSR
    let msr_info = Cpu::read_msr(IA32_APIC_BASE_MSR);
    if (msr_info & APIC_ENABLE_BIT) == 0 {
        Cpu::write_msr(IA32_APIC_BASE_MSR, msr_info | APIC_ENABLE_BIT);
    }

    // 2. Spurious Interrupt Vector 0xFF + Software Enable (bit 8)
    write(REG_SVR, SVR_SOFT_ENABLE | 0xFF);

    // 3. Mascarar LVT Timer (bit 16) até o timer ser configurado
    write(REG_LVT_TIMER, 1 << 16);

    // 4. Limpar Error Status Register (2x para hardware antigo)
    write(REG_ESR, 0);
    write(REG_ESR, 0);

    // 5. EOI para limpar estado pendente anterior
    write(REG_EOI, 0);

    crate::kdebug!("(LAPIC) Habilitado, id=", id() as u64);
}

/// Envia o sinal de End of Interrupt (EOI).
///
/// Chamar ao final de todo handler de interrupção externa (exceto NMI).
#[inline]
pub unsafe fn eoi() {
    write(REG_EOI, 0);
}

/// Lê o ID do LAPIC atual (bits 24-31 do registrador ID).
#[inline]
pub fn id() -> u32 {
    unsafe { read(REG_ID) >> 24 }
}

/// Espera o envio anterior do ICR concluir.
unsafe fn wait_icr_idle() {
    while (read(REG_ICR_LOW) & ICR_DELIVERY_PENDING) != 0 {
        core::hint::spin_loop();
    }
}

/// Envia uma IPI (delivery Fixed) para o LAPIC de destino.
///
/// # Safety
/// O vetor deve ter handler instalado na IDT da CPU alvo.
pub unsafe fn send_ipi(dest_apic_id: u32, vector: u8) {
    wait_icr_idle();
    write(REG_ICR_HIGH, dest_apic_id << 24);
    write(REG_ICR_LOW, vector as u32 | ICR_ASSERT);
    wait_icr_idle();
}

/// Envia uma IPI para TODOS os cores exceto o atual (shorthand 11b).
///
/// # Safety
/// Idem `send_ipi`.
pub unsafe fn broadcast_ipi(vector: u8) {
    wait_icr_idle();
    write(REG_ICR_LOW, vector as u32 | ICR_ASSERT | ICR_DEST_ALL_BUT_SELF);
    wait_icr_idle();
}
