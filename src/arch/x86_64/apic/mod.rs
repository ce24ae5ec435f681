/// Arquivo: x86_64/apic/mod.rs
///
/// Propósito: Gerenciamento do Advanced Programmable Interrupt Controller.
/// O APIC roteia interrupções em sistemas x86 modernos (substituindo o PIC 8259).
/// Divide-se em:
/// - Local APIC (LAPIC): Um por core; interrupções locais, EOI e IPIs.
/// - I/O APIC: Global; roteia interrupções de hardware externo para os LAPICs.
///
/// Módulos contidos:
/// - `lapic`: Controlador Local (dentro da CPU).
/// - `ioapic`: Controlador de I/O (no chipset).

pub mod ioapic;
pub mod lapic;
