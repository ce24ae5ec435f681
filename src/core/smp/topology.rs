/// Arquivo: core/smp/topology.rs
///
/// Propósito: Topologia de processadores do sistema.
/// Registro de todos os CPUs detectados (via MADT), seus IDs (APIC ID,
/// ACPI ID) e status. Fundamental para dimensionar broadcast e bringup.

use crate::arch::traits::CpuOps;
use crate::arch::x86_64::acpi::madt::{Madt, MadtEntry};
use crate::arch::Cpu;
use crate::sync::Spinlock;
use alloc::vec::Vec;

/// Identificador lógico de CPU (0 a N-1)
pub type CpuId = u32;

/// Informações sobre uma CPU detectada
#[derive(Debug, Clone, Copy)]
pub struct CpuInfo {
    /// ID lógico atribuído pelo kernel (índice no vetor)
    pub logical_id: CpuId,

    /// ID de Hardware (APIC ID)
    pub hw_id: u32,

    /// ID do Processador na ACPI
    pub acpi_id: u32,

    /// Indica se é o Bootstrap Processor (BSP)
    pub is_bsp: bool,

    /// Indica se a CPU está online e rodando
    pub online: bool,
}

pub struct CpuTopology {
    cpus: Vec<CpuInfo>,
    bsp_id: Option<CpuId>,
}

impl CpuTopology {
    pub const fn new() -> Self {
        Self {
            cpus: Vec::new(),
            bsp_id: None,
        }
    }

    /// Registra uma nova CPU descoberta
    pub fn register_cpu(&mut self, hw_id: u32, acpi_id: u32, is_bsp: bool) -> CpuId {
        let logical_id = self.cpus.len() as u32;

        let info = CpuInfo {
            logical_id,
            hw_id,
            acpi_id,
            is_bsp,
            online: is_bsp, // BSP já começa online
        };

        if is_bsp {
            self.bsp_id = Some(logical_id);
        }

        self.cpus.push(info);
        logical_id
    }

    /// Retorna o número total de CPUs detectadas
    pub fn count(&self) -> usize {
        self.cpus.len()
    }

    pub fn bsp_id(&self) -> Option<CpuId> {
        self.bsp_id
    }

    /// Itera sobre as CPUs
    pub fn iter(&self) -> core::slice::Iter<'_, CpuInfo> {
        self.cpus.iter()
    }
}

// Topologia global. Vec exige heap: popular só depois de mm::heap::init.
pub static TOPOLOGY: Spinlock<CpuTopology> = Spinlock::new(CpuTopology::new());

/// Popula a topologia a partir da MADT (registros tipo 0 habilitados).
///
/// Sem MADT o chamador registra apenas o BSP (máquina single-core ou
/// emulada mínima).
pub fn populate_from_madt(madt: &Madt) {
    let boot_apic_id = Cpu::current_id().0;
    let mut topology = TOPOLOGY.lock();

    for entry in madt.entries() {
        if let MadtEntry::LocalApic(lapic) = entry {
            if !lapic.is_enabled() {
                continue;
            }
            let hw_id = lapic.apic_id as u32;
            topology.register_cpu(hw_id, lapic.acpi_processor_id as u32, hw_id == boot_apic_id);
        }
    }

    crate::kinfo!("(SMP) CPUs na MADT=", topology.count() as u64);
}

/// Registra somente o BSP (fallback sem firmware).
pub fn register_bsp_only() {
    let mut topology = TOPOLOGY.lock();
    let hw_id = Cpu::current_id().0;
    topology.register_cpu(hw_id, 0, true);
    crate::kinfo!("(SMP) Topologia minima: apenas BSP");
}
