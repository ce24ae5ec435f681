/// Arquivo: x86_64/apic/ioapic.rs
///
/// Propósito: Driver para o I/O APIC.
/// Roteia interrupções de hardware (teclado, disco, rede) para um ou mais
/// LAPICs (cores). Substitui o PIC Master/Slave quando presente.
///
/// Detalhes de Implementação:
/// - Dois registradores mapeados em memória: IOREGSEL (Select) e IOWIN
///   (Window); todo acesso interno é indireto por esse par.
/// - Endereço base e GSI base vêm da MADT (um registro tipo 1 por chip).
/// - Cada linha tem uma Redirection Entry de 64 bits (2 registradores).

use core::ptr::NonNull;
use volatile::VolatilePtr;

// Offsets de Registradores (Memória)
const REG_IOREGSEL: usize = 0x00; // Selector Register
const REG_IOWIN: usize = 0x10; // Window Register

// Índices de Registradores Internos (Acessados via Select/Window)
const IDX_VER: u32 = 0x01;
const IDX_REDTBL_BASE: u32 = 0x10; // Redirection Tables (2 regs por entrada)

const REDTBL_MASKED: u32 = 1 << 16;

/// Um chip I/O APIC descoberto na MADT.
#[derive(Debug)]
pub struct IoApic {
    base: u64,
    gsi_base: u32,
    entry_count: u32,
}

impl IoApic {
    /// Cria o driver para um chip em `base`, atendendo GSIs a partir de
    /// `gsi_base`, e mascara todas as linhas.
    ///
    /// # Safety
    /// `base` deve ser o registro MMIO de um IOAPIC real, mapeado.
    pub unsafe fn new(base: u64, gsi_base: u32) -> IoApic {
        // Bits 16-23 da versão: índice da última entrada
        let ver = Self::read_raw(base, IDX_VER);
        let entry_count = ((ver >> 16) & 0xFF) + 1;

        // Self-test de bring-up: versão implausível indica janela de
        // registradores suspeita. Loga e segue - o chip pode continuar
        // utilizável, e interrupção precisa subir de qualquer jeito.
        if ver == 0 || ver == 0xFFFF_FFFF {
            crate::kwarn!("(IOAPIC) Versao implausivel=", ver as u64);
        }

        let ioapic = IoApic {
            base,
            gsi_base,
            entry_count,
        };

        // Mascarar todas as entradas até algum driver pedir a linha
        for i in 0..entry_count {
            ioapic.write(IDX_REDTBL_BASE + 2 * i, REDTBL_MASKED);
            ioapic.write(IDX_REDTBL_BASE + 2 * i + 1, 0);
        }

        crate::kdebug!("(IOAPIC) Inicializado, gsi_base=", gsi_base as u64);
        ioapic
    }

    /// Primeira GSI atendida por este chip.
    pub fn gsi_base(&self) -> u32 {
        self.gsi_base
    }

    /// Quantidade de linhas de redirecionamento.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Este chip atende a GSI dada?
    pub fn handles_gsi(&self, gsi: u32) -> bool {
        gsi >= self.gsi_base && gsi < self.gsi_base + self.entry_count
    }

    /// Programa uma linha: vetor de destino, LAPIC alvo, polaridade e trigger.
    ///
    /// A linha nasce mascarada; `set_masked(gsi, false)` habilita.
    ///
    /// # Safety
    /// O vetor deve ter handler instalado na IDT da CPU alvo.
    pub unsafe fn redirect(
        &self,
        gsi: u32,
        vector: u8,
        dest_lapic_id: u8,
        active_low: bool,
        level_triggered: bool,
    ) {
        let index = gsi - self.gsi_base;
        let low_index = IDX_REDTBL_BASE + 2 * index;
        let high_index = low_index + 1;

        // Bits 0-7: Vector | 8-10: Delivery (000=Fixed) | 11: Dest Mode
        // (0=Physical) | 13: Polarity | 15: Trigger | 16: Mask (nasce 1)
        let mut low_val: u32 = vector as u32 | REDTBL_MASKED;
        if active_low {
            low_val |= 1 << 13;
        }
        if level_triggered {
            low_val |= 1 << 15;
        }

        // Bits 56-63: Destination (APIC ID)
        let high_val: u32 = (dest_lapic_id as u32) << 24;

        self.write(high_index, high_val);
        self.write(low_index, low_val);
    }

    /// Mascara/desmascara uma linha.
    pub unsafe fn set_masked(&self, gsi: u32, masked: bool) {
        let index = IDX_REDTBL_BASE + 2 * (gsi - self.gsi_base);
        let val = self.read(index);
        if masked {
            self.write(index, val | REDTBL_MASKED);
        } else {
            self.write(index, val & !REDTBL_MASKED);
        }
    }

    /// A linha está desmascarada?
    pub fn is_unmasked(&self, gsi: u32) -> bool {
        let index = IDX_REDTBL_BASE + 2 * (gsi - self.gsi_base);
        // SAFETY: base validada na construção
        unsafe { (self.read(index) & REDTBL_MASKED) == 0 }
    }

    // --- Helpers de Acesso Indireto (Privados) ---

    #[inline]
    unsafe fn mmio(base: u64, offset: usize) -> VolatilePtr<'static, u32> {
        let ptr = NonNull::new_unchecked((base as *mut u32).add(offset / 4));
        VolatilePtr::new(ptr)
    }

    unsafe fn read_raw(base: u64, reg_index: u32) -> u32 {
        Self::mmio(base, REG_IOREGSEL).write(reg_index);
        Self::mmio(base, REG_IOWIN).read()
    }

    unsafe fn read(&self, reg_index: u32) -> u32 {
        Self::read_raw(self.base, reg_index)
    }

    unsafe fn write(&self, reg_index: u32, value: u32) {
        Self::mmio(self.base, REG_IOREGSEL).write(reg_index);
        Self::mmio(self.base, REG_IOWIN).write(value);
    }
}
