/// Arquivo: x86_64/acpi/madt.rs
///
/// Propósito: Parsing da Multiple APIC Description Table (MADT).
/// Esta tabela descreve todos os controladores de interrupção (Local APICs
/// e I/O APICs) presentes no sistema, mais os overrides de IRQs ISA.
///
/// Detalhes de Implementação:
/// - Estruturas `#[repr(C, packed)]` em sincronia binária exata com o
///   firmware: header SDT de 36 bytes, campos específicos da MADT, e
///   registros variáveis {tipo u8, tamanho u8, payload}.
/// - Leituras via `read_unaligned` (registros não têm alinhamento garantido).
/// - Tipos consumidos: 0 (Local APIC), 1 (I/O APIC), 2 (Interrupt Source
///   Override). Os demais são pulados pelo campo de tamanho.

use bitflags::bitflags;

/// Header comum de tabelas ACPI (System Description Table).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct SdtHeader {
    pub signature: [u8; 4],
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: u32,
    pub creator_revision: u32,
}

/// Header da MADT: SDT + campos específicos.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct MadtHeader {
    pub sdt: SdtHeader,
    /// Endereço físico base dos Local APICs
    pub local_apic_address: u32,
    pub flags: u32,
}

bitflags! {
    /// Flags globais da MADT.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MadtFlags: u32 {
        /// Sistema tem PIC 8259 (mesmo que o IOAPIC exista, o legacy
        /// precisa coexistir - mascarado - na lista de controladores).
        const PCAT_COMPAT = 1 << 0;
    }
}

/// Cabeçalho genérico para registros da MADT
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct MadtEntryHeader {
    pub entry_type: u8,
    pub record_length: u8,
}

/// Tipo 0: Processor Local APIC
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct MadtLocalApic {
    pub header: MadtEntryHeader,
    pub acpi_processor_id: u8,
    pub apic_id: u8,
    /// Bit 0 = Processor Enabled
    pub flags: u32,
}

impl MadtLocalApic {
    pub fn is_enabled(&self) -> bool {
        (self.flags & 1) != 0
    }
}

/// Tipo 1: I/O APIC
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct MadtIoApic {
    pub header: MadtEntryHeader,
    pub io_apic_id: u8,
    pub reserved: u8,
    pub io_apic_address: u32,
    pub global_system_interrupt_base: u32,
}

/// Tipo 2: Interrupt Source Override (ISO)
/// Mapeia IRQs ISA (ex: 0 para Timer) para GSI, com flags de
/// polaridade/trigger.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct MadtInterruptOverride {
    pub header: MadtEntryHeader,
    /// Sempre 0 (ISA)
    pub bus_source: u8,
    /// IRQ na numeração legacy
    pub irq_source: u8,
    /// Global System Interrupt correspondente
    pub gsi: u32,
    pub flags: u16,
}

bitflags! {
    /// Flags MPS INTI (polaridade bits 0-1, trigger bits 2-3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntiFlags: u16 {
        const POLARITY_MASK = 0b0011;
        const ACTIVE_LOW = 0b0011;
        const TRIGGER_MASK = 0b1100;
        const LEVEL_TRIGGERED = 0b1100;
    }
}

impl MadtInterruptOverride {
    pub fn inti_flags(&self) -> IntiFlags {
        IntiFlags::from_bits_retain(self.flags)
    }

    pub fn active_low(&self) -> bool {
        (self.flags & IntiFlags::POLARITY_MASK.bits()) == IntiFlags::ACTIVE_LOW.bits()
    }

    pub fn level_triggered(&self) -> bool {
        (self.flags & IntiFlags::TRIGGER_MASK.bits()) == IntiFlags::LEVEL_TRIGGERED.bits()
    }
}

/// Uma entrada decodificada da MADT.
///
/// Os registros são copiados (não referenciados) porque o firmware não
/// garante alinhamento.
#[derive(Debug, Clone, Copy)]
pub enum MadtEntry {
    LocalApic(MadtLocalApic),
    IoApic(MadtIoApic),
    InterruptOverride(MadtInterruptOverride),
    /// Tipo reconhecido pelo tamanho, mas não consumido por este núcleo.
    Other { entry_type: u8 },
}

/// Handle validado da MADT.
///
/// Aponta para memória física do firmware, imutável pela vida do boot.
#[derive(Debug, Clone, Copy)]
pub struct Madt {
    base: *const u8,
    length: usize,
    local_apic_address: u32,
    flags: MadtFlags,
}

// SAFETY: a tabela é memória de firmware somente-leitura, nunca mutada.
unsafe impl Send for Madt {}
unsafe impl Sync for Madt {}

impl Madt {
    /// Valida e cria um handle da MADT no endereço dado.
    ///
    /// Retorna `None` para endereço nulo, assinatura errada, tamanho
    /// implausível ou checksum inválido. Nenhum desses casos é fatal:
    /// o chamador degrada para o modo legacy.
    ///
    /// # Safety
    /// `addr` deve ser um endereço mapeado e legível; se houver uma
    /// tabela lá, ela deve permanecer válida pela vida do boot.
    pub unsafe fn from_addr(addr: u64) -> Option<Madt> {
        if addr == 0 {
            return None;
        }
        let base = addr as *const u8;
        let header = core::ptr::read_unaligned(base as *const MadtHeader);

        // Cópias locais: campos de struct packed não podem ser referenciados
        let signature = header.sdt.signature;
        let table_length = header.sdt.length;

        if &signature != b"APIC" {
            crate::kwarn!("(MADT) Assinatura invalida em addr=", addr);
            return None;
        }

        let length = table_length as usize;
        if length < core::mem::size_of::<MadtHeader>() {
            crate::kwarn!("(MADT) Tamanho implausivel=", length as u64);
            return None;
        }

        // Checksum: soma de todos os bytes da tabela deve ser 0 (mod 256)
        let mut sum: u8 = 0;
        for i in 0..length {
            sum = sum.wrapping_add(*base.add(i));
        }
        if sum != 0 {
            crate::kwarn!("(MADT) Checksum invalido, soma=", sum as u64);
            return None;
        }

        Some(Madt {
            base,
            length,
            local_apic_address: header.local_apic_address,
            flags: MadtFlags::from_bits_retain(header.flags),
        })
    }

    /// Endereço MMIO dos Local APICs anunciado pelo firmware.
    pub fn local_apic_address(&self) -> u32 {
        self.local_apic_address
    }

    /// O sistema carrega um PIC 8259 (PCAT_COMPAT)?
    pub fn has_legacy_pic(&self) -> bool {
        self.flags.contains(MadtFlags::PCAT_COMPAT)
    }

    /// Itera os registros variáveis da tabela.
    pub fn entries(&self) -> MadtEntryIter {
        MadtEntryIter {
            base: self.base,
            offset: core::mem::size_of::<MadtHeader>(),
            length: self.length,
        }
    }
}

/// Iterador sobre os registros da MADT.
pub struct MadtEntryIter {
    base: *const u8,
    offset: usize,
    length: usize,
}

impl Iterator for MadtEntryIter {
    type Item = MadtEntry;

    fn next(&mut self) -> Option<MadtEntry> {
        if self.offset + core::mem::size_of::<MadtEntryHeader>() > self.length {
            return None;
        }

        // SAFETY: offset verificado contra o tamanho validado da tabela
        let header = unsafe {
            core::ptr::read_unaligned(self.base.add(self.offset) as *const MadtEntryHeader)
        };
        let record_length = header.record_length as usize;

        // Registro corrompido: tamanho zero ou estourando a tabela
        if record_length < core::mem::size_of::<MadtEntryHeader>()
            || self.offset + record_length > self.length
        {
            return None;
        }

        let entry_ptr = unsafe { self.base.add(self.offset) };
        let entry = match header.entry_type {
            0 if record_length >= core::mem::size_of::<MadtLocalApic>() => {
                // SAFETY: tamanho do registro conferido acima
                MadtEntry::LocalApic(unsafe {
                    core::ptr::read_unaligned(entry_ptr as *const MadtLocalApic)
                })
            }
            1 if record_length >= core::mem::size_of::<MadtIoApic>() => {
                // SAFETY: tamanho do registro conferido acima
                MadtEntry::IoApic(unsafe {
                    core::ptr::read_unaligned(entry_ptr as *const MadtIoApic)
                })
            }
            2 if record_length >= core::mem::size_of::<MadtInterruptOverride>() => {
                // SAFETY: tamanho do registro conferido acima
                MadtEntry::InterruptOverride(unsafe {
                    core::ptr::read_unaligned(entry_ptr as *const MadtInterruptOverride)
                })
            }
            t => MadtEntry::Other { entry_type: t },
        };

        self.offset += record_length;
        Some(entry)
    }
}
