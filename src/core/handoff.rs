//! Interface de Handoff (Bootloader -> Kernel).
//! Define a estrutura de dados (ABI) passada do bootloader para o Brasa.
//!
//! - Structs `#[repr(C)]` para garantia de layout.
//! - Tipos primitivos (`u64`, `u32`) para portabilidade.
//! - Magic Number para validação de versão.

/// Assinatura mágica esperada do Bootloader ("BRASA-OS").
pub const BOOT_MAGIC: u64 = 0x4252_4153_412D_4F53;

/// Estrutura de informações de boot.
/// Deve ser mantida em sincronia binária exata com o Bootloader.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BootInfo {
    /// Assinatura para validação (deve ser igual a BOOT_MAGIC).
    pub magic: u64,

    /// Versão do protocolo de boot.
    pub version: u32,

    /// Reservado (alinhamento).
    pub reserved: u32,

    /// Mapa de memória física.
    pub memory_map_addr: u64,
    pub memory_map_len: u64,

    /// Endereço físico da MADT (0 = firmware não forneceu).
    /// O bootloader resolve RSDP -> XSDT -> MADT e entrega direto.
    pub madt_addr: u64,

    /// Localização física do Kernel.
    pub kernel_phys_addr: u64,
    pub kernel_size: u64,
}
