//! Brasa Kernel - Binário Principal.
//!
//! O bootloader entrega controle aqui com stack válida, BSS zerado e o
//! `BootInfo` em RDI (System V). Só repassamos para o entry lógico da
//! biblioteca (`core::entry::kernel_main`).

#![no_std]
#![no_main]

use brasa::core as kernel_core;

#[no_mangle]
pub extern "C" fn _start(boot_info: &'static brasa::BootInfo) -> ! {
    kernel_core::entry::kernel_main(boot_info)
}
