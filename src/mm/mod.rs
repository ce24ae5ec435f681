//! Gerenciamento de Memória (mínimo)
//!
//! Este núcleo só carrega o Heap do kernel, suficiente para `Vec`,
//! `Arc` e `Box` no registro de processos e na lista de controladores.

pub mod heap;

pub fn init() {
    heap::init();
}
