//! Heap do Kernel
//!
//! Alocador global sobre uma arena estática (BSS), usando o
//! `linked_list_allocator`. Inicializado cedo no boot, antes de
//! qualquer `Vec`/`Arc`.

use linked_list_allocator::LockedHeap;
use core::sync::atomic::{AtomicBool, Ordering};

/// 2 MiB de heap: sobra para tabelas de processo em escala de kernel.
const HEAP_SIZE: usize = 2 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static HEAP_AREA: HeapArea = HeapArea(core::cell::UnsafeCell::new([0; HEAP_SIZE]));

static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[repr(align(4096))]
struct HeapArea(core::cell::UnsafeCell<[u8; HEAP_SIZE]>);

// SAFETY: a arena só é entregue ao alocador, uma única vez.
unsafe impl Sync for HeapArea {}

/// Entrega a arena ao alocador. Repetir é violação de contrato.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        crate::core::panic::fatal("(MM) heap inicializado duas vezes");
    }

    // SAFETY: região estática, exclusiva do alocador a partir daqui.
    unsafe {
        ALLOCATOR.lock().init(HEAP_AREA.0.get() as *mut u8, HEAP_SIZE);
    }
    crate::kinfo!("(MM) Heap pronto, bytes=", HEAP_SIZE as u64);
}
