/// Arquivo: core/smp/message.rs
///
/// Propósito: Mensageria entre processadores.
/// Permite que a CPU A execute trabalho na CPU B (ou num conjunto, ou em
/// todas), opcionalmente esperando a conclusão. É o ÚNICO caminho de
/// mutação remota de estado per-CPU.
///
/// Detalhes de Implementação:
/// - Arena de slots pré-alocada no boot (dimensionada para MAX_CPUS):
///   mensagens nunca alocam memória que possa falhar sem fallback, pois
///   podem rodar com interrupções desabilitadas.
/// - Free list lock-free com índice+tag de geração (CAS de u64) para
///   evitar ABA; fila por CPU com push atômico (CAS de índice) e
///   consumo exclusivo pela CPU dona (swap).
/// - O push empilha em ordem LIFO; o dreno inverte a lista antes de
///   executar, preservando FIFO por par emissor->receptor. Entre
///   emissores diferentes não há ordem garantida.
/// - Envio síncrono: o receptor marca a conclusão, o EMISSOR devolve o
///   slot (evita corrida de reuso sobre a flag). Fire-and-forget: o
///   próprio receptor devolve após executar.
/// - Esgotamento do pool é erro recuperável (EAGAIN): o emissor decide
///   entre re-tentar ou degradar.

use super::ipi;
use super::percpu::{self, ProcessorContext, MAX_CPUS};
use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use crate::sys::Errno;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Capacidade da arena global (pré-dimensionada no boot).
pub const MSG_POOL_SIZE: usize = 4 * MAX_CPUS;

/// Índice nulo ("fim de lista").
const NIL: u32 = u32::MAX;

/// O que a CPU alvo deve fazer.
#[derive(Debug, Clone, Copy)]
pub enum MessageKind {
    /// Executa um callback com um argumento opaco.
    Callback { func: fn(usize), arg: usize },
    /// Invalida um range de páginas na TLB local.
    FlushTlb { base: u64, page_count: usize },
    /// Terminal: a CPU executa e NÃO volta ao dispatch normal.
    /// Usado apenas em shutdown/panic.
    Halt,
}

/// Um slot da arena.
struct MessageSlot {
    kind: UnsafeCell<MessageKind>,
    /// Elo: índice do próximo slot (free list OU fila de destino).
    next: AtomicU32,
    /// Conclusão, para envios síncronos.
    completed: AtomicBool,
    /// Quem devolve o slot: emissor (sync) ou receptor (async).
    synchronous: AtomicBool,
}

// SAFETY: `kind` só é escrito pelo emissor antes do push e lido pelo
// receptor depois do pop; o handshake atômico da fila ordena os acessos.
unsafe impl Sync for MessageSlot {}

impl MessageSlot {
    const fn new() -> Self {
        Self {
            kind: UnsafeCell::new(MessageKind::Halt),
            next: AtomicU32::new(NIL),
            completed: AtomicBool::new(false),
            synchronous: AtomicBool::new(false),
        }
    }
}

#[inline]
const fn pack(tag: u32, index: u32) -> u64 {
    ((tag as u64) << 32) | index as u64
}

#[inline]
const fn head_index(packed: u64) -> u32 {
    packed as u32
}

#[inline]
const fn head_tag(packed: u64) -> u32 {
    (packed >> 32) as u32
}

/// Arena de mensagens com free list lock-free.
pub struct MessagePool {
    slots: [MessageSlot; MSG_POOL_SIZE],
    /// (tag de geração << 32) | índice do topo. Tag evita ABA.
    free_head: AtomicU64,
    initialized: AtomicBool,
}

impl MessagePool {
    pub const fn new() -> Self {
        Self {
            slots: [const { MessageSlot::new() }; MSG_POOL_SIZE],
            free_head: AtomicU64::new(pack(0, NIL)),
            initialized: AtomicBool::new(false),
        }
    }

    /// Encadeia a free list com `capacity` slots utilizáveis.
    ///
    /// Chamado uma vez no boot (capacidade cheia); testes criam pools
    /// próprios com capacidade reduzida. Repetir é violação de contrato.
    pub fn init(&self, capacity: usize) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            crate::core::panic::fatal("(MSG) pool inicializado duas vezes");
        }
        let capacity = capacity.min(MSG_POOL_SIZE);
        if capacity == 0 {
            return;
        }
        for i in 0..capacity - 1 {
            self.slots[i].next.store(i as u32 + 1, Ordering::Relaxed);
        }
        self.slots[capacity - 1].next.store(NIL, Ordering::Relaxed);
        self.free_head.store(pack(0, 0), Ordering::Release);
    }

    /// Retira um slot da free list e o preenche.
    ///
    /// `Err(EAGAIN)`: pool esgotado; o chamador re-tenta ou degrada.
    pub(crate) fn alloc(&self, kind: MessageKind, synchronous: bool) -> Result<u32, Errno> {
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            let index = head_index(head);
            if index == NIL {
                return Err(Errno::EAGAIN);
            }

            let next = self.slots[index as usize].next.load(Ordering::Relaxed);
            let new_head = pack(head_tag(head).wrapping_add(1), next);
            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // SAFETY: o slot acabou de sair da free list; só o
                // emissor o enxerga até o push.
                unsafe {
                    *self.slots[index as usize].kind.get() = kind;
                }
                self.slots[index as usize]
                    .completed
                    .store(false, Ordering::Relaxed);
                self.slots[index as usize]
                    .synchronous
                    .store(synchronous, Ordering::Relaxed);
                return Ok(index);
            }
        }
    }

    /// Devolve um slot à free list.
    pub(crate) fn free(&self, index: u32) {
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            self.slots[index as usize]
                .next
                .store(head_index(head), Ordering::Relaxed);
            let new_head = pack(head_tag(head).wrapping_add(1), index);
            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    pub(crate) fn is_completed(&self, index: u32) -> bool {
        self.slots[index as usize].completed.load(Ordering::Acquire)
    }
}

/// Fila de mensagens de uma CPU.
///
/// Multi-produtor (push atômico de qualquer CPU), consumidor único
/// (a CPU dona drena com swap).
pub struct MessageQueue {
    head: AtomicU32,
}

impl MessageQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU32::new(NIL),
        }
    }

    /// Empilha um slot (lock-free, CAS com retry).
    pub(crate) fn push(&self, pool: &MessagePool, index: u32) {
        loop {
            let old_head = self.head.load(Ordering::Acquire);
            pool.slots[index as usize]
                .next
                .store(old_head, Ordering::Relaxed);
            if self
                .head
                .compare_exchange_weak(old_head, index, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Toma a lista inteira de uma vez (consumidor único).
    fn take_all(&self) -> u32 {
        self.head.swap(NIL, Ordering::AcqRel)
    }
}

/// Executa a ação de uma mensagem na CPU atual.
fn execute(kind: MessageKind) {
    match kind {
        MessageKind::Callback { func, arg } => func(arg),
        MessageKind::FlushTlb { base, page_count } => {
            crate::arch::x86_64::tlb::invalidate_range_local(base, page_count);
        }
        // Halt é tratado no dreno (não retorna).
        MessageKind::Halt => {}
    }
}

/// Drena e executa todas as mensagens pendentes de uma fila.
///
/// Nunca bloqueia. A lista é tomada com um swap e invertida para
/// execução em ordem de envio (FIFO por emissor).
pub(crate) fn drain_queue(pool: &MessagePool, queue: &MessageQueue) -> usize {
    let mut head = queue.take_all();
    if head == NIL {
        return 0;
    }

    // Inverter: o push empilha, a execução precisa da ordem de chegada.
    let mut ordered = NIL;
    while head != NIL {
        let next = pool.slots[head as usize].next.load(Ordering::Relaxed);
        pool.slots[head as usize]
            .next
            .store(ordered, Ordering::Relaxed);
        ordered = head;
        head = next;
    }

    let mut executed = 0;
    while ordered != NIL {
        let index = ordered;
        ordered = pool.slots[index as usize].next.load(Ordering::Relaxed);

        // SAFETY: depois do pop, só esta CPU enxerga o slot.
        let kind = unsafe { *pool.slots[index as usize].kind.get() };
        let synchronous = pool.slots[index as usize].synchronous.load(Ordering::Relaxed);

        if let MessageKind::Halt = kind {
            // Terminal: sinaliza quem espera e para o core de vez.
            if synchronous {
                pool.slots[index as usize]
                    .completed
                    .store(true, Ordering::Release);
            } else {
                pool.free(index);
            }
            Cpu::hang();
        }

        execute(kind);
        executed += 1;

        if synchronous {
            pool.slots[index as usize]
                .completed
                .store(true, Ordering::Release);
        } else {
            pool.free(index);
        }
    }
    executed
}

// =============================================================================
// POOL GLOBAL + API DE ENVIO
// =============================================================================

static POOL: MessagePool = MessagePool::new();

/// Inicializa a arena global. Chamado uma vez no boot do BSP.
pub fn init_pool() {
    POOL.init(MSG_POOL_SIZE);
    crate::kinfo!("(MSG) Pool de mensagens, slots=", MSG_POOL_SIZE as u64);
}

/// Dreno da fila de um contexto contra o pool global.
pub(crate) fn drain_queue_global(queue: &MessageQueue) -> usize {
    drain_queue(&POOL, queue)
}

/// Envia fire-and-forget para uma CPU.
///
/// Enviar para si mesmo executa inline (degenerado, mas válido).
pub fn send_to(target: &'static ProcessorContext, kind: MessageKind) -> Result<(), Errno> {
    if target.is_current() {
        execute(kind);
        return Ok(());
    }

    let index = POOL.alloc(kind, false)?;
    target.queue.push(&POOL, index);
    ipi::send_message_ipi(target.apic_id());
    Ok(())
}

/// Envia para uma CPU e espera a conclusão.
///
/// O spin drena a própria fila a cada volta: se o alvo estiver
/// esperando ESTA CPU por outra mensagem, ninguém trava.
pub fn send_to_sync(target: &'static ProcessorContext, kind: MessageKind) -> Result<(), Errno> {
    if target.is_current() {
        execute(kind);
        return Ok(());
    }

    let index = POOL.alloc(kind, true)?;
    target.queue.push(&POOL, index);
    ipi::send_message_ipi(target.apic_id());

    let me = percpu::current();
    while !POOL.is_completed(index) {
        me.smp_process_pending_messages();
        Cpu::relax();
    }
    POOL.free(index);
    Ok(())
}

/// Monta a lista de alvos (todas as CPUs registradas exceto a atual).
fn collect_targets(targets: &mut [Option<&'static ProcessorContext>; MAX_CPUS]) -> usize {
    let mut count = 0;
    percpu::for_each(|ctx| {
        if !ctx.is_current() {
            targets[count] = Some(ctx);
            count += 1;
        }
    });
    count
}

/// Broadcast fire-and-forget para todas as outras CPUs.
///
/// Ou todos os slots são alocados, ou nenhum envio acontece (EAGAIN).
pub fn broadcast(kind: MessageKind) -> Result<(), Errno> {
    let mut targets: [Option<&'static ProcessorContext>; MAX_CPUS] = [None; MAX_CPUS];
    let count = collect_targets(&mut targets);
    if count == 0 {
        return Ok(());
    }

    let mut indices = [NIL; MAX_CPUS];
    alloc_for_targets(kind, false, count, &mut indices)?;

    for i in 0..count {
        let target = targets[i].unwrap_or_else(|| {
            crate::core::panic::fatal("(MSG) alvo de broadcast evaporou")
        });
        target.queue.push(&POOL, indices[i]);
    }
    ipi::broadcast_message_ipi();
    Ok(())
}

/// Broadcast síncrono: espera a flag de conclusão de CADA alvo.
pub fn broadcast_sync(kind: MessageKind) -> Result<(), Errno> {
    let mut targets: [Option<&'static ProcessorContext>; MAX_CPUS] = [None; MAX_CPUS];
    let count = collect_targets(&mut targets);
    if count == 0 {
        return Ok(());
    }

    let mut indices = [NIL; MAX_CPUS];
    alloc_for_targets(kind, true, count, &mut indices)?;

    for i in 0..count {
        let target = targets[i].unwrap_or_else(|| {
            crate::core::panic::fatal("(MSG) alvo de broadcast evaporou")
        });
        target.queue.push(&POOL, indices[i]);
    }
    ipi::broadcast_message_ipi();

    // Espera ativa, drenando a própria fila (esta CPU também pode ser
    // alvo de pedidos dos outros).
    let me = percpu::current();
    for i in 0..count {
        while !POOL.is_completed(indices[i]) {
            me.smp_process_pending_messages();
            Cpu::relax();
        }
        POOL.free(indices[i]);
    }
    Ok(())
}

/// Aloca um slot por alvo; em esgotamento parcial devolve o que já
/// saiu e reporta EAGAIN (nenhuma mensagem parcial é enviada).
fn alloc_for_targets(
    kind: MessageKind,
    synchronous: bool,
    count: usize,
    indices: &mut [u32; MAX_CPUS],
) -> Result<(), Errno> {
    for i in 0..count {
        match POOL.alloc(kind, synchronous) {
            Ok(index) => indices[i] = index,
            Err(err) => {
                for &index in indices.iter().take(i) {
                    POOL.free(index);
                }
                crate::kwarn!("(MSG) pool esgotado no broadcast, alvos=", count as u64);
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Shootdown de TLB em todas as CPUs.
///
/// Invalida localmente e espera as demais invalidarem. Esgotamento do
/// pool degrada: re-tenta drenando a própria fila até conseguir.
pub fn flush_tlb_range_all(base: u64, page_count: usize) {
    crate::arch::x86_64::tlb::invalidate_range_local(base, page_count);

    loop {
        match broadcast_sync(MessageKind::FlushTlb { base, page_count }) {
            Ok(()) => return,
            Err(Errno::EAGAIN) => {
                // Slots voltam quando os receptores drenarem; drenar a
                // própria fila enquanto isso evita deadlock mútuo.
                if let Some(me) = percpu::try_current() {
                    me.smp_process_pending_messages();
                }
                Cpu::relax();
            }
            Err(_) => return,
        }
    }
}

/// Melhor esforço de Halt para as outras CPUs (panic/shutdown).
///
/// Sem erro e sem espera: se não houver slot ou contexto, apenas segue.
pub fn broadcast_halt_best_effort() {
    if percpu::try_current().is_none() {
        return;
    }
    let _ = broadcast(MessageKind::Halt);
}
