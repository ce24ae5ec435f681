/// Arquivo: core/smp/percpu.rs
///
/// Propósito: Contexto de Execução por CPU.
/// Responde, sem lock e com interrupções desabilitadas: "que CPU sou eu,
/// o que estou rodando, posso ser preemptado agora".
///
/// Detalhes de Implementação:
/// - Array estático indexável de `MAX_CPUS` contextos; NUNCA um
///   singleton compartilhado mutado por várias CPUs.
/// - O acessor `current()` usa armazenamento local de CPU (GS base em
///   x86_64 guarda o ponteiro do contexto), instalado por
///   `register_current` durante o boot de cada core.
/// - Invariante: apenas a CPU dona muta `current_thread`/`idle_thread`/
///   flags. Outras CPUs só interagem enfileirando mensagens
///   (`core::smp::message`). Ler o `current_thread` de outra CPU por
///   fora da mensageria é erro de design, não condição de runtime.

use super::message::MessageQueue;
use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use crate::core::panic::fatal;
use crate::sys::Tid;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Número máximo de CPUs suportadas.
pub const MAX_CPUS: usize = 32;

/// Contexto de execução de uma CPU física.
///
/// Vida útil: boot ao shutdown. Criado (registrado) durante o boot do
/// core, antes de interrupções serem habilitadas nele.
pub struct ProcessorContext {
    /// ID lógico, atribuído no registro, nunca reutilizado.
    id: AtomicU32,
    /// ID de hardware (APIC ID), alvo de IPIs.
    apic_id: AtomicU32,
    /// Slot já foi registrado? `for_each` tolera slots vazios.
    registered: AtomicBool,
    /// Contador de aninhamento de seção crítica. >0 proíbe preempção.
    critical_nesting: AtomicU32,
    /// Identidade da thread em execução (tabela do scheduler).
    current_thread: AtomicU32,
    /// Identidade da thread idle desta CPU.
    idle_thread: AtomicU32,
    /// A CPU está dentro do scheduler?
    in_scheduler: AtomicBool,
    /// Profundidade de IRQ (0 = fora de interrupção).
    irq_depth: AtomicU32,
    /// Fila de mensagens de outros processadores (lock-free).
    pub(crate) queue: MessageQueue,
}

/// Valor salvo de aninhamento crítico.
///
/// `#[must_use]`: descartar o nível sem restaurar é vazamento de seção
/// crítica - a CPU ficaria proibida de trocar de contexto para sempre.
#[must_use = "seção crítica nunca restaurada: a CPU ficaria não-preemptável"]
#[derive(Debug, Clone, Copy)]
pub struct CriticalLevel(u32);

impl ProcessorContext {
    const fn new() -> Self {
        Self {
            id: AtomicU32::new(0),
            apic_id: AtomicU32::new(0),
            registered: AtomicBool::new(false),
            critical_nesting: AtomicU32::new(0),
            current_thread: AtomicU32::new(0),
            idle_thread: AtomicU32::new(0),
            in_scheduler: AtomicBool::new(false),
            irq_depth: AtomicU32::new(0),
            queue: MessageQueue::new(),
        }
    }

    /// ID lógico desta CPU.
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Relaxed)
    }

    /// APIC ID desta CPU (alvo de IPI).
    pub fn apic_id(&self) -> u32 {
        self.apic_id.load(Ordering::Relaxed)
    }

    /// Este contexto é o da CPU chamadora?
    pub fn is_current(&self) -> bool {
        match try_current() {
            Some(ctx) => core::ptr::eq(ctx, self),
            None => false,
        }
    }

    // --- Seções Críticas ---

    /// Entra em seção crítica; retorna o nível anterior para restaurar.
    ///
    /// Disciplina estrita de push/pop: código dentro da seção não pode
    /// bloquear nem ser preemptado (o scheduler recusa trocar enquanto
    /// o contador for não-zero).
    pub fn enter_critical(&self) -> CriticalLevel {
        let previous = self.critical_nesting.fetch_add(1, Ordering::AcqRel);
        CriticalLevel(previous)
    }

    /// Restaura o aninhamento para um nível salvo.
    ///
    /// Restaurar para um nível ACIMA do atual é violação de contrato
    /// (fatal). Repetir a restauração com o mesmo valor salvo é no-op.
    pub fn restore_critical(&self, saved: CriticalLevel) {
        let current = self.critical_nesting.load(Ordering::Acquire);
        if saved.0 > current {
            fatal("(SMP) restore_critical para nivel acima do atual");
        }
        self.critical_nesting.store(saved.0, Ordering::Release);
    }

    /// Aninhamento atual. O scheduler consulta antes de trocar contexto.
    pub fn critical_nesting(&self) -> u32 {
        self.critical_nesting.load(Ordering::Acquire)
    }

    /// Preempção permitida agora?
    pub fn can_preempt(&self) -> bool {
        self.critical_nesting() == 0 && !self.is_in_scheduler()
    }

    // --- Threads (identidades na tabela do scheduler) ---

    pub fn current_thread(&self) -> Tid {
        Tid::new(self.current_thread.load(Ordering::Acquire))
    }

    /// Só a CPU dona pode mutar.
    pub fn set_current_thread(&self, tid: Tid) {
        if !self.is_current() {
            fatal("(SMP) mutacao remota de current_thread");
        }
        self.current_thread.store(tid.as_u32(), Ordering::Release);
    }

    pub fn idle_thread(&self) -> Tid {
        Tid::new(self.idle_thread.load(Ordering::Acquire))
    }

    /// Só a CPU dona pode mutar; chamado uma vez quando o scheduler
    /// cria a thread idle do core.
    pub fn set_idle_thread(&self, tid: Tid) {
        if !self.is_current() {
            fatal("(SMP) mutacao remota de idle_thread");
        }
        self.idle_thread.store(tid.as_u32(), Ordering::Release);
    }

    // --- Flags de reentrância ---

    pub fn set_in_scheduler(&self, value: bool) {
        if !self.is_current() {
            fatal("(SMP) mutacao remota de in_scheduler");
        }
        self.in_scheduler.store(value, Ordering::Release);
    }

    pub fn is_in_scheduler(&self) -> bool {
        self.in_scheduler.load(Ordering::Acquire)
    }

    /// Entrada de handler de IRQ.
    pub fn enter_irq(&self) {
        self.irq_depth.fetch_add(1, Ordering::AcqRel);
    }

    /// Saída de handler de IRQ. Ao voltar à profundidade 0, drena as
    /// mensagens pendentes (ponto de poll garantido).
    pub fn leave_irq(&self) {
        let previous = self.irq_depth.fetch_sub(1, Ordering::AcqRel);
        if previous == 0 {
            fatal("(SMP) leave_irq sem enter_irq");
        }
        if previous == 1 {
            self.smp_process_pending_messages();
        }
    }

    pub fn in_irq(&self) -> bool {
        self.irq_depth.load(Ordering::Acquire) > 0
    }

    // --- Mensageria ---

    /// Drena e executa as mensagens pendentes desta CPU.
    ///
    /// Nunca bloqueia; chamável de contexto de interrupção. Só a CPU
    /// dona consome a própria fila.
    pub fn smp_process_pending_messages(&self) -> usize {
        super::message::drain_queue_global(&self.queue)
    }
}

// Array global de contextos. Slots não registrados ficam inertes.
static CONTEXTS: [ProcessorContext; MAX_CPUS] = [const { ProcessorContext::new() }; MAX_CPUS];

/// Quantidade de contextos registrados.
static REGISTERED_COUNT: AtomicU32 = AtomicU32::new(0);

/// Registra o contexto da CPU chamadora e instala o armazenamento
/// local (GS base). Chamado uma vez por core, no boot do core, antes de
/// habilitar interrupções nele.
pub fn register_current(logical_id: u32) -> &'static ProcessorContext {
    if logical_id as usize >= MAX_CPUS {
        fatal("(SMP) id logico acima de MAX_CPUS");
    }

    let ctx = &CONTEXTS[logical_id as usize];
    if ctx.registered.swap(true, Ordering::SeqCst) {
        fatal("(SMP) contexto registrado duas vezes");
    }

    ctx.id.store(logical_id, Ordering::Relaxed);
    ctx.apic_id.store(Cpu::current_id().0, Ordering::Relaxed);
    REGISTERED_COUNT.fetch_add(1, Ordering::SeqCst);

    // SAFETY: ctx é estático; aponta o GS desta CPU para ele.
    unsafe {
        Cpu::set_cpu_local_base(ctx as *const ProcessorContext as usize);
    }

    crate::kdebug!("(SMP) CPU registrada, id=", logical_id as u64);
    ctx
}

/// Contexto da CPU chamadora, ou `None` antes do registro.
pub fn try_current() -> Option<&'static ProcessorContext> {
    let base = Cpu::cpu_local_base();
    if base == 0 {
        return None;
    }
    // SAFETY: o GS base só recebe ponteiros de CONTEXTS (estático).
    Some(unsafe { &*(base as *const ProcessorContext) })
}

/// Contexto da CPU chamadora.
///
/// Chamar antes de `register_current` nesta CPU é fatal: nenhum caminho
/// do kernel pode rodar sem saber em que CPU está.
pub fn current() -> &'static ProcessorContext {
    match try_current() {
        Some(ctx) => ctx,
        None => fatal("(SMP) current() antes de register_current"),
    }
}

/// Itera todos os contextos registrados.
///
/// Usado só para operações globais (boot, estatística, broadcast).
/// Slots ainda não inicializados são pulados.
pub fn for_each(mut callback: impl FnMut(&'static ProcessorContext)) {
    for ctx in CONTEXTS.iter() {
        if ctx.registered.load(Ordering::Acquire) {
            callback(ctx);
        }
    }
}

/// Contexto de uma CPU pelo ID lógico (se registrada).
pub fn by_id(logical_id: u32) -> Option<&'static ProcessorContext> {
    let ctx = CONTEXTS.get(logical_id as usize)?;
    if ctx.registered.load(Ordering::Acquire) {
        Some(ctx)
    } else {
        None
    }
}

/// Número de CPUs registradas.
pub fn count() -> usize {
    REGISTERED_COUNT.load(Ordering::SeqCst) as usize
}
