//! # Fronteira com o Scheduler
//!
//! O algoritmo de escalonamento (runqueue, prioridade, fairness) vive
//! FORA deste núcleo. Aqui fica só o contrato entre as partes:
//!
//! - O núcleo chama `yield_now()` (ponto cooperativo de escalonamento,
//!   usado pelo poll de shutdown) e `notify_finalizer()` (trabalho
//!   pendente para o finalizador).
//! - O scheduler, do lado dele, lê/escreve `current_thread`/
//!   `idle_thread` do `ProcessorContext` da PRÓPRIA CPU e consulta
//!   `critical_nesting()`/`can_preempt()` antes de trocar contexto.
//!
//! Os hooks são instaláveis (o scheduler real registra os dele no init;
//! os self tests instalam stand-ins). Sem hook instalado, `yield_now`
//! degrada para um `pause` - nunca bloqueia.

use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use crate::sync::Spinlock;

/// Pontos de entrada do scheduler externo.
#[derive(Clone, Copy)]
pub struct SchedulerHooks {
    /// Cede a CPU voluntariamente (ponto de escalonamento explícito).
    pub yield_now: fn(),
    /// Acorda a task finalizadora: há processos morrendo para colher.
    pub notify_finalizer: fn(),
}

static HOOKS: Spinlock<Option<SchedulerHooks>> = Spinlock::new(None);

/// Instala (ou substitui) os hooks do scheduler.
pub fn install_hooks(hooks: SchedulerHooks) {
    *HOOKS.lock() = Some(hooks);
}

/// Remove os hooks (usado pelos self tests para limpar estado).
pub fn clear_hooks() {
    *HOOKS.lock() = None;
}

/// Cede a CPU. Sem scheduler instalado, apenas relaxa o core.
pub fn yield_now() {
    // Copia o hook para fora do lock antes de chamar.
    let hooks = *HOOKS.lock();
    match hooks {
        Some(hooks) => (hooks.yield_now)(),
        None => Cpu::relax(),
    }
}

/// Notifica o finalizador de que há trabalho pendente.
pub fn notify_finalizer() {
    let hooks = *HOOKS.lock();
    match hooks {
        Some(hooks) => (hooks.notify_finalizer)(),
        None => {
            crate::kdebug!("(SCHED) notify_finalizer sem scheduler instalado");
        }
    }
}
