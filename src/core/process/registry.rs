//! Registro Global de Processos
//!
//! Tabela de todos os processos vivos, alocação de PIDs e o protocolo
//! de shutdown ordenado. Toda mutação acontece sob o LOCK GLOBAL DE
//! ESCALONAMENTO (um único Spinlock grosso); iteração de leitura também
//! segura o lock pela duração do callback - callbacks não podem tentar
//! readquiri-lo nem bloquear indefinidamente.
//!
//! Visibilidade: processo em jail enxerga apenas a lista da sua jail;
//! processo sem jail enxerga a lista global MENOS os processos em jail.

use super::{Process, ProcessKind, ProcessState};
use crate::core::panic::fatal;
use crate::sched;
use crate::sync::Spinlock;
use crate::sys::Pid;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

/// Próximo PID. Fetch-and-increment, sem reuso e sem tratamento de
/// overflow (lacuna conhecida, ver DESIGN.md).
static NEXT_PID: AtomicU32 = AtomicU32::new(1);

/// PID do processo finalizador (0 = ainda não definido).
/// Referência fraca de propósito: guardamos só o identificador e
/// resolvemos pela tabela quando preciso.
static FINALIZER_PID: AtomicU32 = AtomicU32::new(0);

/// A tabela global, em ordem de inserção.
struct ProcessTable {
    processes: Vec<Arc<Process>>,
}

/// O lock global de escalonamento. O scheduler compartilha este lock
/// para suas próprias estruturas de fila.
static TABLE: Spinlock<ProcessTable> = Spinlock::new(ProcessTable {
    processes: Vec::new(),
});

/// Aloca um identificador novo.
///
/// O valor serve como PID, TID, PGID ou SID - um único espaço numérico
/// para todo o sistema.
pub fn allocate_pid() -> Pid {
    Pid::new(NEXT_PID.fetch_add(1, Ordering::SeqCst))
}

/// Define o processo finalizador. Uma vez, no init inicial.
pub fn set_finalizer(pid: Pid) {
    if FINALIZER_PID.swap(pid.as_u32(), Ordering::SeqCst) != 0 {
        fatal("(PROC) finalizador definido duas vezes");
    }
    crate::kinfo!("(PROC) Finalizador definido, pid=", pid.as_u32() as u64);
}

/// PID do finalizador, se já definido.
pub fn finalizer_pid() -> Option<Pid> {
    match FINALIZER_PID.load(Ordering::SeqCst) {
        0 => None,
        pid => Some(Pid::new(pid)),
    }
}

/// Insere um processo recém-construído.
///
/// Chamado EXATAMENTE uma vez por processo, depois da construção ter
/// sucesso. Registrar duas vezes é bug do chamador: fatal.
pub fn register_new(process: Arc<Process>) {
    let mut table = TABLE.lock();

    if table.processes.iter().any(|p| p.pid() == process.pid()) {
        fatal("(PROC) processo registrado duas vezes");
    }

    if let Some(jail) = process.jail() {
        jail.attach(&process);
    }
    crate::ktrace!("(PROC) registrado, pid=", process.pid().as_u32() as u64);
    table.processes.push(process);
}

/// Remove um processo cujo resultado de wait foi finalizado.
///
/// Chamado EXATAMENTE uma vez. Remover um processo desconhecido é bug
/// do chamador: fatal. Limpa a filiação de jail.
pub fn unregister(process: &Arc<Process>) {
    let mut table = TABLE.lock();

    let index = match table.processes.iter().position(|p| p.pid() == process.pid()) {
        Some(index) => index,
        None => fatal("(PROC) unregister de processo desconhecido"),
    };
    table.processes.remove(index);

    if let Some(jail) = process.jail() {
        jail.detach(process);
    }
    process.advance_state(ProcessState::Dead);
    crate::ktrace!("(PROC) removido, pid=", process.pid().as_u32() as u64);
}

/// Itera os processos visíveis ao chamador.
///
/// Em jail: a lista da jail. Sem jail: a lista global menos os
/// processos em jail. O primeiro erro do callback interrompe e propaga.
/// O callback roda SOB o lock global: não readquirir, não bloquear.
pub fn for_each_visible_to<E, F>(caller: &Arc<Process>, mut callback: F) -> Result<(), E>
where
    F: FnMut(&Arc<Process>) -> Result<(), E>,
{
    let table = TABLE.lock();

    match caller.jail() {
        Some(jail) => jail.with_members(|members| {
            for process in members {
                callback(process)?;
            }
            Ok(())
        }),
        None => {
            for process in table.processes.iter().filter(|p| !p.is_jailed()) {
                callback(process)?;
            }
            Ok(())
        }
    }
}

/// Variante filhos-apenas: mesmo escopo de visibilidade, filtrando por
/// paternidade (ppid) ou relação de trace.
pub fn for_each_child_visible_to<E, F>(caller: &Arc<Process>, mut callback: F) -> Result<(), E>
where
    F: FnMut(&Arc<Process>) -> Result<(), E>,
{
    let caller_pid = caller.pid();
    for_each_visible_to(caller, |process| {
        let is_child = process.ppid() == caller_pid;
        let is_tracee = process.tracer() == Some(caller_pid);
        if is_child || is_tracee {
            callback(process)?;
        }
        Ok(())
    })
}

/// Busca linear pelo PID na lista visível ao chamador.
///
/// O(n) de propósito: contagem de processos é escala de kernel.
pub fn lookup_by_pid(caller: &Arc<Process>, pid: Pid) -> Option<Arc<Process>> {
    let mut found = None;
    let _ = for_each_visible_to::<(), _>(caller, |process| {
        if process.pid() == pid && found.is_none() {
            found = Some(process.clone());
        }
        Ok(())
    });
    found
}

/// Conta processos vivos (não-morrendo) de uma classe, excluindo o
/// próprio chamador.
pub fn alive_count(caller: &Arc<Process>, kind: ProcessKind) -> usize {
    let table = TABLE.lock();
    table
        .processes
        .iter()
        .filter(|p| p.kind() == kind && !p.is_dying() && p.pid() != caller.pid())
        .count()
}

/// Processos de usuário ainda REGISTRADOS (morrendo ou não), excluindo
/// o chamador. É o que o shutdown espera zerar: o finalizador remove
/// cada um conforme colhe.
fn user_processes_remaining(caller_pid: Pid) -> usize {
    let table = TABLE.lock();
    table
        .processes
        .iter()
        .filter(|p| p.kind() == ProcessKind::User && p.pid() != caller_pid)
        .count()
}

/// O finalizador ainda está registrado?
fn finalizer_is_alive() -> bool {
    let finalizer = match finalizer_pid() {
        Some(pid) => pid,
        None => return false,
    };
    let table = TABLE.lock();
    table.processes.iter().any(|p| p.pid() == finalizer)
}

/// Shutdown ordenado de todos os processos de usuário.
///
/// Usado pela transição de estado de energia; não retorna até a
/// convergência (um kernel não abandona teardown de processo):
/// 1. Sob o lock global, marca todo processo de usuário (exceto o
///    chamador e o finalizador) como morrendo.
/// 2. Solta o lock e notifica o finalizador.
/// 3. Faz poll (cedendo a CPU entre polls) até a contagem zerar,
///    logando progresso periodicamente.
///
/// Sem retorno de erro: a única guarda é a invariante de que o
/// finalizador segue vivo - violada, é fatal.
pub fn shutdown_all_user_processes(caller: &Arc<Process>) {
    let caller_pid = caller.pid();
    let finalizer = finalizer_pid();

    {
        let table = TABLE.lock();
        for process in table.processes.iter() {
            if process.kind() != ProcessKind::User {
                continue;
            }
            if process.pid() == caller_pid || Some(process.pid()) == finalizer {
                continue;
            }
            if process.state() == ProcessState::Registered {
                process.advance_state(ProcessState::Dying);
            }
        }
    }

    sched::notify_finalizer();

    let mut polls: u64 = 0;
    loop {
        let remaining = user_processes_remaining(caller_pid);
        if remaining == 0 {
            break;
        }

        if !finalizer_is_alive() {
            fatal("(PROC) finalizador morto durante shutdown");
        }

        polls += 1;
        if polls % 64 == 0 {
            crate::kinfo!("(PROC) shutdown aguardando, restantes=", remaining as u64);
        }
        sched::yield_now();
    }

    crate::kinfo!("(PROC) shutdown de userspace concluido");
}

/// Quantos processos existem no total (diagnóstico).
pub fn process_count() -> usize {
    TABLE.lock().processes.len()
}

#[cfg(feature = "self_test")]
pub(super) fn reap_dying_for_test() {
    // Colhe como o finalizador faria: remove os processos morrendo.
    let dying: Vec<Arc<Process>> = {
        let table = TABLE.lock();
        table
            .processes
            .iter()
            .filter(|p| p.state() == ProcessState::Dying)
            .cloned()
            .collect()
    };
    for process in dying {
        unregister(&process);
    }
}
