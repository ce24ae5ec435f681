//! Gerenciamento de Processos
//!
//! Fonte única de verdade sobre "quais processos existem": o objeto
//! `Process`, o registro global (`registry`) e o escopo de visibilidade
//! por namespace (`jail`).
//!
//! Ciclo de vida visto pelo registro:
//! `Constructed -> Registered -> (Dying) -> Dead/Unregistered`.
//! Transições são de mão única; um processo nunca volta a `Registered`.

pub mod jail;
pub mod registry;

#[cfg(feature = "self_test")]
pub mod test;

pub use jail::Jail;

use crate::core::panic::fatal;
use crate::sys::Pid;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Classe do processo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Kernel,
    User,
}

/// Estado do processo, como visto pelo registro
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ProcessState {
    /// Inserido no registro, vivo.
    Registered = 0,
    /// Marcado para morrer; aguardando o finalizador colher.
    Dying = 1,
    /// Colhido e removido do registro.
    Dead = 2,
}

impl ProcessState {
    fn from_u8(value: u8) -> ProcessState {
        match value {
            0 => ProcessState::Registered,
            1 => ProcessState::Dying,
            _ => ProcessState::Dead,
        }
    }
}

/// Processo
pub struct Process {
    pid: Pid,
    ppid: Pid,
    kind: ProcessKind,
    name: &'static str,
    state: AtomicU8,
    /// PID do tracer (0 = ninguém traça).
    tracer: AtomicU32,
    /// Jail do processo: definido na criação, imutável depois.
    /// A filiação (lista de membros) é limpa no unregister.
    jail: Option<Arc<Jail>>,
}

impl Process {
    /// Constrói um processo ainda NÃO registrado.
    ///
    /// O chamador aloca o PID via `registry::allocate_pid` e chama
    /// `registry::register_new` exatamente uma vez após a construção
    /// ter sucesso.
    pub fn new(
        pid: Pid,
        ppid: Pid,
        kind: ProcessKind,
        name: &'static str,
        jail: Option<Arc<Jail>>,
    ) -> Arc<Process> {
        Arc::new(Process {
            pid,
            ppid,
            kind,
            name,
            state: AtomicU8::new(ProcessState::Registered as u8),
            tracer: AtomicU32::new(0),
            jail,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn ppid(&self) -> Pid {
        self.ppid
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_dying(&self) -> bool {
        self.state() >= ProcessState::Dying
    }

    pub fn jail(&self) -> Option<&Arc<Jail>> {
        self.jail.as_ref()
    }

    pub fn is_jailed(&self) -> bool {
        self.jail.is_some()
    }

    /// PID de quem traça este processo, se houver.
    pub fn tracer(&self) -> Option<Pid> {
        match self.tracer.load(Ordering::Acquire) {
            0 => None,
            pid => Some(Pid::new(pid)),
        }
    }

    pub fn set_tracer(&self, tracer: Option<Pid>) {
        let value = match tracer {
            Some(pid) => pid.as_u32(),
            None => 0,
        };
        self.tracer.store(value, Ordering::Release);
    }

    /// Avança o estado. Regressão é violação de contrato (fatal);
    /// repetir o estado atual é no-op.
    pub(crate) fn advance_state(&self, new_state: ProcessState) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if (new_state as u8) < current {
                fatal("(PROC) regressao de estado de processo");
            }
            match self.state.compare_exchange_weak(
                current,
                new_state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}
