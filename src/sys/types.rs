//! Tipos fundamentais do sistema
//!
//! PID, TID, PGID e SID saem todos do MESMO alocador do registro de
//! processos, então compartilham o espaço numérico.

/// Process ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Pid(pub u32);

impl Pid {
    pub const KERNEL: Pid = Pid(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Thread ID
///
/// Identidade opaca de uma thread na tabela do scheduler. O núcleo só
/// guarda o valor; quem resolve para a thread real é o scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Tid(pub u32);

impl Tid {
    /// Valor reservado: "nenhuma thread".
    pub const NONE: Tid = Tid(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Process Group ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Pgid(pub u32);

impl Pgid {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Session ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Sid(pub u32);

impl Sid {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}
