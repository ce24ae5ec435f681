//! Jails (namespaces de processos)
//!
//! Uma jail limita quais processos um membro consegue ver/sinalizar/
//! esperar. O objeto é contado por referência entre os membros; a
//! gestão (criar/destruir jails, decidir filiação) é de quem chama -
//! o registro nunca cria nem destrói jails.
//!
//! Ordem de lock: tabela global de processos ANTES da lista da jail.

use super::Process;
use crate::sync::Spinlock;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct Jail {
    name: &'static str,
    /// Lista secundária: os processos membros, em ordem de inserção.
    members: Spinlock<Vec<Arc<Process>>>,
}

impl Jail {
    pub fn new(name: &'static str) -> Arc<Jail> {
        Arc::new(Jail {
            name,
            members: Spinlock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    /// Insere um membro. Chamado pelo registro dentro de register_new.
    pub(crate) fn attach(&self, process: &Arc<Process>) {
        self.members.lock().push(process.clone());
    }

    /// Remove um membro (limpa a filiação). Chamado no unregister.
    pub(crate) fn detach(&self, process: &Arc<Process>) {
        self.members
            .lock()
            .retain(|member| member.pid() != process.pid());
    }

    /// Acesso de leitura à lista de membros, sob o lock da jail.
    pub(crate) fn with_members<R>(&self, f: impl FnOnce(&[Arc<Process>]) -> R) -> R {
        let members = self.members.lock();
        f(&members)
    }
}
