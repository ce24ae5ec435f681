/// Arquivo: core/smp/mod.rs
///
/// Propósito: Módulo de Multiprocessamento Simétrico (SMP).
/// Contexto de execução por CPU, descoberta de topologia e o protocolo
/// de mensageria entre processadores (callbacks, TLB shootdown, halt).
///
/// Módulos contidos:
/// - `percpu`: Contexto de execução por CPU.
/// - `message`: Arena de mensagens + filas lock-free por CPU.
/// - `ipi`: Inter-Processor Interrupts (camada de sinalização).
/// - `topology`: Detecção de Cores via MADT.

pub mod ipi;
pub mod message;
pub mod percpu;
pub mod topology;

#[cfg(feature = "self_test")]
pub mod test;
