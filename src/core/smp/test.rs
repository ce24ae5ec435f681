//! Testes de SMP (seções críticas + mensageria)

use super::message::{self, MessageKind, MessagePool, MessageQueue};
use super::percpu;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sync::Spinlock;
use crate::sys::Errno;
use alloc::vec::Vec;

const SMP_TESTS: &[TestCase] = &[
    TestCase::new("critical_nesting_law", test_critical_nesting_law),
    TestCase::new("critical_restore_idempotent", test_critical_restore_idempotent),
    TestCase::new("message_fifo_per_sender", test_message_fifo_per_sender),
    TestCase::new("pool_exhaustion_is_eagain", test_pool_exhaustion_is_eagain),
    TestCase::new("sync_completion_flag", test_sync_completion_flag),
    TestCase::new("send_to_self_runs_inline", test_send_to_self_runs_inline),
    TestCase::new("broadcast_without_peers", test_broadcast_without_peers),
];

pub fn run_smp_tests() {
    run_test_suite("SMP", SMP_TESTS);
}

fn test_critical_nesting_law() -> TestResult {
    let ctx = percpu::current();
    let before = ctx.critical_nesting();

    let level_a = ctx.enter_critical();
    let level_b = ctx.enter_critical();
    let level_c = ctx.enter_critical();

    if ctx.critical_nesting() != before + 3 {
        return TestResult::Failed;
    }
    if ctx.can_preempt() {
        return TestResult::Failed;
    }

    // Pop em ordem estrita
    ctx.restore_critical(level_c);
    ctx.restore_critical(level_b);
    ctx.restore_critical(level_a);

    if ctx.critical_nesting() != before {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_critical_restore_idempotent() -> TestResult {
    let ctx = percpu::current();
    let before = ctx.critical_nesting();

    let saved = ctx.enter_critical();
    ctx.restore_critical(saved);
    // Repetir com o MESMO valor salvo é no-op
    ctx.restore_critical(saved);

    if ctx.critical_nesting() != before {
        return TestResult::Failed;
    }
    TestResult::Passed
}

// Registro da ordem de execução dos callbacks
static RECORDED: Spinlock<Vec<usize>> = Spinlock::new(Vec::new());

fn record(arg: usize) {
    RECORDED.lock().push(arg);
}

fn test_message_fifo_per_sender() -> TestResult {
    RECORDED.lock().clear();

    let pool = MessagePool::new();
    pool.init(8);
    let queue = MessageQueue::new();

    // Mesmo emissor, mesma fila: M1..M4 em ordem de envio
    for arg in 0..4usize {
        let index = match pool.alloc(MessageKind::Callback { func: record, arg }, false) {
            Ok(index) => index,
            Err(_) => return TestResult::Failed,
        };
        queue.push(&pool, index);
    }

    let executed = message::drain_queue(&pool, &queue);
    if executed != 4 {
        return TestResult::Failed;
    }

    let recorded = RECORDED.lock();
    if *recorded != [0, 1, 2, 3] {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_pool_exhaustion_is_eagain() -> TestResult {
    // Capacidade 4: o quinto envio deve reportar esgotamento explícito,
    // nunca derrubar mensagem em silêncio.
    let pool = MessagePool::new();
    pool.init(4);
    let queue = MessageQueue::new();

    for arg in 0..4usize {
        let index = match pool.alloc(MessageKind::Callback { func: record, arg }, true) {
            Ok(index) => index,
            Err(_) => return TestResult::Failed,
        };
        queue.push(&pool, index);
    }

    match pool.alloc(MessageKind::Callback { func: record, arg: 4 }, true) {
        Err(Errno::EAGAIN) => {}
        _ => return TestResult::Failed,
    }

    // O receptor drena e os slots síncronos continuam do emissor até
    // a conclusão ser observada; aqui só checamos que nada se perdeu.
    RECORDED.lock().clear();
    if message::drain_queue(&pool, &queue) != 4 {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_sync_completion_flag() -> TestResult {
    let pool = MessagePool::new();
    pool.init(2);
    let queue = MessageQueue::new();

    let index = match pool.alloc(MessageKind::Callback { func: record, arg: 99 }, true) {
        Ok(index) => index,
        Err(_) => return TestResult::Failed,
    };
    queue.push(&pool, index);

    if pool.is_completed(index) {
        return TestResult::Failed;
    }
    message::drain_queue(&pool, &queue);
    if !pool.is_completed(index) {
        return TestResult::Failed;
    }
    // Envio síncrono: o emissor devolve o slot
    pool.free(index);
    TestResult::Passed
}

fn test_send_to_self_runs_inline() -> TestResult {
    RECORDED.lock().clear();
    let me = percpu::current();

    if message::send_to(me, MessageKind::Callback { func: record, arg: 7 }).is_err() {
        return TestResult::Failed;
    }
    if *RECORDED.lock() != [7] {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_broadcast_without_peers() -> TestResult {
    // Boot single-core: broadcast não tem alvos e retorna Ok direto
    if percpu::count() != 1 {
        return TestResult::Skipped;
    }
    match message::broadcast_sync(MessageKind::FlushTlb {
        base: 0xFFFF_8000_0000_0000,
        page_count: 1,
    }) {
        Ok(()) => TestResult::Passed,
        Err(_) => TestResult::Failed,
    }
}
