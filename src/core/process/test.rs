//! Testes do Registro de Processos

use super::registry;
use super::{Jail, Process, ProcessKind};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::sched::{self, SchedulerHooks};
use crate::sys::Pid;
use alloc::sync::Arc;
use alloc::vec::Vec;

const PROCESS_TESTS: &[TestCase] = &[
    TestCase::new("pid_allocation_monotonic", test_pid_allocation_monotonic),
    TestCase::new("jail_visibility_scoping", test_jail_visibility_scoping),
    TestCase::new("child_iteration_filter", test_child_iteration_filter),
    TestCase::new("lookup_respects_jail", test_lookup_respects_jail),
    TestCase::new("alive_count_exclusions", test_alive_count_exclusions),
    TestCase::new("iteration_error_short_circuit", test_iteration_error_short_circuit),
    TestCase::new("shutdown_converges", test_shutdown_converges),
];

pub fn run_process_tests() {
    run_test_suite("Processos", PROCESS_TESTS);
}

fn test_pid_allocation_monotonic() -> TestResult {
    // N alocações sequenciais: todas distintas e estritamente crescentes
    let mut previous = registry::allocate_pid().as_u32();
    for _ in 0..32 {
        let next = registry::allocate_pid().as_u32();
        if next <= previous {
            return TestResult::Failed;
        }
        previous = next;
    }
    TestResult::Passed
}

/// Coleta os PIDs visíveis ao chamador.
fn visible_pids(caller: &Arc<Process>) -> Vec<Pid> {
    let mut pids = Vec::new();
    let _ = registry::for_each_visible_to::<(), _>(caller, |process| {
        pids.push(process.pid());
        Ok(())
    });
    pids
}

fn test_jail_visibility_scoping() -> TestResult {
    // Cenário: três processos; o do meio em jail, os outros dois fora.
    let jail = Jail::new("teste-jail");
    let p_out_a = Process::new(Pid::new(1010), Pid::KERNEL, ProcessKind::User, "fora-a", None);
    let p_in = Process::new(
        Pid::new(1011),
        Pid::KERNEL,
        ProcessKind::User,
        "dentro",
        Some(jail.clone()),
    );
    let p_out_b = Process::new(Pid::new(1012), Pid::KERNEL, ProcessKind::User, "fora-b", None);

    registry::register_new(p_out_a.clone());
    registry::register_new(p_in.clone());
    registry::register_new(p_out_b.clone());

    // Visão de dentro da jail: exatamente {dentro}
    let from_inside = visible_pids(&p_in);
    let inside_ok = from_inside == [Pid::new(1011)];

    // Visão de fora: os dois de fora aparecem, o enjaulado nunca
    let from_outside = visible_pids(&p_out_a);
    let outside_ok = from_outside.contains(&Pid::new(1010))
        && from_outside.contains(&Pid::new(1012))
        && !from_outside.contains(&Pid::new(1011));

    let jail_count_ok = jail.member_count() == 1;

    registry::unregister(&p_out_a);
    registry::unregister(&p_in);
    registry::unregister(&p_out_b);

    // Unregister limpa a filiação da jail
    let detached_ok = jail.member_count() == 0;

    if inside_ok && outside_ok && jail_count_ok && detached_ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_child_iteration_filter() -> TestResult {
    let parent = Process::new(Pid::new(1020), Pid::KERNEL, ProcessKind::User, "pai", None);
    let child = Process::new(Pid::new(1021), parent.pid(), ProcessKind::User, "filho", None);
    let stranger = Process::new(Pid::new(1022), Pid::KERNEL, ProcessKind::User, "alheio", None);
    let tracee = Process::new(Pid::new(1023), Pid::KERNEL, ProcessKind::User, "tracee", None);
    tracee.set_tracer(Some(parent.pid()));

    registry::register_new(parent.clone());
    registry::register_new(child.clone());
    registry::register_new(stranger.clone());
    registry::register_new(tracee.clone());

    let mut pids = Vec::new();
    let _ = registry::for_each_child_visible_to::<(), _>(&parent, |process| {
        pids.push(process.pid());
        Ok(())
    });

    let ok = pids.contains(&child.pid())
        && pids.contains(&tracee.pid())
        && !pids.contains(&stranger.pid())
        && !pids.contains(&parent.pid());

    registry::unregister(&parent);
    registry::unregister(&child);
    registry::unregister(&stranger);
    registry::unregister(&tracee);

    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_lookup_respects_jail() -> TestResult {
    let jail = Jail::new("lookup-jail");
    let jailed = Process::new(
        Pid::new(1030),
        Pid::KERNEL,
        ProcessKind::User,
        "preso",
        Some(jail),
    );
    let free = Process::new(Pid::new(1031), Pid::KERNEL, ProcessKind::User, "livre", None);

    registry::register_new(jailed.clone());
    registry::register_new(free.clone());

    // De dentro da jail: o processo livre não existe
    let from_jail = registry::lookup_by_pid(&jailed, free.pid());
    // De fora: o enjaulado não existe, o livre sim
    let sees_jailed = registry::lookup_by_pid(&free, jailed.pid());
    let sees_itself = registry::lookup_by_pid(&free, free.pid());

    let ok = from_jail.is_none() && sees_jailed.is_none() && sees_itself.is_some();

    registry::unregister(&jailed);
    registry::unregister(&free);

    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_alive_count_exclusions() -> TestResult {
    let caller = Process::new(Pid::new(1040), Pid::KERNEL, ProcessKind::User, "eu", None);
    let user_a = Process::new(Pid::new(1041), Pid::KERNEL, ProcessKind::User, "u-a", None);
    let user_b = Process::new(Pid::new(1042), Pid::KERNEL, ProcessKind::User, "u-b", None);

    registry::register_new(caller.clone());
    registry::register_new(user_a.clone());
    registry::register_new(user_b.clone());

    // O chamador não conta a si mesmo
    let both = registry::alive_count(&caller, ProcessKind::User) == 2;

    // Morrendo deixa de contar como vivo
    user_a.advance_state(super::ProcessState::Dying);
    let one = registry::alive_count(&caller, ProcessKind::User) == 1;

    registry::unregister(&caller);
    registry::unregister(&user_a);
    registry::unregister(&user_b);

    if both && one {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_iteration_error_short_circuit() -> TestResult {
    let p_a = Process::new(Pid::new(1050), Pid::KERNEL, ProcessKind::User, "a", None);
    let p_b = Process::new(Pid::new(1051), Pid::KERNEL, ProcessKind::User, "b", None);

    registry::register_new(p_a.clone());
    registry::register_new(p_b.clone());

    // O primeiro erro interrompe e propaga intacto
    let mut visited = 0usize;
    let result = registry::for_each_visible_to::<&'static str, _>(&p_a, |_| {
        visited += 1;
        Err("parou")
    });

    let ok = result == Err("parou") && visited == 1;

    registry::unregister(&p_a);
    registry::unregister(&p_b);

    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

/// Stand-in do finalizador: cada yield do poll de shutdown colhe os
/// processos morrendo, como a task real faria entre escalonamentos.
fn reaping_yield() {
    registry::reap_dying_for_test();
}

fn noop_notify() {}

fn test_shutdown_converges() -> TestResult {
    let caller = Process::new(Pid::new(1060), Pid::KERNEL, ProcessKind::Kernel, "pwr", None);
    let user_a = Process::new(Pid::new(1061), Pid::KERNEL, ProcessKind::User, "app-a", None);
    let user_b = Process::new(Pid::new(1062), Pid::KERNEL, ProcessKind::User, "app-b", None);
    let user_c = Process::new(Pid::new(1063), Pid::KERNEL, ProcessKind::User, "app-c", None);

    registry::register_new(caller.clone());
    registry::register_new(user_a);
    registry::register_new(user_b);
    registry::register_new(user_c);

    sched::install_hooks(SchedulerHooks {
        yield_now: reaping_yield,
        notify_finalizer: noop_notify,
    });

    // Conjunto finito de processos + finalizador vivo => retorna
    registry::shutdown_all_user_processes(&caller);

    sched::clear_hooks();

    let converged = registry::alive_count(&caller, ProcessKind::User) == 0;
    registry::unregister(&caller);

    if converged {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}
