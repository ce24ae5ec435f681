//! Framework de testes do kernel

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa suite de testes
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite ===");
    crate::drivers::serial::emit_str("        suite: ");
    crate::drivers::serial::emit_str(name);
    crate::drivers::serial::emit_nl();

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        let result = (test.func)();
        let tag = match result {
            TestResult::Passed => {
                passed += 1;
                "  [PASS] "
            }
            TestResult::Failed => {
                failed += 1;
                "  [FAIL] "
            }
            TestResult::Skipped => {
                skipped += 1;
                "  [SKIP] "
            }
        };
        crate::drivers::serial::emit_str(tag);
        crate::drivers::serial::emit_str(test.name);
        crate::drivers::serial::emit_nl();
    }

    if failed > 0 {
        crate::kerror!("Suite com falhas, failed=", failed as u64);
    } else {
        crate::kinfo!("Suite OK, passed=", passed as u64);
    }
    (passed, failed, skipped)
}
