//! Testes do Registro de Interrupções
//!
//! Sondagem determinística da MADT com tabelas sintéticas em memória:
//! sem firmware -> PIC legacy; tabela sem IOAPIC -> PIC legacy; com
//! IOAPIC -> modo redirect. Mais parsing bit-exato e seleção de
//! controlador.

use crate::arch::x86_64::acpi::madt::{Madt, MadtEntry};
use crate::arch::x86_64::interrupts::{
    probe, ControllerKind, IdentityRouting, InterruptManagement, InterruptMode, IrqController,
    IsaOverride, RoutingPolicy,
};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use alloc::boxed::Box;
use alloc::vec::Vec;

const INTERRUPT_TESTS: &[TestCase] = &[
    TestCase::new("no_table_falls_back_to_pic", test_no_table_falls_back_to_pic),
    TestCase::new("table_without_ioapic_is_pic", test_table_without_ioapic_is_pic),
    TestCase::new("ioapic_entry_wins_probe", test_ioapic_entry_wins_probe),
    TestCase::new("override_entry_parsing", test_override_entry_parsing),
    TestCase::new("bad_checksum_rejected", test_bad_checksum_rejected),
    TestCase::new("identity_routing", test_identity_routing),
    TestCase::new("controller_selection", test_controller_selection),
];

pub fn run_interrupt_tests() {
    run_test_suite("Interrupcoes", INTERRUPT_TESTS);
}

// --- Construção de MADTs sintéticas ---

/// Monta uma MADT válida (assinatura, tamanho, checksum) com os
/// registros crus fornecidos.
fn make_madt(pcat_compat: bool, entries: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"APIC"); // assinatura
    buf.extend_from_slice(&0u32.to_le_bytes()); // length (preenchido depois)
    buf.push(3); // revision
    buf.push(0); // checksum (preenchido depois)
    buf.extend_from_slice(b"BRASA\0"); // oem_id
    buf.extend_from_slice(b"BRASAMDT"); // oem_table_id
    buf.extend_from_slice(&1u32.to_le_bytes()); // oem_revision
    buf.extend_from_slice(&0u32.to_le_bytes()); // creator_id
    buf.extend_from_slice(&0u32.to_le_bytes()); // creator_revision
    buf.extend_from_slice(&0xFEE0_0000u32.to_le_bytes()); // local_apic_address
    let flags: u32 = if pcat_compat { 1 } else { 0 };
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(entries);

    let length = buf.len() as u32;
    buf[4..8].copy_from_slice(&length.to_le_bytes());

    let sum = buf.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    buf[9] = 0u8.wrapping_sub(sum);
    buf
}

fn local_apic_entry(acpi_id: u8, apic_id: u8, enabled: bool) -> [u8; 8] {
    let flags: u32 = if enabled { 1 } else { 0 };
    let f = flags.to_le_bytes();
    [0, 8, acpi_id, apic_id, f[0], f[1], f[2], f[3]]
}

fn ioapic_entry(id: u8, address: u32, gsi_base: u32) -> [u8; 12] {
    let a = address.to_le_bytes();
    let g = gsi_base.to_le_bytes();
    [1, 12, id, 0, a[0], a[1], a[2], a[3], g[0], g[1], g[2], g[3]]
}

fn override_entry(irq: u8, gsi: u32, flags: u16) -> [u8; 10] {
    let g = gsi.to_le_bytes();
    let f = flags.to_le_bytes();
    [2, 10, 0, irq, g[0], g[1], g[2], g[3], f[0], f[1]]
}

fn parse(buf: &[u8]) -> Option<Madt> {
    // SAFETY: buffer vivo pela duração do teste
    unsafe { Madt::from_addr(buf.as_ptr() as u64) }
}

// --- Casos ---

fn test_no_table_falls_back_to_pic() -> TestResult {
    let plan = probe(None);
    if plan.mode != InterruptMode::PicOnly || !plan.keep_legacy {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_table_without_ioapic_is_pic() -> TestResult {
    // Só CPUs + PCAT_COMPAT: firmware presente, redirect ausente
    let mut entries = Vec::new();
    entries.extend_from_slice(&local_apic_entry(0, 0, true));
    entries.extend_from_slice(&local_apic_entry(1, 1, true));
    let buf = make_madt(true, &entries);

    let madt = match parse(&buf) {
        Some(m) => m,
        None => return TestResult::Failed,
    };
    let plan = probe(Some(&madt));
    if plan.mode != InterruptMode::PicOnly || !plan.ioapics.is_empty() {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_ioapic_entry_wins_probe() -> TestResult {
    let mut entries = Vec::new();
    entries.extend_from_slice(&local_apic_entry(0, 0, true));
    entries.extend_from_slice(&ioapic_entry(0, 0xFEC0_0000, 0));
    let buf = make_madt(true, &entries);

    let madt = match parse(&buf) {
        Some(m) => m,
        None => return TestResult::Failed,
    };
    if !madt.has_legacy_pic() {
        return TestResult::Failed;
    }

    let plan = probe(Some(&madt));
    if plan.mode != InterruptMode::IoApicMode {
        return TestResult::Failed;
    }
    if plan.ioapics.len() != 1 || plan.ioapics[0] != (0xFEC0_0000, 0) {
        return TestResult::Failed;
    }
    // PCAT_COMPAT: o PIC continua na lista (mascarado)
    if !plan.keep_legacy {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_override_entry_parsing() -> TestResult {
    // IRQ 0 -> GSI 2 (clássico do PIT); active low + level = 0b1111
    let mut entries = Vec::new();
    entries.extend_from_slice(&ioapic_entry(0, 0xFEC0_0000, 0));
    entries.extend_from_slice(&override_entry(0, 2, 0x000F));
    let buf = make_madt(true, &entries);

    let madt = match parse(&buf) {
        Some(m) => m,
        None => return TestResult::Failed,
    };

    let mut seen = false;
    for entry in madt.entries() {
        if let MadtEntry::InterruptOverride(iso) = entry {
            let gsi = iso.gsi;
            let irq_source = iso.irq_source;
            if irq_source != 0 || gsi != 2 {
                return TestResult::Failed;
            }
            if !iso.active_low() || !iso.level_triggered() {
                return TestResult::Failed;
            }
            seen = true;
        }
    }
    if !seen {
        return TestResult::Failed;
    }

    let plan = probe(Some(&madt));
    if plan.overrides.len() != 1 || plan.overrides[0].gsi != 2 {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_bad_checksum_rejected() -> TestResult {
    let mut buf = make_madt(true, &ioapic_entry(0, 0xFEC0_0000, 0));
    buf[9] = buf[9].wrapping_add(1); // corromper o checksum
    if parse(&buf).is_some() {
        return TestResult::Failed;
    }
    TestResult::Passed
}

fn test_identity_routing() -> TestResult {
    let routing = IdentityRouting;
    for value in [0u8, 1, 32, 48, 254] {
        if routing.mapped_vector(value) != value || routing.irq_for_vector(value) != value {
            return TestResult::Failed;
        }
    }
    TestResult::Passed
}

/// Controlador de mentira para exercitar a varredura de seleção.
struct FakeController {
    kind: ControllerKind,
    gsi_base: u32,
    enabled: bool,
}

impl IrqController for FakeController {
    fn kind(&self) -> ControllerKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    fn gsi_base(&self) -> u32 {
        self.gsi_base
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    unsafe fn enable(&self, _gsi: u32) {}
    unsafe fn disable(&self, _gsi: u32) {}
    unsafe fn eoi(&self, _gsi: u32) {}
}

fn test_controller_selection() -> TestResult {
    // Único controlador legacy: resposta direta
    let single: Vec<Box<dyn IrqController>> = alloc::vec![Box::new(FakeController {
        kind: ControllerKind::Legacy,
        gsi_base: 0,
        enabled: true,
    })];
    let im = InterruptManagement::new_for_test(InterruptMode::PicOnly, single, Vec::new());
    if im.controller_for(5).kind() != ControllerKind::Legacy {
        return TestResult::Failed;
    }

    // Dois chips redirect (base 24 e 0) + legacy desabilitado:
    // vetor 30 cai no chip de base 24; vetor 7 no de base 0.
    let many: Vec<Box<dyn IrqController>> = alloc::vec![
        Box::new(FakeController {
            kind: ControllerKind::Redirect,
            gsi_base: 24,
            enabled: true,
        }),
        Box::new(FakeController {
            kind: ControllerKind::Redirect,
            gsi_base: 0,
            enabled: true,
        }),
        Box::new(FakeController {
            kind: ControllerKind::Legacy,
            gsi_base: 0,
            enabled: false,
        }),
    ];
    let overrides = alloc::vec![IsaOverride {
        isa_irq: 0,
        gsi: 2,
        active_low: false,
        level_triggered: false,
    }];
    let im = InterruptManagement::new_for_test(InterruptMode::IoApicMode, many, overrides);

    let high = im.controller_for(30);
    if high.kind() != ControllerKind::Redirect || high.gsi_base() != 24 {
        return TestResult::Failed;
    }
    let low = im.controller_for(7);
    if low.gsi_base() != 0 || low.kind() != ControllerKind::Redirect {
        return TestResult::Failed;
    }

    if im.gsi_for_isa_irq(0) != 2 || im.gsi_for_isa_irq(4) != 4 {
        return TestResult::Failed;
    }
    TestResult::Passed
}
