/// Arquivo: x86_64/interrupts.rs
///
/// Propósito: Registro de Controladores de Interrupção.
/// Decide, uma única vez no boot, qual hardware de roteamento existe
/// (PIC 8259 legacy vs. IOAPICs) e apresenta um mapeamento uniforme
/// IRQ<->vetor para o resto do kernel, independente de quem venceu.
///
/// Detalhes de Implementação:
/// - Máquina de estados: Uninitialized -> (sondagem da MADT) ->
///   PicOnly | IoApicMode. O modo não muda pela vida do boot.
/// - A sondagem (`probe`) é pura: decide o plano sem tocar hardware,
///   o que a torna testável com tabelas sintéticas.
/// - `init` aplica o plano: em IoApicMode os PICs são mascarados mas o
///   objeto legacy continua na lista (PCAT_COMPAT), desabilitado.
/// - Falha de firmware NUNCA é pânico: degrada para PicOnly. Interrupção
///   tem que subir até em hardware mínimo/emulado.

use super::acpi::madt::{Madt, MadtEntry};
use super::apic::ioapic::IoApic;
use super::apic::lapic;
use crate::drivers::pic::{PICS, PIC_IRQ_COUNT};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Once;

/// Modo de roteamento vencedor da sondagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptMode {
    /// Somente o 8259 (fallback universal).
    PicOnly,
    /// IOAPICs ativos; PICs mascarados.
    IoApicMode,
}

/// Tipo de um controlador na lista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Legacy,
    Redirect,
}

/// Um controlador de interrupções registrado.
///
/// Drivers de dispositivo só enxergam esta interface: pedem o
/// controlador responsável pelo seu vetor e habilitam a linha.
pub trait IrqController: Send + Sync {
    fn kind(&self) -> ControllerKind;
    fn name(&self) -> &'static str;
    /// Primeira GSI atendida por este controlador.
    fn gsi_base(&self) -> u32;
    /// O controlador está utilizável (não mascarado pelo registro)?
    fn is_enabled(&self) -> bool;
    /// Habilita a linha da GSI dada.
    ///
    /// # Safety
    /// O vetor mapeado precisa de handler instalado.
    unsafe fn enable(&self, gsi: u32);
    /// Mascara a linha da GSI dada.
    ///
    /// # Safety
    /// Mascarar linha compartilhada afeta todos os dispositivos nela.
    unsafe fn disable(&self, gsi: u32);
    /// Sinaliza End-of-Interrupt para a linha.
    ///
    /// # Safety
    /// Chamar fora de um handler corrompe o estado de prioridade.
    unsafe fn eoi(&self, gsi: u32);
}

/// Política de tradução IRQ <-> vetor.
///
/// Hoje a única implementação é a identidade; a costura existe para um
/// esquema multi-controlador não-identidade entrar sem tocar os
/// chamadores.
pub trait RoutingPolicy: Send + Sync {
    fn mapped_vector(&self, irq: u8) -> u8;
    fn irq_for_vector(&self, vector: u8) -> u8;
}

/// Mapeamento 1:1 (ver Questões Abertas no DESIGN.md).
pub struct IdentityRouting;

impl RoutingPolicy for IdentityRouting {
    fn mapped_vector(&self, irq: u8) -> u8 {
        irq
    }

    fn irq_for_vector(&self, vector: u8) -> u8 {
        vector
    }
}

/// Override ISA IRQ -> GSI vindo da MADT (tipo 2).
/// Populado uma vez na sondagem, imutável depois.
#[derive(Debug, Clone, Copy)]
pub struct IsaOverride {
    pub isa_irq: u8,
    pub gsi: u32,
    pub active_low: bool,
    pub level_triggered: bool,
}

/// Plano decidido pela sondagem, antes de tocar hardware.
pub struct ProbePlan {
    pub mode: InterruptMode,
    /// PCAT_COMPAT: manter o objeto PIC vivo (mascarado) mesmo em IoApicMode.
    pub keep_legacy: bool,
    /// (endereço MMIO, GSI base) de cada IOAPIC anunciado.
    pub ioapics: Vec<(u64, u32)>,
    pub overrides: Vec<IsaOverride>,
}

/// Sonda a MADT e decide o modo de roteamento. Função pura.
///
/// - Sem tabela: PicOnly.
/// - Tabela sem nenhum IOAPIC (mesmo anunciando PCAT_COMPAT): PicOnly.
/// - Ao menos um IOAPIC: IoApicMode.
pub fn probe(madt: Option<&Madt>) -> ProbePlan {
    let mut plan = ProbePlan {
        mode: InterruptMode::PicOnly,
        keep_legacy: true,
        ioapics: Vec::new(),
        overrides: Vec::new(),
    };

    let madt = match madt {
        Some(m) => m,
        None => {
            crate::kinfo!("(IRQ) Sem MADT: modo PIC legacy");
            return plan;
        }
    };

    plan.keep_legacy = madt.has_legacy_pic();

    for entry in madt.entries() {
        match entry {
            MadtEntry::IoApic(ioapic) => {
                plan.ioapics.push((
                    ioapic.io_apic_address as u64,
                    ioapic.global_system_interrupt_base,
                ));
            }
            MadtEntry::InterruptOverride(iso) => {
                plan.overrides.push(IsaOverride {
                    isa_irq: iso.irq_source,
                    gsi: iso.gsi,
                    active_low: iso.active_low(),
                    level_triggered: iso.level_triggered(),
                });
            }
            MadtEntry::LocalApic(_) | MadtEntry::Other { .. } => {}
        }
    }

    if plan.ioapics.is_empty() {
        // Tabela presente mas nenhum hardware de redirecionamento:
        // mesmo caminho do firmware ausente.
        crate::kinfo!("(IRQ) MADT sem IOAPIC: modo PIC legacy");
        plan.keep_legacy = true;
        return plan;
    }

    plan.mode = InterruptMode::IoApicMode;
    plan
}

// --- Controladores concretos ---

/// Adaptador do 8259 para a lista de controladores.
struct PicController {
    enabled: AtomicBool,
}

impl IrqController for PicController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Legacy
    }

    fn name(&self) -> &'static str {
        "PIC-8259"
    }

    fn gsi_base(&self) -> u32 {
        0
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    unsafe fn enable(&self, gsi: u32) {
        if gsi < PIC_IRQ_COUNT as u32 {
            PICS.lock().unmask(gsi as u8);
        }
    }

    unsafe fn disable(&self, gsi: u32) {
        if gsi < PIC_IRQ_COUNT as u32 {
            PICS.lock().mask(gsi as u8);
        }
    }

    unsafe fn eoi(&self, gsi: u32) {
        PICS.lock().notify_eoi(gsi as u8);
    }
}

/// Adaptador de um chip IOAPIC para a lista de controladores.
struct IoApicController {
    chip: IoApic,
}

impl IrqController for IoApicController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Redirect
    }

    fn name(&self) -> &'static str {
        "IOAPIC"
    }

    fn gsi_base(&self) -> u32 {
        self.chip.gsi_base()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    unsafe fn enable(&self, gsi: u32) {
        self.chip.set_masked(gsi, false);
    }

    unsafe fn disable(&self, gsi: u32) {
        self.chip.set_masked(gsi, true);
    }

    unsafe fn eoi(&self, _gsi: u32) {
        // Em modo IOAPIC o ack é no LAPIC local
        lapic::eoi();
    }
}

/// Registro global de controladores de interrupção.
pub struct InterruptManagement {
    mode: InterruptMode,
    /// Ordenada por GSI base DECRESCENTE: a primeira habilitada com
    /// base <= irq é a responsável.
    controllers: Vec<Box<dyn IrqController>>,
    overrides: Vec<IsaOverride>,
    routing: Box<dyn RoutingPolicy>,
}

static INTERRUPTS: Once<InterruptManagement> = Once::new();

/// Aplica o plano da sondagem e publica o singleton.
///
/// # Safety
/// Boot single-core, interrupções desabilitadas, PIC/IOAPIC mapeados.
pub unsafe fn init(madt: Option<&Madt>) {
    let plan = probe(madt);
    let mut controllers: Vec<Box<dyn IrqController>> = Vec::new();

    match plan.mode {
        InterruptMode::PicOnly => {
            PICS.lock().init();
            controllers.push(Box::new(PicController {
                enabled: AtomicBool::new(true),
            }));
            crate::kinfo!("(IRQ) Modo: PIC legacy");
        }
        InterruptMode::IoApicMode => {
            // Desabilitar o legacy em hardware antes de ligar os IOAPICs
            {
                let mut pics = PICS.lock();
                pics.init();
                pics.mask_all();
            }
            if plan.keep_legacy {
                controllers.push(Box::new(PicController {
                    enabled: AtomicBool::new(false),
                }));
            }

            for &(base, gsi_base) in &plan.ioapics {
                controllers.push(Box::new(IoApicController {
                    chip: IoApic::new(base, gsi_base),
                }));
            }

            lapic::init();
            crate::kinfo!("(IRQ) Modo: IOAPIC, chips=", plan.ioapics.len() as u64);
        }
    }

    // Primeiro match da varredura deve ser o chip de base mais alta
    controllers.sort_by(|a, b| b.gsi_base().cmp(&a.gsi_base()));

    INTERRUPTS.call_once(|| InterruptManagement {
        mode: plan.mode,
        controllers,
        overrides: plan.overrides,
        routing: Box::new(IdentityRouting),
    });
}

#[cfg(feature = "self_test")]
impl InterruptManagement {
    /// Monta um registro avulso para os self tests (sem hardware).
    pub fn new_for_test(
        mode: InterruptMode,
        controllers: Vec<Box<dyn IrqController>>,
        overrides: Vec<IsaOverride>,
    ) -> InterruptManagement {
        InterruptManagement {
            mode,
            controllers,
            overrides,
            routing: Box::new(IdentityRouting),
        }
    }
}

/// Acesso ao registro. Consultar antes de `init` é erro de programação.
pub fn the() -> &'static InterruptManagement {
    match INTERRUPTS.get() {
        Some(im) => im,
        None => crate::core::panic::fatal("(IRQ) registro consultado antes de init"),
    }
}

impl InterruptManagement {
    pub fn mode(&self) -> InterruptMode {
        self.mode
    }

    /// Vetor de CPU para uma IRQ. Identidade hoje (costura RoutingPolicy).
    pub fn mapped_vector(&self, irq: u8) -> u8 {
        self.routing.mapped_vector(irq)
    }

    /// IRQ de origem de um vetor. Identidade hoje (costura RoutingPolicy).
    pub fn irq_for_vector(&self, vector: u8) -> u8 {
        self.routing.irq_for_vector(vector)
    }

    /// GSI de uma IRQ ISA, honrando os overrides da MADT.
    pub fn gsi_for_isa_irq(&self, irq: u8) -> u32 {
        for ov in &self.overrides {
            if ov.isa_irq == irq {
                return ov.gsi;
            }
        }
        irq as u32
    }

    /// Overrides ISA anunciados pelo firmware.
    pub fn isa_overrides(&self) -> &[IsaOverride] {
        &self.overrides
    }

    /// Controlador responsável por um vetor.
    ///
    /// Único controlador legacy: resposta direta. Senão, primeiro
    /// controlador habilitado cuja GSI base <= IRQ do vetor. Vetor sem
    /// dono é bug de configuração, não condição recuperável.
    pub fn controller_for(&self, vector: u8) -> &dyn IrqController {
        if self.controllers.len() == 1 {
            return self.controllers[0].as_ref();
        }

        let irq = self.irq_for_vector(vector);
        for controller in &self.controllers {
            if controller.is_enabled() && controller.gsi_base() <= irq as u32 {
                return controller.as_ref();
            }
        }

        crate::core::panic::fatal("(IRQ) vetor sem controlador responsavel")
    }
}
