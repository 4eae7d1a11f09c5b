//! Module table of the host image.

pub mod boot;
pub mod power;
pub mod timer;

use fwk::{Element, ModuleConfig, ModuleEntry};

pub const TIMER_IDX: usize = 0;
pub const POWER_IDX: usize = 1;
pub const BOOT_IDX: usize = 2;

static CPU0: power::DomainConfig = power::DomainConfig { initial_state: power::STATE_OFF };
static CPU1: power::DomainConfig = power::DomainConfig { initial_state: power::STATE_OFF };
static GPU: power::DomainConfig = power::DomainConfig { initial_state: power::STATE_OFF };

static POWER_DOMAINS: [Element; 3] = [
    Element { name: "cpu0", sub_element_count: 0, data: &CPU0 },
    Element { name: "cpu1", sub_element_count: 0, data: &CPU1 },
    Element { name: "gpu", sub_element_count: 0, data: &GPU },
];

/// Modules in index order.
pub fn table() -> Vec<ModuleEntry> {
    let modules = vec![
        ModuleEntry::new(Box::new(timer::Timer), ModuleConfig::new()),
        ModuleEntry::new(
            Box::new(power::Power::default()),
            ModuleConfig::new().with_elements(&POWER_DOMAINS),
        ),
        ModuleEntry::new(Box::new(boot::Boot::default()), ModuleConfig::new()),
    ];
    debug_assert_eq!(modules.len(), BOOT_IDX + 1);
    modules
}
