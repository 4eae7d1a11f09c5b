//! Module contexts
//!
//! Per-module runtime state: the handler, its resolved element table and
//! lifecycle states. A handler is taken out of its context while one of its
//! methods runs and put back afterwards; an empty slot means the module is
//! executing.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use log::error;

use super::topology::Topology;
use super::{ConfigData, Element, ElementTable, Module, ModuleDesc, ModuleEntry, ModuleState};
use crate::id::{
    Id, IdKind, API_IDX_MAX, ELEMENT_IDX_MAX, EVENT_IDX_MAX, MODULE_IDX_MAX, NOTIFICATION_IDX_MAX,
    SUB_ELEMENT_IDX_MAX,
};
use crate::status::{FwkError, FwkResult};

pub(crate) struct ModuleContext {
    pub handler: Option<Box<dyn Module>>,
    pub desc: ModuleDesc,
    pub data: Option<ConfigData>,
    pub elements: &'static [Element],
    pub state: ModuleState,
    pub element_states: Vec<ModuleState>,
}

#[derive(Default)]
pub(crate) struct Registry {
    modules: Vec<ModuleContext>,
}

fn resolve_elements(module_id: Id, table: ElementTable) -> FwkResult<&'static [Element]> {
    match table {
        ElementTable::None => Ok(&[]),
        ElementTable::Static(elements) => Ok(elements),
        ElementTable::Generator(generate) => generate(module_id).ok_or_else(|| {
            error!("[MOD] element generator of {} returned nothing", module_id);
            FwkError::Param
        }),
    }
}

fn check_desc(module_id: Id, desc: &ModuleDesc, elements: &[Element]) -> FwkResult<()> {
    let in_range = desc.api_count <= API_IDX_MAX
        && desc.event_count <= EVENT_IDX_MAX
        && desc.notification_count <= NOTIFICATION_IDX_MAX
        && elements.len() <= ELEMENT_IDX_MAX
        && elements.iter().all(|e| e.sub_element_count <= SUB_ELEMENT_IDX_MAX);
    if !in_range {
        error!("[MOD] {} ({}) exceeds identifier ranges", module_id, desc.name);
        return Err(FwkError::Param);
    }
    Ok(())
}

impl Registry {
    /// Resolves element tables and checks every module against the
    /// identifier ranges.
    pub fn build(entries: Vec<ModuleEntry>) -> FwkResult<(Registry, Topology)> {
        if entries.len() > MODULE_IDX_MAX {
            error!("[MOD] {} modules exceed the module index range", entries.len());
            return Err(FwkError::Param);
        }

        let mut modules = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            let module_id = Id::module(idx);
            let desc = entry.handler.desc();
            let elements = resolve_elements(module_id, entry.config.elements)?;
            check_desc(module_id, &desc, elements)?;

            modules.push(ModuleContext {
                handler: Some(entry.handler),
                desc,
                data: entry.config.data,
                elements,
                state: ModuleState::Uninitialized,
                element_states: vec![ModuleState::Uninitialized; elements.len()],
            });
        }

        let topology = Topology::new(modules.iter().map(|m| {
            (
                m.desc.api_count,
                m.desc.event_count,
                m.desc.notification_count,
                m.elements.iter().map(|e| e.sub_element_count).collect(),
            )
        }));
        Ok((Registry { modules }, topology))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn get(&self, module_idx: usize) -> Option<&ModuleContext> {
        self.modules.get(module_idx)
    }

    pub fn get_mut(&mut self, module_idx: usize) -> Option<&mut ModuleContext> {
        self.modules.get_mut(module_idx)
    }

    /// Context of the module owning `id`, for any module-bearing id.
    pub fn context(&self, id: Id) -> Option<&ModuleContext> {
        self.get(id.try_module_idx()?)
    }

    pub fn take_handler(&mut self, module_idx: usize) -> Option<Box<dyn Module>> {
        self.modules.get_mut(module_idx)?.handler.take()
    }

    pub fn restore_handler(&mut self, module_idx: usize, handler: Box<dyn Module>) {
        if let Some(ctx) = self.modules.get_mut(module_idx) {
            ctx.handler = Some(handler);
        }
    }

    /// State of a module, element or sub-element. Sub-elements report their
    /// element's state. The id must already be validated.
    pub fn state(&self, id: Id) -> Option<ModuleState> {
        match id.decode() {
            IdKind::Module { module } => Some(self.get(module)?.state),
            IdKind::Element { module, element } | IdKind::SubElement { module, element, .. } => {
                self.get(module)?.element_states.get(element).copied()
            }
            _ => None,
        }
    }

    pub fn set_state(&mut self, id: Id, state: ModuleState) {
        match id.decode() {
            IdKind::Module { module } => {
                if let Some(ctx) = self.get_mut(module) {
                    ctx.state = state;
                }
            }
            IdKind::Element { module, element } => {
                if let Some(slot) =
                    self.get_mut(module).and_then(|ctx| ctx.element_states.get_mut(element))
                {
                    *slot = state;
                }
            }
            _ => {}
        }
    }

    /// Sum over modules of `per_entity(desc)` for the module and each of its
    /// elements.
    pub fn entity_weighted_sum<F>(&self, per_entity: F) -> usize
    where
        F: Fn(&ModuleDesc) -> usize,
    {
        self.modules
            .iter()
            .map(|ctx| per_entity(&ctx.desc) * (1 + ctx.elements.len()))
            .sum()
    }
}
