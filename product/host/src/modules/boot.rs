//! Boot sequencer
//!
//! Powers up every domain once the system is running and reports when all
//! of them confirmed the transition, both through the response to its
//! request and through the domain's notification.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use fwk::{
    ConfigData, Event, FwkError, FwkResult, Framework, Id, Module, ModuleDesc, ModuleType,
    Progress,
};

use super::power;

static COMPLETE: AtomicBool = AtomicBool::new(false);

/// Whether every domain reported being on.
pub fn is_complete() -> bool {
    COMPLETE.load(Ordering::Acquire)
}

#[derive(Default)]
pub struct Boot {
    domains: usize,
    confirmed: usize,
    notified: usize,
}

impl Boot {
    fn check_complete(&self) {
        if self.domains > 0 && self.confirmed == self.domains && self.notified == self.domains {
            info!("[BOOT] {} domains on, boot complete", self.domains);
            COMPLETE.store(true, Ordering::Release);
        }
    }
}

impl Module for Boot {
    fn desc(&self) -> ModuleDesc {
        ModuleDesc {
            name: "boot",
            kind: ModuleType::Service,
            api_count: 0,
            event_count: 0,
            notification_count: 0,
        }
    }

    fn init(
        &mut self,
        _fwk: &mut Framework,
        _module_id: Id,
        _element_count: usize,
        _data: Option<ConfigData>,
    ) -> FwkResult<()> {
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, id: Id) -> FwkResult<()> {
        self.domains = fwk.element_count(power::MODULE)?;
        for domain in 0..self.domains {
            let domain_id = power::MODULE.build_element_id(domain);
            fwk.subscribe(power::NOTIFICATION_STATE_CHANGED, domain_id, id)?;

            let mut request =
                Event::new(power::EVENT_SET_STATE, id, domain_id).with_response_requested();
            request.write_params(&power::STATE_ON)?;
            fwk.put_event(&mut request)?;
        }
        Ok(())
    }

    fn process_event(&mut self, _fwk: &mut Framework, event: &Event, _response: &mut Event) -> FwkResult<Progress> {
        if !event.is_response() || event.id != power::EVENT_SET_STATE {
            return Err(FwkError::Param);
        }
        let state: u32 = event.read_params()?;
        if state != power::STATE_ON {
            warn!("[BOOT] {} answered with state {}", event.source_id, state);
            return Err(FwkError::PowerState);
        }
        self.confirmed += 1;
        self.check_complete();
        Ok(Progress::Done)
    }

    fn process_notification(
        &mut self,
        _fwk: &mut Framework,
        event: &Event,
        _response: &mut Event,
    ) -> FwkResult<Progress> {
        if event.id != power::NOTIFICATION_STATE_CHANGED {
            return Err(FwkError::Param);
        }
        if event.read_params::<u32>()? == power::STATE_ON {
            self.notified += 1;
            self.check_complete();
        }
        Ok(Progress::Done)
    }
}
