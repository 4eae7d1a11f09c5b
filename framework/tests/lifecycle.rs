//! End-to-end scenarios through the public framework API.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fwk::interrupt::{Isr, IsrParam};
use fwk::{
    Config, ConfigData, Element, Event, FwkError, FwkResult, Framework, Id, IdType,
    InterruptDriver, Module, ModuleConfig, ModuleDesc, ModuleEntry, ModuleType, Progress,
};

/// Driver without interrupt lines; only the current context is tracked.
#[derive(Default)]
struct ContextDriver {
    current: AtomicU32,
}

impl InterruptDriver for ContextDriver {
    fn global_enable(&self) -> FwkResult<()> {
        Ok(())
    }
    fn global_disable(&self) -> FwkResult<()> {
        Ok(())
    }
    fn is_enabled(&self, _interrupt: u32) -> FwkResult<bool> {
        Err(FwkError::Param)
    }
    fn enable(&self, _interrupt: u32) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn disable(&self, _interrupt: u32) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn is_pending(&self, _interrupt: u32) -> FwkResult<bool> {
        Err(FwkError::Param)
    }
    fn set_pending(&self, _interrupt: u32) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn clear_pending(&self, _interrupt: u32) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn set_isr_irq(&self, _interrupt: u32, _isr: Isr) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn set_isr_irq_param(&self, _interrupt: u32, _isr: IsrParam, _param: usize) -> FwkResult<()> {
        Err(FwkError::Param)
    }
    fn set_isr_nmi(&self, _isr: Isr) -> FwkResult<()> {
        Err(FwkError::Support)
    }
    fn set_isr_nmi_param(&self, _isr: IsrParam, _param: usize) -> FwkResult<()> {
        Err(FwkError::Support)
    }
    fn set_isr_fault(&self, _isr: Isr) -> FwkResult<()> {
        Err(FwkError::Support)
    }
    fn get_current(&self) -> FwkResult<u32> {
        match self.current.load(Ordering::Acquire) {
            0 => Err(FwkError::State),
            interrupt => Ok(interrupt),
        }
    }
    fn is_interrupt_context(&self) -> bool {
        self.current.load(Ordering::Acquire) != 0
    }
}

fn desc(name: &'static str, event_count: usize, notification_count: usize) -> ModuleDesc {
    ModuleDesc { name, kind: ModuleType::Service, api_count: 0, event_count, notification_count }
}

/// Module with elements that accepts everything and does nothing.
struct Plain(ModuleDesc);

impl Module for Plain {
    fn desc(&self) -> ModuleDesc {
        self.0
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn element_init(&mut self, _: &mut Framework, _: Id, _: usize, _: ConfigData) -> FwkResult<()> {
        Ok(())
    }
}

fn plain(name: &'static str) -> ModuleEntry {
    ModuleEntry::new(Box::new(Plain(desc(name, 0, 0))), ModuleConfig::new())
}

static DATA: u32 = 0;
static PAIR: [Element; 2] = [
    Element { name: "first", sub_element_count: 0, data: &DATA },
    Element { name: "second", sub_element_count: 0, data: &DATA },
];

fn started(modules: Vec<ModuleEntry>) -> Framework {
    let mut fwk = Framework::new(modules, Config::default()).unwrap();
    fwk.register_interrupt_driver(Arc::new(ContextDriver::default())).unwrap();
    fwk.start().unwrap();
    fwk
}

/// Element ids built from a module id match the literal encoding
#[test]
fn test_element_of_module_five() {
    let mut modules: Vec<ModuleEntry> = (0..5).map(|_| plain("filler")).collect();
    modules.push(ModuleEntry::new(
        Box::new(Plain(desc("a", 0, 0))),
        ModuleConfig::new().with_elements(&PAIR),
    ));
    let fwk = started(modules);

    let element = Id::module(5).build_element_id(1);
    assert_eq!(element, Id::element(5, 1));
    assert_eq!(element.module_idx(), 5);
    assert_eq!(element.element_idx(), 1);
    assert!(element.is_type(IdType::Element));
    assert!(!element.is_type(IdType::Module));

    assert!(fwk.is_valid_element_id(element));
    assert!(!fwk.is_valid_element_id(Id::element(5, 2)));
    assert_eq!(fwk.element_count(Id::module(5)), Ok(2));
    assert_eq!(fwk.name(element), Some("second"));
}

/// Requester of module B; records what comes back.
struct Requester {
    responses: Arc<Mutex<Vec<Event>>>,
}

impl Module for Requester {
    fn desc(&self) -> ModuleDesc {
        desc("requester", 1, 0)
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(&mut self, _: &mut Framework, event: &Event, _: &mut Event) -> FwkResult<Progress> {
        self.responses.lock().unwrap().push(*event);
        Ok(Progress::Done)
    }
}

/// Module B: answers later.
struct Deferred;

impl Module for Deferred {
    fn desc(&self) -> ModuleDesc {
        desc("b", 1, 0)
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn process_event(&mut self, _: &mut Framework, event: &Event, _: &mut Event) -> FwkResult<Progress> {
        if event.response_requested() {
            Ok(Progress::Pending)
        } else {
            Ok(Progress::Done)
        }
    }
}

/// A pending response is parked under its cookie and completed later
#[test]
fn test_delayed_response_of_module_b() {
    let responses = Arc::new(Mutex::new(Vec::new()));
    let mut fwk = started(vec![
        ModuleEntry::new(Box::new(Requester { responses: responses.clone() }), ModuleConfig::new()),
        ModuleEntry::new(Box::new(Deferred), ModuleConfig::new()),
    ]);
    let (requester, b) = (Id::module(0), Id::module(1));

    // Cookies count up from 1; six plain events make the request cookie 7.
    for _ in 0..6 {
        let mut warmup = Event::new(Id::event(1, 0), requester, b);
        fwk.put_event(&mut warmup).unwrap();
    }
    let mut request = Event::new(Id::event(1, 0), requester, b).with_response_requested();
    request.params[..4].copy_from_slice(&0xCAFEu32.to_le_bytes());
    fwk.put_event(&mut request).unwrap();
    assert_eq!(request.cookie, 7);
    fwk.process_event_queue();

    assert!(responses.lock().unwrap().is_empty());
    assert_eq!(fwk.is_delayed_response_list_empty(b), Ok(false));
    let parked = fwk.get_delayed_response(b, 7).unwrap();
    assert_eq!(parked.id, request.id);
    assert_eq!(parked.cookie, 7);
    assert_eq!(parked.params, request.params);
    assert_eq!((parked.source_id, parked.target_id), (b, requester));

    let mut completion = Event::new(Id::event(1, 0), b, Id::INVALID);
    completion.cookie = 7;
    completion.set_delayed_response();
    completion.params[0] = 0x55;
    fwk.put_event(&mut completion).unwrap();
    fwk.process_event_queue();

    assert_eq!(fwk.is_delayed_response_list_empty(b), Ok(true));
    let responses = responses.lock().unwrap();
    assert_eq!(responses.len(), 1, "exactly one response is delivered");
    assert!(responses[0].is_response());
    assert_eq!(responses[0].cookie, 7);
    assert_eq!(responses[0].params[0], 0x55);
    assert_eq!(fwk.get_delayed_response(b, 7), Err(FwkError::Param));
}

/// Raises its notification once every module is running.
struct Announcer {
    delivered: Arc<AtomicUsize>,
}

impl Module for Announcer {
    fn desc(&self) -> ModuleDesc {
        desc("announcer", 1, 1)
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, id: Id) -> FwkResult<()> {
        let mut kick = Event::new(Id::event(0, 0), id, id);
        fwk.put_event(&mut kick)
    }

    fn process_event(&mut self, fwk: &mut Framework, _: &Event, _: &mut Event) -> FwkResult<Progress> {
        let mut ready = Event::notification(Id::notification(0, 0), Id::INVALID);
        let count = fwk.notify(&mut ready)?;
        self.delivered.store(count, Ordering::Release);
        Ok(Progress::Done)
    }
}

/// Subscribes each element to the announcer during start.
struct Listener {
    seen: Arc<Mutex<Vec<Id>>>,
}

impl Module for Listener {
    fn desc(&self) -> ModuleDesc {
        desc("listener", 0, 0)
    }

    fn init(&mut self, _: &mut Framework, _: Id, _: usize, _: Option<ConfigData>) -> FwkResult<()> {
        Ok(())
    }

    fn element_init(&mut self, _: &mut Framework, _: Id, _: usize, _: ConfigData) -> FwkResult<()> {
        Ok(())
    }

    fn start(&mut self, fwk: &mut Framework, id: Id) -> FwkResult<()> {
        if id.is_type(IdType::Element) {
            fwk.subscribe(Id::notification(0, 0), Id::module(0), id)?;
        }
        Ok(())
    }

    fn process_notification(&mut self, _: &mut Framework, event: &Event, _: &mut Event) -> FwkResult<Progress> {
        self.seen.lock().unwrap().push(event.target_id);
        Ok(Progress::Done)
    }
}

/// Notification raised after startup reaches every subscriber
#[test]
fn test_notification_after_start() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut fwk = started(vec![
        ModuleEntry::new(Box::new(Announcer { delivered: delivered.clone() }), ModuleConfig::new()),
        ModuleEntry::new(
            Box::new(Listener { seen: seen.clone() }),
            ModuleConfig::new().with_elements(&PAIR),
        ),
    ]);
    assert_eq!(fwk.subscriber_count(Id::notification(0, 0), Id::module(0)), Ok(2));

    fwk.process_event_queue();
    assert_eq!(delivered.load(Ordering::Acquire), 2);
    assert_eq!(*seen.lock().unwrap(), vec![Id::element(1, 0), Id::element(1, 1)]);
    assert!(fwk.is_idle());
}

/// Interrupt-context submissions overtake queued thread events
#[test]
fn test_interrupt_events_first() {
    let responses = Arc::new(Mutex::new(Vec::new()));
    let driver = Arc::new(ContextDriver::default());
    let mut fwk = Framework::new(
        vec![
            ModuleEntry::new(Box::new(Requester { responses: responses.clone() }), ModuleConfig::new()),
            ModuleEntry::new(Box::new(Deferred), ModuleConfig::new()),
        ],
        Config::default(),
    )
    .unwrap();
    fwk.register_interrupt_driver(driver.clone()).unwrap();
    fwk.start().unwrap();

    let (requester, b) = (Id::module(0), Id::module(1));
    let mut thread = Event::new(Id::event(0, 0), b, requester);
    thread.params[0] = 1;
    fwk.put_event(&mut thread).unwrap();

    driver.current.store(7, Ordering::Release);
    let mut isr = Event::new(Id::event(0, 0), b, requester);
    isr.params[0] = 2;
    fwk.put_event(&mut isr).unwrap();
    driver.current.store(0, Ordering::Release);

    fwk.process_event_queue();
    let order: Vec<u8> = responses.lock().unwrap().iter().map(|e| e.params[0]).collect();
    assert_eq!(order, vec![2, 1]);
}
