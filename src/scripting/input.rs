use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use rhai::{Engine, EvalAltResult, FnPtr};

use crate::scripting::error::BridgeError;

pub const KEY_DOWN: &str = "key_down";

/// Script callbacks registered through `on_<event>` methods, keyed by event name.
///
/// Owned by the script context; the `Input` singleton only holds a weak
/// reference so handlers capturing `Input` do not keep themselves alive.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RefCell<HashMap<&'static str, Vec<FnPtr>>>,
}

impl EventHandlers {
    pub fn register(&self, event: &'static str, handler: FnPtr) {
        self.handlers.borrow_mut().entry(event).or_default().push(handler);
    }

    /// Snapshot of the handlers so callbacks may register more while firing.
    pub fn handlers_for(&self, event: &str) -> Vec<FnPtr> {
        self.handlers.borrow().get(event).cloned().unwrap_or_default()
    }

    pub fn count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

/// The `Input` singleton, sole instance of `InputClass`.
#[derive(Clone)]
pub struct InputObject {
    handlers: Weak<EventHandlers>,
}

impl InputObject {
    pub fn new(handlers: &Rc<EventHandlers>) -> Self {
        Self { handlers: Rc::downgrade(handlers) }
    }

    fn on_key_down(&mut self, handler: FnPtr) -> Result<(), Box<EvalAltResult>> {
        let handlers = self.handlers.upgrade().ok_or(BridgeError::LevelUnloaded)?;
        handlers.register(KEY_DOWN, handler);
        Ok(())
    }

    fn construct() -> Result<InputObject, Box<EvalAltResult>> {
        Err(BridgeError::ConstructionForbidden("InputClass").into())
    }
}

pub fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<InputObject>("InputClass")
        .register_fn("InputClass", InputObject::construct)
        .register_fn("on_key_down", InputObject::on_key_down)
        .register_fn("to_string", |_: &mut InputObject| "#<InputClass>".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_forbidden() {
        let err = InputObject::construct().err().expect("construction must fail");
        assert!(err.to_string().contains("Cannot create instances of InputClass"), "{err}");
    }

    #[test]
    fn input_outliving_its_handlers_reports_unloaded_level() {
        let handlers = Rc::new(EventHandlers::default());
        let mut input = InputObject::new(&handlers);
        drop(handlers);
        let err = input.on_key_down(FnPtr::new("noop").expect("fn ptr")).err().expect("must fail");
        assert!(err.to_string().contains("unloaded"), "{err}");
    }
}
