//! `TimerHost` over `gloo_timers` timeouts.
//!
//! Each armed slot owns a [`Timeout`]; dropping it clears the browser timer.
//! The slot map is shared with the callbacks so a fired timeout can disarm
//! itself without borrowing the controller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use ds_core::timer::{TimerHost, TimerSlot};
use gloo_timers::callback::Timeout;

use crate::WebController;

type Slots = Rc<RefCell<HashMap<TimerSlot, Timeout>>>;

pub struct WebTimers {
    target: Weak<RefCell<WebController>>,
    armed: Slots,
}

impl WebTimers {
    pub fn new() -> Self {
        Self {
            target: Weak::new(),
            armed: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Point fired timers at the controller that owns these timers.
    pub fn bind(&mut self, target: Weak<RefCell<WebController>>) {
        self.target = target;
    }
}

impl Default for WebTimers {
    fn default() -> Self {
        Self::new()
    }
}

fn arm(armed: &Slots, target: Weak<RefCell<WebController>>, slot: TimerSlot, delay_ms: u64) {
    let slots = Rc::downgrade(armed);
    let delay = u32::try_from(delay_ms).unwrap_or(u32::MAX);
    let timeout = Timeout::new(delay, move || fire(&target, &slots, slot));
    // Replacing an armed timeout drops it, which clears it.
    armed.borrow_mut().insert(slot, timeout);
}

fn fire(target: &Weak<RefCell<WebController>>, slots: &Weak<RefCell<HashMap<TimerSlot, Timeout>>>, slot: TimerSlot) {
    let armed = match slots.upgrade() {
        Some(armed) => armed,
        None => return,
    };
    let fired = armed.borrow_mut().remove(&slot);

    let controller = match target.upgrade() {
        Some(controller) => controller,
        None => return,
    };
    let busy = match controller.try_borrow_mut() {
        Ok(mut controller) => {
            controller.on_timer(slot);
            false
        }
        Err(_) => true,
    };
    // A busy controller is mid-call on this stack. Try again on the next
    // task unless that call already re-armed the slot.
    if busy && !armed.borrow().contains_key(&slot) {
        log::debug!("Controller busy, re-arming {:?}", slot);
        arm(&armed, target.clone(), slot, 0);
    }
    drop(fired);
}

impl TimerHost for WebTimers {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn schedule(&mut self, slot: TimerSlot, delay_ms: u64) {
        arm(&self.armed, self.target.clone(), slot, delay_ms);
    }

    fn cancel(&mut self, slot: TimerSlot) {
        self.armed.borrow_mut().remove(&slot);
    }

    fn is_pending(&self, slot: TimerSlot) -> bool {
        self.armed.borrow().contains_key(&slot)
    }
}

