use super::{ScriptMachine, ScriptOptions};
use crate::document::DocumentId;
use crate::session::{Interrupt, SessionAdapter};
use std::collections::HashMap;
use tracing::info;

/// One script machine per open document.
///
/// All machines share a single interrupt flag: the user cancels "whatever
/// is running", not a particular document.
pub struct Registry<S> {
    machines: HashMap<DocumentId, ScriptMachine<S>>,
    interrupt: Interrupt,
    options: ScriptOptions,
}

impl<S: SessionAdapter> Registry<S> {
    pub fn new(options: ScriptOptions) -> Self {
        Self {
            machines: HashMap::new(),
            interrupt: Interrupt::new(),
            options,
        }
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Machine for `id`, created on first use.
    pub fn open(&mut self, id: &DocumentId) -> &mut ScriptMachine<S> {
        let options = self.options;
        let interrupt = &self.interrupt;
        self.machines.entry(id.clone()).or_insert_with(|| {
            info!(document = %id, "script opened");
            ScriptMachine::new(options).with_interrupt(interrupt.clone())
        })
    }

    pub fn get(&self, id: &DocumentId) -> Option<&ScriptMachine<S>> {
        self.machines.get(id)
    }

    pub fn get_mut(&mut self, id: &DocumentId) -> Option<&mut ScriptMachine<S>> {
        self.machines.get_mut(id)
    }

    /// Stop and forget the machine for `id`.
    pub fn close(&mut self, id: &DocumentId) -> bool {
        match self.machines.remove(id) {
            Some(mut machine) => {
                machine.stop();
                info!(document = %id, "script closed");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for (id, mut machine) in self.machines.drain() {
            machine.stop();
            info!(document = %id, "script closed");
        }
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.machines.keys()
    }
}
