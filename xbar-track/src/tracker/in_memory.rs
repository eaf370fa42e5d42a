// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::Id;
use crate::tracker::{EntityManager, Track};

/// A [`Track`] event along with the entity and time at which it happened.
#[derive(Debug, Clone)]
pub struct EventCommon {
    /// The [`Id`] of the event originator.
    pub id: Id,

    /// The time at which the event occurred.
    pub time_ns: f64,

    /// Any event-specific state.
    pub event: Event,
}

/// The events retained by the [`InMemoryTracker`].
#[derive(Debug, Clone)]
pub enum Event {
    /// An object was created.
    Create {
        /// Object created.
        created: Id,
        /// Size of the object.
        num_bytes: usize,
    },
    /// A log message.
    Log {
        /// Level of the message.
        level: log::Level,
        /// Formatted message.
        text: String,
    },
    /// An object entered the entity.
    Enter {
        /// Object entered.
        entered: Id,
    },
    /// An object left the entity.
    Exit {
        /// Object exited.
        exited: Id,
    },
}

#[derive(Default)]
struct TrackedState {
    events: Vec<EventCommon>,
    name_to_id: HashMap<String, Id>,
}

/// A tracker that keeps all events in memory so that they can be analysed
/// once a simulation completes.
pub struct InMemoryTracker {
    entity_manager: EntityManager,
    state: RefCell<TrackedState>,
}

impl InMemoryTracker {
    /// Create a new [`InMemoryTracker`] with an [`EntityManager`].
    #[must_use]
    pub fn new(entity_manager: EntityManager) -> Self {
        Self {
            entity_manager,
            state: RefCell::new(TrackedState::default()),
        }
    }

    fn add_event(&self, id: Id, event: Event) {
        let time_ns = self.entity_manager.time();
        self.state.borrow_mut().events.push(EventCommon { id, time_ns, event });
    }

    /// Return the [`Id`] of the entity with the given full name.
    #[must_use]
    pub fn id_for_name(&self, name: &str) -> Option<Id> {
        self.state.borrow().name_to_id.get(name).copied()
    }

    /// Number of objects that have entered the entity.
    #[must_use]
    pub fn num_entered(&self, id: Id) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| e.id == id && matches!(e.event, Event::Enter { .. }))
            .count()
    }

    /// Number of objects that have exited the entity.
    #[must_use]
    pub fn num_exited(&self, id: Id) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| e.id == id && matches!(e.event, Event::Exit { .. }))
            .count()
    }

    /// Times at which objects entered the entity.
    #[must_use]
    pub fn enter_times_ns(&self, id: Id) -> Vec<f64> {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| e.id == id && matches!(e.event, Event::Enter { .. }))
            .map(|e| e.time_ns)
            .collect()
    }

    /// All log messages emitted at exactly the given level.
    #[must_use]
    pub fn messages_at(&self, level: log::Level) -> Vec<String> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match &e.event {
                Event::Log { level: l, text } if *l == level => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// A copy of every event recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<EventCommon> {
        self.state.borrow().events.clone()
    }
}

impl Track for InMemoryTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.entity_manager.is_log_enabled_at_level(id, level)
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.entity_manager.add_entity(id, entity_name);
        self.state
            .borrow_mut()
            .name_to_id
            .insert(entity_name.to_owned(), id);
    }

    fn enter(&self, id: Id, object: Id) {
        self.add_event(id, Event::Enter { entered: object });
    }

    fn exit(&self, id: Id, object: Id) {
        self.add_event(id, Event::Exit { exited: object });
    }

    fn create(&self, created_by: Id, id: Id, num_bytes: usize, _name: &str) {
        self.add_event(
            created_by,
            Event::Create {
                created: id,
                num_bytes,
            },
        );
    }

    fn destroy(&self, _destroyed_by: Id, _id: Id) {}

    fn connect(&self, _connect_from: Id, _connect_to: Id) {}

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.add_event(
            id,
            Event::Log {
                level,
                text: msg.to_string(),
            },
        );
    }

    fn time(&self, _set_by: Id, time_ns: f64) {
        self.entity_manager.set_time(time_ns);
    }

    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::entity::{Entity, toplevel};
    use crate::{Tracker, enter, exit, set_time, warn};

    #[test]
    fn counts_and_times() {
        let in_memory = Rc::new(InMemoryTracker::new(EntityManager::new(log::Level::Trace)));
        let tracker: Tracker = in_memory.clone();
        let top = toplevel(&tracker, "top");
        let port = Entity::new(&top, "port");

        set_time!(top ; 2.0);
        enter!(port ; Id(100));
        set_time!(top ; 5.0);
        enter!(port ; Id(101));
        exit!(port ; Id(100));
        warn!(port ; "stalled {} ticks", 3);

        let id = in_memory.id_for_name("top::port").unwrap();
        assert_eq!(id, port.id);
        assert_eq!(in_memory.num_entered(id), 2);
        assert_eq!(in_memory.num_exited(id), 1);
        assert_eq!(in_memory.enter_times_ns(id), vec![2.0, 5.0]);
        assert_eq!(in_memory.messages_at(log::Level::Warn), vec!["stalled 3 ticks"]);
    }
}
