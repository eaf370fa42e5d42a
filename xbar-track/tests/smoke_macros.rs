// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Ensure that all version of each macro can be used

use std::rc::Rc;

use xbar_track::entity::{Entity, toplevel};
use xbar_track::id::Unique;
use xbar_track::{
    Id, connect, create, create_id, debug, enter, error, exit, info, set_time, test_helpers,
    test_init, trace, warn,
};

macro_rules! build_with_entity {
    ($name:ident, $macro:ident, $slvl:expr) => (
        #[test]
        fn $name() {
            let (test_tracker, tracker) = test_init!(100);

            let top = toplevel(&tracker, "top");
            test_helpers::check_and_clear(&test_tracker, &["0: created 100, top, 0 bytes"]);
            assert_eq!(top.id, Id(100));

            $macro!(top ; "Log with no args");
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl, ": Log with no args")]);

            $macro!(top ; "Log with {} argument", 1);
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl, ": Log with 1 argument")]);

            $macro!(top ; "Log with {}, {} arguments", 1, 1 + 1);
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl, ": Log with 1, 2 arguments")]);

            drop(top);
            test_helpers::check_and_clear(&test_tracker, &["0: destroyed 100"]);
        }
    );
}

build_with_entity!(trace_with_entity, trace, "TRACE");
build_with_entity!(info_with_entity, info, "INFO");
build_with_entity!(debug_with_entity, debug, "DEBUG");
build_with_entity!(warn_with_entity, warn, "WARN");
build_with_entity!(error_with_entity, error, "ERROR");

#[derive(Debug)]
struct Frame {
    id: Id,
    len: usize,
}

impl Unique for Frame {
    fn id(&self) -> Id {
        self.id
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {}B", self.len)
    }
}

#[test]
fn create_enter_exit() {
    let (test_tracker, tracker) = test_init!(40);

    let top = toplevel(&tracker, "top");
    let frame = Frame {
        id: create_id!(top),
        len: 64,
    };
    create!(top ; frame, frame.len);
    enter!(top ; frame.id());
    exit!(top ; frame.id());
    test_helpers::check_and_clear(
        &test_tracker,
        &[
            "0: created 40, top, 0 bytes",
            "40: created 41, frame 64B, 64 bytes",
            "40: 41 entered",
            "40: 41 exited",
        ],
    );
}

#[test]
fn hierarchy_and_connect() {
    let (test_tracker, tracker) = test_init!(1);

    let top = toplevel(&tracker, "top");
    let src = Rc::new(Entity::new(&top, "source"));
    let dst = Entity::new(&top, "sink");
    connect!(src ; dst);
    set_time!(top ; 1.5);

    test_helpers::check_and_clear(
        &test_tracker,
        &[
            "0: created 1, top, 0 bytes",
            "1: created 2, top::source, 0 bytes",
            "1: created 3, top::sink, 0 bytes",
            "2: connect to 3",
            "1: set time 1.5ns",
        ],
    );
}
