// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use xbar_components::arbiter::Arbiter;
use xbar_components::arbiter::policy::RoundRobin;
use xbar_engine::test_helpers::start_test;

fn round_robin_arbiter(engine: &xbar_engine::engine::Engine, n: usize) -> Arbiter {
    Arbiter::new(engine.top(), "arb", n, Box::new(RoundRobin::new(n)))
}

#[test]
fn all_requesting_share_equally() {
    let engine = start_test(file!());
    let arbiter = round_robin_arbiter(&engine, 4);
    let requests = [true; 4];

    let mut order = Vec::new();
    for _ in 0..12 {
        let granted = arbiter.select(&requests).unwrap().unwrap();
        arbiter.commit(granted).unwrap();
        order.push(granted);
    }
    assert_eq!(order, [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
    assert_eq!(arbiter.grant_counts(), vec![3, 3, 3, 3]);
}

#[test]
fn uncommitted_select_keeps_pointer() {
    let engine = start_test(file!());
    let arbiter = round_robin_arbiter(&engine, 3);

    assert_eq!(arbiter.select(&[false, true, true]).unwrap(), Some(1));
    assert_eq!(arbiter.pointer(), 0);
    assert_eq!(arbiter.total_grants(), 0);
}

#[test]
fn wrong_request_count() {
    let engine = start_test(file!());
    let arbiter = round_robin_arbiter(&engine, 3);
    assert!(arbiter.select(&[true, true]).is_err());
    assert!(arbiter.commit(3).is_err());
}

#[test]
fn persistent_requester_never_waits_more_than_n_rounds() {
    let engine = start_test(file!());
    const N: usize = 8;
    let arbiter = round_robin_arbiter(&engine, N);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5eed);

    // Input 5 always requests, the others request at random
    let mut waited = 0;
    for _ in 0..1000 {
        let mut requests = [false; N];
        for r in requests.iter_mut() {
            *r = rng.gen_bool(0.7);
        }
        requests[5] = true;

        let granted = arbiter.select(&requests).unwrap().unwrap();
        arbiter.commit(granted).unwrap();
        if granted == 5 {
            waited = 0;
        } else {
            waited += 1;
            assert!(waited < N, "input 5 waited {waited} rounds");
        }
    }
}
