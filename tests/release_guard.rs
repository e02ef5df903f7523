#![cfg(test)]

use shared_ptr::{DebugReleaseGuard, DestroyGuard};

#[test]
fn destroy_then_release_is_ok() {
    let g = DebugReleaseGuard::new();
    drop(g.enter_destroy());
    g.check_release();
}

#[cfg(debug_assertions)]
#[test]
fn double_destroy_panics_in_debug() {
    let g = DebugReleaseGuard::new();
    drop(g.enter_destroy());
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        // A second destroy must be refused
        let _again = g.enter_destroy();
    }));
    assert!(res.is_err(), "expected double destroy to panic in debug builds");
}

#[cfg(not(debug_assertions))]
#[test]
fn guard_noop_in_release() {
    let g = DebugReleaseGuard::new();
    let _d1 = g.enter_destroy();
    let _d2 = g.enter_destroy();
    g.check_release();
}

#[test]
fn destroy_guard_is_nameable() {
    let g = DebugReleaseGuard::new();
    let guard: DestroyGuard<'_> = g.enter_destroy();
    drop(guard);
    g.check_release();
}
