//! Checks how the process ends once the last thread exits. Each scenario runs
//! in a child process started from this same binary, and the parent compares
//! the child's exit status.

use std::env;
use std::process::{self, Command};
use std::sync::atomic::{AtomicUsize, Ordering};

use uthread_scheduler_cooperative::{
    create, current_id, exit, init, join, kill, yield_now, yield_to, ThreadError, MAIN_TID,
};

const MAIN_EXIT_CODE: i32 = 42;
const JOINERS: usize = 128;
const SCENARIO_FAILED: i32 = 101;
const SCENARIO_VAR: &str = "UTHREAD_EXIT_SCENARIO";

static FINISHED: AtomicUsize = AtomicUsize::new(0);

fn fail(msg: &str) -> ! {
    eprintln!("process_exit: {msg}");
    process::abort()
}

/// A created thread is the last one standing and ends the process.
fn last_thread_exit_code() {
    create(|| exit(7)).unwrap_or_else(|e| fail(&format!("create: {e}")));
    exit(5);
}

/// The main thread exits with nothing else to run.
fn main_exits_alone() {
    exit(9);
}

fn check_main_joined() {
    match join(MAIN_TID) {
        Ok((MAIN_TID, MAIN_EXIT_CODE)) | Err(ThreadError::ThreadNotJoinable(MAIN_TID)) => {}
        other => fail(&format!("join on main returned {other:?}")),
    }
}

/// A thread joins the main thread, which exits while it is still waiting.
fn main_exits_while_joined() {
    let tid = create(|| {
        check_main_joined();
        exit(0);
    })
    .unwrap_or_else(|e| fail(&format!("create: {e}")));

    match yield_to(tid) {
        Ok(t) if t == tid => {}
        other => fail(&format!("yield_to returned {other:?}")),
    }
    exit(MAIN_EXIT_CODE);
}

/// Many threads join the main thread. Every one but the last to finish
/// exits with a code that would show up if the count came up short.
fn main_exits_while_joined_by_many() {
    for _ in 0..JOINERS {
        let tid = create(|| {
            check_main_joined();
            if FINISHED.fetch_add(1, Ordering::SeqCst) + 1 == JOINERS {
                exit(0);
            }
            exit(3);
        })
        .unwrap_or_else(|e| fail(&format!("create: {e}")));

        if yield_to(tid) != Ok(tid) {
            fail("joiner did not run");
        }
    }
    exit(MAIN_EXIT_CODE);
}

/// The main thread is killed while joining its killer.
fn main_killed_while_joining() {
    let killer = create(|| {
        while yield_now() != current_id() {}
        if kill(MAIN_TID) != Ok(MAIN_TID) {
            fail("could not kill the main thread");
        }
        if join(MAIN_TID) != Err(ThreadError::ThreadNotJoinable(MAIN_TID)) {
            fail("killed main thread is still joinable");
        }
        exit(0);
    })
    .unwrap_or_else(|e| fail(&format!("create: {e}")));

    let _ = join(killer);
    fail("main thread survived being killed");
}

const SCENARIOS: &[(&str, fn(), i32)] = &[
    ("last_thread_exit_code", last_thread_exit_code, 7),
    ("main_exits_alone", main_exits_alone, 9),
    ("main_exits_while_joined", main_exits_while_joined, 0),
    ("main_exits_while_joined_by_many", main_exits_while_joined_by_many, 0),
    ("main_killed_while_joining", main_killed_while_joining, 0),
];

fn run_child(name: &str) -> ! {
    env_logger::init();
    let Some(&(_, scenario, _)) = SCENARIOS.iter().find(|(n, _, _)| *n == name) else {
        eprintln!("process_exit: unknown scenario {name}");
        process::exit(SCENARIO_FAILED);
    };

    init().unwrap_or_else(|e| fail(&format!("init: {e}")));
    scenario();
    fail("scenario returned instead of exiting")
}

fn main() {
    if let Ok(name) = env::var(SCENARIO_VAR) {
        run_child(&name);
    }

    let exe = env::current_exe().expect("path of the test binary");
    let mut failures = 0;
    for &(name, _, expected) in SCENARIOS {
        let status = Command::new(&exe)
            .env(SCENARIO_VAR, name)
            .status()
            .expect("spawn scenario process");
        if status.code() == Some(expected) {
            println!("process_exit: {name} ... ok");
        } else {
            println!("process_exit: {name} ... FAILED: expected {expected}, got {status}");
            failures += 1;
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}
