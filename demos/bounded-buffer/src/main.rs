//! Bounded-buffer demo.
//!
//! Producers and consumers hand values through a four-slot channel, each side
//! sleeping on a wait queue when it cannot make progress.

use std::process;

use bounded_buffer::{run, DemoConfig};

fn main() {
    env_logger::init();

    let config = DemoConfig::default();
    log::debug!("{:?}", config);

    let summary = match run(&config) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("[bounded-buffer] runtime error: {e}");
            process::exit(1);
        }
    };

    println!(
        "Transferred {}/{} values through {} slots (high water {})",
        summary.consumed, summary.produced, summary.capacity, summary.high_water
    );
    for (tid, count) in &summary.per_consumer {
        println!("  consumer {tid}: {count} values");
    }

    if summary.is_consistent() {
        println!("Checksum verification: PASSED");
    } else {
        println!(
            "Checksum verification: FAILED (sum {} expected {})",
            summary.sum, summary.expected_sum
        );
        process::exit(1);
    }
}
