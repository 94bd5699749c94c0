#![allow(dead_code)]

use tandem::CowHashMap;

// Run the test on different configurations of a `CowHashMap`.
pub fn with_map<K, V>(mut test: impl FnMut(&dyn Fn() -> CowHashMap<K, V>)) {
    // Default capacity and load factor.
    test(&CowHashMap::new);

    // A tiny table to stress growth.
    test(&(|| CowHashMap::builder().capacity(1).build()));

    // A low load factor to stress early rehashing.
    test(&(|| CowHashMap::builder().capacity(4).load_factor(0.3).build()));

    // A load factor above one, so the table packs tightly and probes long.
    test(&(|| CowHashMap::builder().capacity(8).load_factor(1.5).build()));
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
