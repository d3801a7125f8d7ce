//! Concurrent mutation safety: overlapping mutators must serialize.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use trk::queries;
use trk::store::Store;
use trk::task::TaskRecord;

mod support;

#[test]
fn overlapping_mutators_serialize() {
    let tracker = support::TestTracker::init();
    let root = tracker.path().to_path_buf();
    let config = tracker.config().clone();

    // Each thread opens its own store, standing in for an independent
    // process. The slow transform holds the lock across its sleep, so
    // the fast one must observe its committed result.
    let barrier = Arc::new(Barrier::new(2));

    let slow = {
        let barrier = Arc::clone(&barrier);
        let root = root.clone();
        let config = config.clone();
        thread::spawn(move || {
            let mut store = Store::open(&root, &config).expect("open");
            barrier.wait();
            store
                .mutate(|mut records| {
                    thread::sleep(Duration::from_millis(150));
                    records.push(TaskRecord::new("tk-slow", "Slow writer"));
                    Ok((records, ()))
                })
                .expect("slow mutate");
            store.close();
        })
    };

    let fast = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut store = Store::open(&root, &config).expect("open");
            barrier.wait();
            // Give the slow writer a head start into its critical section.
            thread::sleep(Duration::from_millis(30));
            store
                .mutate(|mut records| {
                    records.push(TaskRecord::new("tk-fast", "Fast writer"));
                    Ok((records, ()))
                })
                .expect("fast mutate");
            store.close();
        })
    };

    slow.join().expect("slow thread");
    fast.join().expect("fast thread");

    let mut store = tracker.store();
    let ids = store.query(queries::all_ids).expect("query");
    store.close();

    // Neither write was lost to a torn or interleaved rewrite.
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"tk-fast".to_string()));
    assert!(ids.contains(&"tk-slow".to_string()));
}

#[test]
fn many_writers_all_commit() {
    let tracker = support::TestTracker::init();
    let root = tracker.path().to_path_buf();
    let config = tracker.config().clone();

    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));
    let mut handles = Vec::with_capacity(writers);

    for idx in 0..writers {
        let barrier = Arc::clone(&barrier);
        let root = root.clone();
        let config = config.clone();
        handles.push(thread::spawn(move || {
            let mut store = Store::open(&root, &config).expect("open");
            barrier.wait();
            store
                .mutate(move |mut records| {
                    records.push(TaskRecord::new(
                        format!("tk-w{idx}"),
                        format!("Writer {idx}"),
                    ));
                    Ok((records, ()))
                })
                .expect("mutate");
            store.close();
        }));
    }

    for handle in handles {
        handle.join().expect("writer thread");
    }

    let mut store = tracker.store();
    let ids = store.query(queries::all_ids).expect("query");
    store.close();
    assert_eq!(ids.len(), writers);
}
