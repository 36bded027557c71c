//! Integration tests for descriptor completion routing and close-once teardown

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use gamewire::transport::descriptor::{
    Completion, Descriptor, DescriptorContainer, DescriptorState, Direction, Teardown,
};

#[derive(Default)]
struct CountingTeardown(AtomicUsize);

impl Teardown for CountingTeardown {
    fn on_closed(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Connection {
    closes: AtomicUsize,
    descriptor: Descriptor<CountingTeardown>,
}

impl DescriptorContainer for Connection {
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.descriptor.close();
    }
}

fn connection() -> Arc<Connection> {
    Arc::new_cyclic(|weak: &Weak<Connection>| {
        let container: Weak<dyn DescriptorContainer> = weak.clone();
        Connection {
            closes: AtomicUsize::new(0),
            descriptor: Descriptor::new(Direction::Receive, container, CountingTeardown::default()),
        }
    })
}

fn teardowns(conn: &Connection) -> usize {
    conn.descriptor.teardown().0.load(Ordering::SeqCst)
}

#[test]
fn test_concurrent_close_runs_teardown_once() {
    for _ in 0..50 {
        let conn = connection();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let conn = conn.clone();
                std::thread::spawn(move || conn.descriptor.close())
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(teardowns(&conn), 1);
        assert_eq!(conn.descriptor.state(), DescriptorState::Closed);
    }
}

#[test]
fn test_fault_notifies_handler_then_closes_container() {
    let conn = connection();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_by_handler = seen.clone();
    conn.descriptor.set_fault_handler(Arc::new(move |kind| {
        assert_eq!(kind, io::ErrorKind::ConnectionReset);
        seen_by_handler.fetch_add(1, Ordering::SeqCst);
    }));

    conn.descriptor.begin().unwrap();
    conn.descriptor
        .on_completion(Completion::Fault(io::ErrorKind::ConnectionReset));

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
    assert_eq!(teardowns(&conn), 1);
}

#[test]
fn test_success_without_data_closes_container() {
    let conn = connection();
    conn.descriptor.begin().unwrap();
    conn.descriptor.on_completion(Completion::Success);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
    assert!(conn.descriptor.is_closed());
}

#[test]
fn test_aborted_never_notifies_or_closes() {
    let conn = connection();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_by_handler = seen.clone();
    conn.descriptor.set_fault_handler(Arc::new(move |_| {
        seen_by_handler.fetch_add(1, Ordering::SeqCst);
    }));

    conn.descriptor.begin().unwrap();
    conn.descriptor.on_completion(Completion::Aborted);

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 0);
    assert!(!conn.descriptor.is_closed());
    assert_eq!(conn.descriptor.state(), DescriptorState::Idle);
}

#[test]
fn test_fault_after_close_reaches_no_handler() {
    let conn = connection();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_by_handler = seen.clone();
    conn.descriptor.set_fault_handler(Arc::new(move |_| {
        seen_by_handler.fetch_add(1, Ordering::SeqCst);
    }));

    conn.descriptor.close();
    conn.descriptor
        .on_completion(Completion::Fault(io::ErrorKind::BrokenPipe));

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(teardowns(&conn), 1);
}

#[test]
fn test_io_error_converts_to_fault() {
    let err = io::Error::new(io::ErrorKind::TimedOut, "late");
    assert_eq!(
        Completion::from(&err),
        Completion::Fault(io::ErrorKind::TimedOut)
    );
}
