mod support;

use std::time::{Duration, Instant};

use pokecatalog::{
    AccountService, DispatcherConfig, DispatcherThread, InMemoryStore, NotificationDispatcher,
    OutboxRecorder, OutboxStatus, OutboxStore, Store,
};
use support::channels::FlakyChannel;

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn background_thread_delivers_through_an_outage() {
    support::init_tracing();
    let store = InMemoryStore::new();
    let channel = FlakyChannel::new(3);
    let dispatcher = NotificationDispatcher::with_config(
        store.clone(),
        channel.clone(),
        DispatcherConfig::new()
            .with_worker_id("background")
            .with_poll_interval(Duration::from_millis(10)),
    );
    let thread = DispatcherThread::spawn(dispatcher);
    let accounts = AccountService::with_recorder(OutboxRecorder::with_trigger(thread.trigger()));

    for name in ["Red", "Blue", "Green"] {
        store
            .transaction(|uow| {
                let email = format!("{}@kanto.com", name.to_lowercase());
                accounts.create_user(uow, name, &email)
            })
            .unwrap();
    }

    wait_until(|| channel.inner.len() == 3);
    let stats = thread.stop();

    assert_eq!(channel.inner.len(), 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.released, 3);
    assert_eq!(stats.errors, 0);
    assert_eq!(
        store.outbox_records_by_status(OutboxStatus::Delivered).unwrap().len(),
        3
    );
}

#[test]
fn rolled_back_work_does_not_wake_or_publish() {
    support::init_tracing();
    let store = InMemoryStore::new();
    let channel = FlakyChannel::new(0);
    let dispatcher = NotificationDispatcher::with_config(
        store.clone(),
        channel.clone(),
        DispatcherConfig::new().with_poll_interval(Duration::from_millis(10)),
    );
    let thread = DispatcherThread::spawn(dispatcher);
    let accounts = AccountService::with_recorder(OutboxRecorder::with_trigger(thread.trigger()));

    let mut uow = store.begin();
    accounts.create_user(&mut uow, "Ghost", "ghost@lavender.com").unwrap();
    uow.rollback();

    std::thread::sleep(Duration::from_millis(50));
    let stats = thread.stop();
    assert!(stats.drains >= 1);
    assert_eq!(stats.delivered, 0);
    assert!(channel.inner.is_empty());
}
