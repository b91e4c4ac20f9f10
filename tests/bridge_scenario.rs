//! Escenarios del puente completo: muchos productores, un solo thread
//! ejecutando sobre el host.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use host_bridge::bridge::{Bridge, BridgeSettings, Priority, Ticket};
use host_bridge::error::{BridgeError, FailureReason, OperationError};

/// Host de prueba: registra el orden de ejecución
#[derive(Default)]
struct Recorder {
    executed: Vec<usize>,
}

fn settings() -> BridgeSettings {
    BridgeSettings {
        default_timeout: Duration::from_secs(5),
        max_timeout: Duration::from_secs(10),
        ..BridgeSettings::default()
    }
}

#[test]
fn test_fifty_tasks_from_ten_threads() {
    let settings = BridgeSettings {
        max_tasks_per_tick: 64,
        tick_budget: Duration::from_secs(1),
        ..settings()
    };
    let (bridge, pump) = Bridge::<Recorder>::new(&settings);

    let producers: Vec<_> = (0..10)
        .map(|producer| {
            let client = bridge.client("scenario");
            thread::spawn(move || {
                (0..5)
                    .map(|n| {
                        let index = producer * 5 + n;
                        client
                            .submit("record", Priority::NORMAL, move |host: &mut Recorder| {
                                if index % 10 == 7 {
                                    return Err(OperationError::Conflict(format!("task {} rejected", index)));
                                }
                                host.executed.push(index);
                                Ok(index)
                            })
                            .unwrap()
                    })
                    .collect::<Vec<Ticket<usize>>>()
            })
        })
        .collect();

    let tickets: Vec<Ticket<usize>> = producers
        .into_iter()
        .flat_map(|producer| producer.join().unwrap())
        .collect();
    assert_eq!(tickets.len(), 50);

    // Un solo ciclo del pump atiende los 50
    let mut host = Recorder::default();
    let report = pump.tick(&mut host);
    assert_eq!(report.executed, 50);
    assert_eq!((report.completed, report.failed), (45, 5));
    assert_eq!(report.carried, 0);
    assert!(pump.is_idle());

    let (mut completed, mut failed) = (0, 0);
    for ticket in &tickets {
        assert_eq!(ticket.signal_count(), 1, "{} signaled more than once", ticket.id());
        match ticket.wait() {
            Ok(_) => completed += 1,
            Err(err) => {
                assert_eq!(err.module, "scenario");
                assert_eq!(err.operation, "record");
                assert!(matches!(err.reason, FailureReason::Operation(OperationError::Conflict(_))));
                failed += 1;
            }
        }
    }
    assert_eq!((completed, failed), (45, 5));
    assert_eq!(host.executed.len(), 45);

    let stats = pump.stats();
    assert_eq!(stats.executed, 50);
    assert_eq!(stats.completed, 45);
    assert_eq!(stats.failed, 5);
}

#[test]
fn test_sequential_submissions_keep_order_per_thread() {
    let (bridge, pump) = Bridge::<Recorder>::new(&settings());

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let client = bridge.client("ordering");
            thread::spawn(move || {
                for n in 0..10 {
                    let value = producer * 100 + n;
                    client
                        .submit_fire_and_forget("record", Priority::NORMAL, move |host: &mut Recorder| {
                            host.executed.push(value);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let mut host = Recorder::default();
    pump.flush(&mut host);

    for producer in 0..4 {
        let seen: Vec<usize> = host
            .executed
            .iter()
            .copied()
            .filter(|v| v / 100 == producer)
            .collect();
        let expected: Vec<usize> = (0..10).map(|n| producer * 100 + n).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn test_panic_does_not_affect_other_tasks() {
    let (bridge, pump) = Bridge::<Recorder>::new(&settings());
    let client = bridge.client("isolation");

    let before = client
        .submit("before", Priority::NORMAL, |host: &mut Recorder| {
            host.executed.push(1);
            Ok(1)
        })
        .unwrap();
    let exploding = client
        .submit("explode", Priority::NORMAL, |_: &mut Recorder| -> Result<usize, OperationError> {
            panic!("host call blew up")
        })
        .unwrap();
    let after = client
        .submit("after", Priority::NORMAL, |host: &mut Recorder| {
            host.executed.push(3);
            Ok(3)
        })
        .unwrap();

    let mut host = Recorder::default();
    pump.flush(&mut host);

    assert_eq!(before.wait(), Ok(1));
    assert_eq!(after.wait(), Ok(3));
    let err = exploding.wait().unwrap_err();
    assert_eq!(err.operation, "explode");
    assert!(matches!(err.reason, FailureReason::Panicked(ref msg) if msg.contains("blew up")));
    assert_eq!(host.executed, vec![1, 3]);
}

#[test]
fn test_timeout_does_not_block_other_waiters() {
    let (bridge, pump) = Bridge::<Recorder>::new(&settings());
    let (tx, rx) = mpsc::channel();

    let impatient = {
        let client = bridge.client("timeouts");
        let tx = tx.clone();
        thread::spawn(move || {
            let result = client.submit_and_wait(
                "slow",
                Priority::NORMAL,
                Duration::from_millis(20),
                |host: &mut Recorder| {
                    host.executed.push(1);
                    Ok(1usize)
                },
            );
            tx.send("impatient").unwrap();
            result
        })
    };
    let patient = {
        let client = bridge.client("timeouts");
        thread::spawn(move || {
            let result = client.submit_and_wait(
                "steady",
                Priority::NORMAL,
                Duration::from_secs(5),
                |host: &mut Recorder| {
                    host.executed.push(2);
                    Ok(2usize)
                },
            );
            tx.send("patient").unwrap();
            result
        })
    };

    // Nadie bombea hasta que el primero se rinde
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "impatient");
    assert!(matches!(
        impatient.join().unwrap(),
        Err(BridgeError::Timeout { .. })
    ));

    // El segundo waiter puede haber encolado antes o después; esperamos a
    // que su task esté en la cola
    while bridge.queue().len() < 2 {
        thread::sleep(Duration::from_millis(1));
    }

    let mut host = Recorder::default();
    pump.flush(&mut host);

    assert_eq!(patient.join().unwrap(), Ok(2));
    assert_eq!(rx.recv().unwrap(), "patient");

    // El task abandonado igual corrió, y su resultado se descartó
    let mut executed = host.executed.clone();
    executed.sort();
    assert_eq!(executed, vec![1, 2]);
    assert_eq!(pump.stats().orphaned, 1);
}

#[test]
fn test_queue_full_is_reported() {
    let settings = BridgeSettings {
        queue_capacity: 2,
        ..settings()
    };
    let (bridge, pump) = Bridge::<Recorder>::new(&settings);
    let client = bridge.client("backpressure");

    for _ in 0..2 {
        client.submit("fill", Priority::LOW, |_: &mut Recorder| Ok(())).unwrap();
    }
    assert!(matches!(
        client.submit("overflow", Priority::HIGH, |_: &mut Recorder| Ok(())),
        Err(BridgeError::QueueFull { capacity: 2 })
    ));

    pump.flush(&mut Recorder::default());
    assert!(client.submit("again", Priority::HIGH, |_: &mut Recorder| Ok(())).is_ok());
}
