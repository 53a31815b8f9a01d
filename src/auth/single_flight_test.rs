use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

#[tokio::test]
async fn lone_caller_is_leader() {
    let sf: SingleFlight<u32> = SingleFlight::new();
    let flight = sf.run(|| async { 7 }).await;
    assert_eq!(flight, Flight { value: 7, leader: true, generation: 1 });
    assert!(!sf.is_in_flight());
}

#[tokio::test]
async fn sequential_calls_start_fresh_flights() {
    let sf: SingleFlight<u32> = SingleFlight::new();
    let starts = Arc::new(AtomicUsize::new(0));
    for expected in 1..=3 {
        let starts = starts.clone();
        let flight = sf
            .run(move || async move { u32::try_from(starts.fetch_add(1, Ordering::SeqCst) + 1).unwrap() })
            .await;
        assert!(flight.leader);
        assert_eq!(flight.value, expected);
        assert_eq!(flight.generation, u64::from(expected));
    }
    assert_eq!(starts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn concurrent_callers_share_one_execution() {
    let sf: Arc<SingleFlight<bool>> = Arc::new(SingleFlight::new());
    let gate = Arc::new(Semaphore::new(0));
    let starts = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let sf = sf.clone();
        let gate = gate.clone();
        let starts = starts.clone();
        handles.push(tokio::spawn(async move {
            sf.run(move || async move {
                starts.fetch_add(1, Ordering::SeqCst);
                let _permit = gate.acquire().await.unwrap();
                true
            })
            .await
        }));
    }

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(sf.is_in_flight());
    gate.add_permits(1);

    let mut leaders = 0;
    for handle in handles {
        let flight = handle.await.unwrap();
        assert!(flight.value);
        assert_eq!(flight.generation, 1);
        if flight.leader {
            leaders += 1;
        }
    }
    assert_eq!(leaders, 1);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(!sf.is_in_flight());
}

#[tokio::test]
async fn followers_finish_the_flight_when_the_leader_is_dropped() {
    let sf: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let gate = Arc::new(Semaphore::new(0));
    let starts = Arc::new(AtomicUsize::new(0));

    let spawn = |sf: Arc<SingleFlight<u32>>, gate: Arc<Semaphore>, starts: Arc<AtomicUsize>| {
        tokio::spawn(async move {
            sf.run(move || async move {
                starts.fetch_add(1, Ordering::SeqCst);
                let _permit = gate.acquire().await.unwrap();
                42
            })
            .await
        })
    };

    let leader = spawn(sf.clone(), gate.clone(), starts.clone());
    while starts.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    let follower = spawn(sf.clone(), gate.clone(), starts.clone());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());
    gate.add_permits(1);

    let flight = follower.await.unwrap();
    assert_eq!(flight, Flight { value: 42, leader: false, generation: 1 });
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(!sf.is_in_flight());
}
