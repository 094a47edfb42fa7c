//! The ambient safety override is process-wide, so it lives in its own test
//! binary and is exercised from a single test.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use deferral::coordination::{reset_test_ambient_safety, set_test_ambient_safety};
use deferral::{
    DEFAULT_MAX_CYCLES, DeferralMode, InstantDelay, SafetyPolicy, ScheduleRequest, SchedulerBuilder, Work, unit_of_work,
};

fn counting_work(counter: Arc<AtomicU32>) -> Work {
    unit_of_work(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_ambient_override_sits_between_explicit_and_injected() {
    let scheduler = SchedulerBuilder::new()
        .with_delay_policy(Arc::new(InstantDelay))
        .with_default_safety(SafetyPolicy::new(12))
        .build();
    let counter = Arc::new(AtomicU32::new(0));

    let injected = scheduler
        .run_for_result(ScheduleRequest::new(DeferralMode::PerpetualDefer), counting_work(counter.clone()))
        .await
        .unwrap();
    assert_eq!(injected.cycles, 12);

    assert_eq!(set_test_ambient_safety(4), None);

    let ambient = scheduler
        .run_for_result(ScheduleRequest::new(DeferralMode::PerpetualDefer), counting_work(counter.clone()))
        .await
        .unwrap();
    assert_eq!(ambient.cycles, 4);

    let explicit = scheduler
        .run_for_result(
            ScheduleRequest::new(DeferralMode::PerpetualDefer).with_max_cycles(2),
            counting_work(counter.clone()),
        )
        .await
        .unwrap();
    assert_eq!(explicit.cycles, 2);

    let handle = scheduler
        .schedule(ScheduleRequest::new(DeferralMode::ThresholdGated), counting_work(counter.clone()))
        .unwrap();
    let scheduled = handle.completion().await.unwrap();
    assert_eq!(scheduled.cycles, 4);

    assert_eq!(set_test_ambient_safety(6), Some(4));
    reset_test_ambient_safety();

    let restored = scheduler
        .run_for_result(ScheduleRequest::new(DeferralMode::PerpetualDefer), counting_work(counter.clone()))
        .await
        .unwrap();
    assert_eq!(restored.cycles, 12);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    assert_eq!(SafetyPolicy::resolve(None, None).max_cycles, DEFAULT_MAX_CYCLES);
}
