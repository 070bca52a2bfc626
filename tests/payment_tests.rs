use loanlink::application::payments::{ReconcileOutcome, SignalOutcome};
use loanlink::domain::application::{ApplicationId, FeeStatus};
use loanlink::domain::ports::{ApplicationStore, Clock};
use loanlink::error::LendingError;

mod common;
use common::{Harness, borrower, manager, signed_event};

#[tokio::test]
async fn test_initiate_then_reconcile_then_replay() {
    let h = Harness::new();
    let a2 = h.submit("b@x.com").await;

    let session = h
        .payments
        .initiate_payment(a2, &borrower("b@x.com"))
        .await
        .unwrap();
    assert!(session.url.ends_with(&a2.to_string()));
    let untouched = h.store.find_by_id(a2).await.unwrap().unwrap();
    assert_eq!(untouched.application_fee_status, FeeStatus::Unpaid);

    let t2 = h.clock.now();
    let first = h.payments.reconcile(a2, "R1").await.unwrap();
    assert!(matches!(first, ReconcileOutcome::Reconciled(_)));

    h.clock.advance_secs(120);
    let replay = h.payments.reconcile(a2, "R1").await.unwrap();
    assert!(matches!(replay, ReconcileOutcome::AlreadyReconciled(_)));

    let stored = h.store.find_by_id(a2).await.unwrap().unwrap();
    assert_eq!(stored.application_fee_status, FeeStatus::Paid);
    assert_eq!(stored.paid_at, Some(t2));
    assert_eq!(stored.payment_reference.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_initiate_on_paid_application_is_already_paid() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;
    h.payments.reconcile(id, "R1").await.unwrap();
    let before = h.store.find_by_id(id).await.unwrap().unwrap();

    let result = h.payments.initiate_payment(id, &borrower("b@x.com")).await;
    assert!(matches!(result, Err(LendingError::AlreadyPaid)));
    assert_eq!(h.gateway.sessions(), 0);
    assert_eq!(h.store.find_by_id(id).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_manager_may_initiate_for_any_application() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;
    assert!(h.payments.initiate_payment(id, &manager()).await.is_ok());
    assert_eq!(h.gateway.sessions(), 1);
}

#[tokio::test]
async fn test_initiate_unknown_application_is_not_found() {
    let h = Harness::new();
    let result = h
        .payments
        .initiate_payment(ApplicationId::new(), &borrower("b@x.com"))
        .await;
    assert!(matches!(result, Err(LendingError::NotFound(_))));
    assert_eq!(h.gateway.sessions(), 0);
}

#[tokio::test]
async fn test_signed_signal_reconciles() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;
    let (body, header) = signed_event(id, "pi_live_1");

    let outcome = h.payments.handle_signal(&body, &header).await.unwrap();
    assert!(matches!(
        outcome,
        SignalOutcome::Reconciled(ReconcileOutcome::Reconciled(_))
    ));

    let again = h.payments.handle_signal(&body, &header).await.unwrap();
    assert!(matches!(
        again,
        SignalOutcome::Reconciled(ReconcileOutcome::AlreadyReconciled(_))
    ));
}

#[tokio::test]
async fn test_forged_signal_is_rejected_and_store_untouched() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;
    let (body, _) = signed_event(id, "pi_forged");
    let forged = format!("t={},v1={}", chrono::Utc::now().timestamp(), "00".repeat(32));

    let result = h.payments.handle_signal(&body, &forged).await;
    assert!(matches!(result, Err(LendingError::InvalidSignal)));

    let stored = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.application_fee_status, FeeStatus::Unpaid);
    assert!(stored.paid_at.is_none());
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;
    let other = h.submit("c@y.com").await;
    let (_, header) = signed_event(id, "pi_1");
    let (tampered, _) = signed_event(other, "pi_1");

    let result = h.payments.handle_signal(&tampered, &header).await;
    assert!(matches!(result, Err(LendingError::InvalidSignal)));
    let stored = h.store.find_by_id(other).await.unwrap().unwrap();
    assert_eq!(stored.application_fee_status, FeeStatus::Unpaid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reconciliation_marks_paid_once() {
    let h = Harness::new();
    let id = h.submit("b@x.com").await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let payments = h.payments.clone();
            tokio::spawn(async move { payments.reconcile(id, &format!("pi_{i}")).await })
        })
        .collect();

    let mut first_writes = Vec::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReconcileOutcome::Reconciled(app) => first_writes.push(app),
            ReconcileOutcome::AlreadyReconciled(_) => {}
        }
    }

    assert_eq!(first_writes.len(), 1);
    let stored = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.payment_reference, first_writes[0].payment_reference);
    assert_eq!(stored.paid_at, first_writes[0].paid_at);
}
