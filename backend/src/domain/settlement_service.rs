//! Payment provider webhook reconciliation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::ports::{
    CancelSettleOutcome, PaymentRepository, PaymentRepositoryError, SettleOutcome,
    SettlementWebhook, WebhookAck, WebhookEvent, WebhookNotification,
};

/// [`SettlementWebhook`] implementation over the payment repository.
///
/// Each notification is absorbed exactly once; replays acknowledge without
/// writing so the provider stops retrying.
pub struct SettlementService {
    payments: Arc<dyn PaymentRepository>,
}

impl SettlementService {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }
}

fn storage_error(error: &PaymentRepositoryError) -> Error {
    tracing::error!(error = %error, "payment repository failure");
    match error {
        PaymentRepositoryError::Connection { .. } => {
            Error::service_unavailable("payment storage is unavailable")
        }
        PaymentRepositoryError::Query { .. } => Error::internal("payment storage query failed"),
    }
}

#[async_trait]
impl SettlementWebhook for SettlementService {
    async fn notify(&self, notification: WebhookNotification) -> Result<WebhookAck, Error> {
        let reference = notification.reference.as_str();
        match notification.event {
            WebhookEvent::Succeeded => match self
                .payments
                .settle_success(reference)
                .await
                .map_err(|err| storage_error(&err))?
            {
                SettleOutcome::Settled { payment, entry } => {
                    tracing::info!(
                        reference,
                        user_id = %payment.user_id,
                        amount_kopecks = entry.amount_kopecks,
                        "payment settled"
                    );
                    Ok(WebhookAck::Applied)
                }
                SettleOutcome::AlreadySettled => {
                    tracing::debug!(reference, "payment success replayed");
                    Ok(WebhookAck::AlreadyApplied)
                }
                SettleOutcome::Unknown => {
                    tracing::info!(reference, "webhook for unknown payment");
                    Err(Error::invalid_request("unknown payment reference"))
                }
            },
            WebhookEvent::Canceled => match self
                .payments
                .settle_cancel(reference)
                .await
                .map_err(|err| storage_error(&err))?
            {
                CancelSettleOutcome::Canceled(payment) => {
                    tracing::info!(reference, user_id = %payment.user_id, "payment canceled");
                    Ok(WebhookAck::Applied)
                }
                CancelSettleOutcome::AlreadyFinal => {
                    tracing::debug!(reference, "payment cancellation replayed");
                    Ok(WebhookAck::AlreadyApplied)
                }
                CancelSettleOutcome::Unknown => {
                    tracing::info!(reference, "webhook for unknown payment");
                    Err(Error::invalid_request("unknown payment reference"))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::payment::PaymentRecord;
    use crate::domain::ports::{InMemoryStore, LedgerRepository};
    use crate::domain::user::{User, UserId};
    use rstest::{fixture, rstest};

    fn account() -> User {
        User {
            id: UserId::random(),
            external_id: 11,
            display_name: "Payer".to_owned(),
            photo_url: None,
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        }
    }

    fn notification(reference: &str, event: WebhookEvent) -> WebhookNotification {
        WebhookNotification {
            reference: reference.to_owned(),
            event,
        }
    }

    #[fixture]
    fn store() -> InMemoryStore {
        InMemoryStore::new()
    }

    fn service(store: &InMemoryStore) -> SettlementService {
        SettlementService::new(Arc::new(store.clone()))
    }

    #[rstest]
    #[tokio::test]
    async fn success_credits_the_payer_exactly_once(store: InMemoryStore) {
        let user = account();
        store.seed_user(user.clone());
        store.seed_payment(PaymentRecord::pending(user.id, 500_00, "pay-1".to_owned()));
        let service = service(&store);

        let first = service
            .notify(notification("pay-1", WebhookEvent::Succeeded))
            .await
            .expect("first notification applies");
        assert_eq!(first, WebhookAck::Applied);
        assert_eq!(store.user(&user.id).expect("exists").balance_kopecks, 500_00);

        let replay = service
            .notify(notification("pay-1", WebhookEvent::Succeeded))
            .await
            .expect("replay acknowledged");
        assert_eq!(replay, WebhookAck::AlreadyApplied);
        assert_eq!(store.user(&user.id).expect("exists").balance_kopecks, 500_00);

        let entries = store.entries_for_user(&user.id).await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payment_ref.as_deref(), Some("pay-1"));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_reference_is_rejected(store: InMemoryStore) {
        let service = service(&store);

        let error = service
            .notify(notification("ghost", WebhookEvent::Succeeded))
            .await
            .expect_err("unknown payment");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn cancellation_never_touches_the_balance(store: InMemoryStore) {
        let user = account();
        store.seed_user(user.clone());
        store.seed_payment(PaymentRecord::pending(user.id, 500_00, "pay-2".to_owned()));
        let service = service(&store);

        let ack = service
            .notify(notification("pay-2", WebhookEvent::Canceled))
            .await
            .expect("cancellation applies");
        assert_eq!(ack, WebhookAck::Applied);
        assert_eq!(store.user(&user.id).expect("exists").balance_kopecks, 0);

        // A late success for a canceled payment is a no-op, not a credit.
        let late = service
            .notify(notification("pay-2", WebhookEvent::Succeeded))
            .await
            .expect("late success acknowledged");
        assert_eq!(late, WebhookAck::AlreadyApplied);
        assert_eq!(store.user(&user.id).expect("exists").balance_kopecks, 0);
    }
}
