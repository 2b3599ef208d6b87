//! Presence channel domain decisions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::order::{GeoPoint, OrderId};
use crate::domain::ports::{
    DriverPositionRepository, OrderRepository, OrderRepositoryError, PositionRepositoryError,
    PositionUpdate, PresenceChannel,
};
use crate::domain::presence::DriverPosition;
use crate::domain::user::User;

/// [`PresenceChannel`] implementation over the position and order
/// repositories. The WebSocket adapter handles the actual fan-out.
pub struct PresenceService {
    positions: Arc<dyn DriverPositionRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl PresenceService {
    pub fn new(
        positions: Arc<dyn DriverPositionRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self { positions, orders }
    }
}

fn position_storage_error(error: &PositionRepositoryError) -> Error {
    tracing::error!(error = %error, "position repository failure");
    match error {
        PositionRepositoryError::Connection { .. } => {
            Error::service_unavailable("position storage is unavailable")
        }
        PositionRepositoryError::Query { .. } => Error::internal("position storage query failed"),
    }
}

fn order_storage_error(error: &OrderRepositoryError) -> Error {
    tracing::error!(error = %error, "order repository failure");
    match error {
        OrderRepositoryError::Connection { .. } => {
            Error::service_unavailable("order storage is unavailable")
        }
        OrderRepositoryError::Query { .. } => Error::internal("order storage query failed"),
    }
}

#[async_trait]
impl PresenceChannel for PresenceService {
    async fn publish_position(
        &self,
        caller: &User,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<PositionUpdate>, Error> {
        if !caller.is_driver() {
            return Err(Error::forbidden("only drivers publish positions"));
        }
        GeoPoint::new(latitude, longitude)
            .map_err(|err| Error::invalid_request(err.to_string()))?;

        self.positions
            .upsert(&DriverPosition::reported(caller.id, latitude, longitude))
            .await
            .map_err(|err| position_storage_error(&err))?;

        let active = self
            .orders
            .accepted_order_for_driver(&caller.id)
            .await
            .map_err(|err| order_storage_error(&err))?;
        Ok(active.map(|order| PositionUpdate {
            order_id: order.id,
            latitude,
            longitude,
        }))
    }

    async fn authorize_subscription(&self, caller: &User, order_id: OrderId) -> Result<(), Error> {
        let order = self
            .orders
            .find_by_id(&order_id)
            .await
            .map_err(|err| order_storage_error(&err))?
            .ok_or_else(|| Error::not_found("order not found"))?;
        if !order.involves(&caller.id) {
            tracing::debug!(order_id = %order_id, user_id = %caller.id, "topic subscription denied");
            return Err(Error::forbidden("not a party to this order"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::order::{ArrivalEstimate, ServiceCategory, ServiceOrder};
    use crate::domain::ports::InMemoryStore;
    use crate::domain::user::UserId;
    use rstest::{fixture, rstest};

    fn driver() -> User {
        User {
            id: UserId::random(),
            external_id: 21,
            display_name: "Driver".to_owned(),
            photo_url: None,
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: vec![ServiceCategory::Towing],
        }
    }

    fn customer() -> User {
        User {
            id: UserId::random(),
            external_id: 22,
            display_name: "Customer".to_owned(),
            photo_url: None,
            balance_kopecks: 0,
            is_admin: false,
            driver_categories: Vec::new(),
        }
    }

    async fn accepted_order(
        store: &InMemoryStore,
        customer: &User,
        driver: &User,
    ) -> ServiceOrder {
        let order = ServiceOrder::create(
            customer.id,
            ServiceCategory::Towing,
            GeoPoint::new(55.75, 37.61).expect("valid coordinates"),
            "towing needed".to_owned(),
            1000_00,
        )
        .expect("valid order");
        store.insert(&order).await.expect("inserted");
        match store
            .accept_if_searching(&order.id, &driver.id, ArrivalEstimate::advisory())
            .await
            .expect("accept call succeeds")
        {
            crate::domain::ports::AcceptOutcome::Accepted(order) => order,
            crate::domain::ports::AcceptOutcome::Unavailable => {
                unreachable!("fresh order accepts")
            }
        }
    }

    #[fixture]
    fn store() -> InMemoryStore {
        InMemoryStore::new()
    }

    fn service(store: &InMemoryStore) -> PresenceService {
        let shared: Arc<InMemoryStore> = Arc::new(store.clone());
        PresenceService::new(shared.clone(), shared)
    }

    #[rstest]
    #[tokio::test]
    async fn publish_with_active_order_targets_its_topic(store: InMemoryStore) {
        let customer = customer();
        let driver = driver();
        store.seed_user(customer.clone());
        store.seed_user(driver.clone());
        let order = accepted_order(&store, &customer, &driver).await;
        let service = service(&store);

        let update = service
            .publish_position(&driver, 55.80, 37.50)
            .await
            .expect("publish succeeds")
            .expect("active order yields an update");
        assert_eq!(update.order_id, order.id);
        assert!((update.latitude - 55.80).abs() < f64::EPSILON);

        let stored = store.find(&driver.id).await.expect("lookup").expect("row");
        assert!((stored.longitude - 37.50).abs() < f64::EPSILON);
    }

    #[rstest]
    #[tokio::test]
    async fn publish_without_active_order_is_persisted_but_not_forwarded(store: InMemoryStore) {
        let driver = driver();
        store.seed_user(driver.clone());
        let service = service(&store);

        let update = service
            .publish_position(&driver, 55.80, 37.50)
            .await
            .expect("publish succeeds");
        assert!(update.is_none());
        assert!(store.find(&driver.id).await.expect("lookup").is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn non_drivers_may_not_publish(store: InMemoryStore) {
        let customer = customer();
        let service = service(&store);

        let error = service
            .publish_position(&customer, 55.80, 37.50)
            .await
            .expect_err("customers rejected");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected(store: InMemoryStore) {
        let driver = driver();
        let service = service(&store);

        let error = service
            .publish_position(&driver, 91.0, 0.0)
            .await
            .expect_err("bad coordinates");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn only_parties_may_subscribe_to_a_topic(store: InMemoryStore) {
        let customer = customer();
        let driver = driver();
        let stranger = customer.clone();
        store.seed_user(customer.clone());
        store.seed_user(driver.clone());
        let order = accepted_order(&store, &customer, &driver).await;
        let service = service(&store);

        service
            .authorize_subscription(&customer, order.id)
            .await
            .expect("customer admitted");
        service
            .authorize_subscription(&driver, order.id)
            .await
            .expect("bound driver admitted");

        let mut outsider = stranger;
        outsider.id = UserId::random();
        let error = service
            .authorize_subscription(&outsider, order.id)
            .await
            .expect_err("outsider rejected");
        assert_eq!(error.code(), ErrorCode::Forbidden);

        let missing = service
            .authorize_subscription(&customer, OrderId::random())
            .await
            .expect_err("unknown order");
        assert_eq!(missing.code(), ErrorCode::NotFound);
    }
}
