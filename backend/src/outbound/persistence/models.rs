//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and are
//! never exposed to the domain. Conversions into domain types go through the
//! stable string forms the domain enums define, so a row that fails to parse
//! surfaces as a query error rather than a panic.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ledger::{EntryCategory, LedgerEntry};
use crate::domain::order::{
    ArrivalEstimate, GeoPoint, OrderId, OrderStatus, ServiceCategory, ServiceOrder,
};
use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::presence::DriverPosition;
use crate::domain::promo::{PromoCode, PromoEffect};
use crate::domain::user::{User, UserId};

use super::schema::{
    driver_positions, ledger_entries, payments, promo_codes, promo_usages, referrals,
    service_orders, users,
};

// ---------------------------------------------------------------------------
// User models
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub external_id: i64,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub balance_kopecks: i64,
    pub is_admin: bool,
    pub driver_categories: Vec<String>,
    #[expect(dead_code, reason = "schema field kept for audit queries")]
    pub created_at: DateTime<Utc>,
    #[expect(dead_code, reason = "schema field kept for audit queries")]
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn into_domain(self) -> Result<User, String> {
        let driver_categories = self
            .driver_categories
            .iter()
            .map(|raw| {
                ServiceCategory::from_str(raw)
                    .map_err(|_| format!("unknown driver category in database: {raw}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(User {
            id: UserId::from_uuid(self.id),
            external_id: self.external_id,
            display_name: self.display_name,
            photo_url: self.photo_url,
            balance_kopecks: self.balance_kopecks,
            is_admin: self.is_admin,
            driver_categories,
        })
    }
}

/// Insertable struct for creating new user records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub external_id: i64,
    pub display_name: &'a str,
    pub photo_url: Option<&'a str>,
    pub balance_kopecks: i64,
    pub is_admin: bool,
    pub driver_categories: Vec<String>,
}

// ---------------------------------------------------------------------------
// Service order models
// ---------------------------------------------------------------------------

/// Row struct for reading from the service_orders table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = service_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub code: String,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub price_kopecks: i64,
    pub status: String,
    pub eta_from_minutes: Option<i16>,
    pub eta_to_minutes: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl OrderRow {
    pub(crate) fn into_domain(self) -> Result<ServiceOrder, String> {
        let category = ServiceCategory::from_str(&self.category)
            .map_err(|_| format!("unknown order category in database: {}", self.category))?;
        let status = OrderStatus::from_str(&self.status)
            .map_err(|_| format!("unknown order status in database: {}", self.status))?;
        let arrival_estimate = match (self.eta_from_minutes, self.eta_to_minutes) {
            (Some(from_minutes), Some(to_minutes)) => Some(ArrivalEstimate {
                from_minutes,
                to_minutes,
            }),
            (None, None) => None,
            _ => return Err("arrival estimate columns out of sync".into()),
        };

        Ok(ServiceOrder {
            id: OrderId::from_uuid(self.id),
            code: self.code,
            customer_id: UserId::from_uuid(self.customer_id),
            driver_id: self.driver_id.map(UserId::from_uuid),
            category,
            location: GeoPoint {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            description: self.description,
            price_kopecks: self.price_kopecks,
            status,
            arrival_estimate,
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for creating new order records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = service_orders)]
pub(crate) struct NewOrderRow<'a> {
    pub id: Uuid,
    pub code: &'a str,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub category: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub description: &'a str,
    pub price_kopecks: i64,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> NewOrderRow<'a> {
    pub(crate) fn from_domain(order: &'a ServiceOrder) -> Self {
        Self {
            id: *order.id.as_uuid(),
            code: &order.code,
            customer_id: *order.customer_id.as_uuid(),
            driver_id: order.driver_id.map(|id| *id.as_uuid()),
            category: order.category.as_str(),
            latitude: order.location.latitude,
            longitude: order.location.longitude,
            description: &order.description,
            price_kopecks: order.price_kopecks,
            status: order.status.as_str(),
            created_at: order.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger models
// ---------------------------------------------------------------------------

/// Row struct for reading from the ledger_entries table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ledger_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LedgerEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_kopecks: i64,
    pub category: String,
    pub description: String,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    pub(crate) fn into_domain(self) -> Result<LedgerEntry, String> {
        let category = EntryCategory::from_str(&self.category)
            .map_err(|_| format!("unknown ledger category in database: {}", self.category))?;

        Ok(LedgerEntry {
            id: self.id,
            user_id: UserId::from_uuid(self.user_id),
            amount_kopecks: self.amount_kopecks,
            category,
            description: self.description,
            payment_ref: self.payment_ref,
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for appending ledger entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ledger_entries)]
pub(crate) struct NewLedgerEntryRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_kopecks: i64,
    pub category: &'a str,
    pub description: &'a str,
    pub payment_ref: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Driver position models
// ---------------------------------------------------------------------------

/// Row struct for the one-live-row-per-driver positions table. Doubles as
/// the insertable for the upsert since every column is written on conflict.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = driver_positions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DriverPositionRow {
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl DriverPositionRow {
    pub(crate) fn from_domain(position: &DriverPosition) -> Self {
        Self {
            driver_id: *position.driver_id.as_uuid(),
            latitude: position.latitude,
            longitude: position.longitude,
            updated_at: position.updated_at,
        }
    }

    pub(crate) fn into_domain(self) -> DriverPosition {
        DriverPosition {
            driver_id: UserId::from_uuid(self.driver_id),
            latitude: self.latitude,
            longitude: self.longitude,
            updated_at: self.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Promo models
// ---------------------------------------------------------------------------

/// Row struct for reading from the promo_codes table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = promo_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PromoCodeRow {
    pub id: Uuid,
    pub code: String,
    pub effect: String,
    pub value: i64,
    pub usage_cap: i32,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    #[expect(dead_code, reason = "schema field kept for audit queries")]
    pub created_at: DateTime<Utc>,
}

impl PromoCodeRow {
    pub(crate) fn into_domain(self) -> Result<PromoCode, String> {
        let effect = PromoEffect::from_str(&self.effect)
            .map_err(|_| format!("unknown promo effect in database: {}", self.effect))?;

        Ok(PromoCode {
            id: self.id,
            code: self.code,
            effect,
            value: self.value,
            usage_cap: self.usage_cap,
            used_count: self.used_count,
            expires_at: self.expires_at,
        })
    }
}

/// Insertable struct for recording a promo claim.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = promo_usages)]
pub(crate) struct NewPromoUsageRow {
    pub user_id: Uuid,
    pub promo_id: Uuid,
}

// ---------------------------------------------------------------------------
// Referral models
// ---------------------------------------------------------------------------

/// Insertable struct for binding a referred user to a referrer.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referrals)]
pub(crate) struct NewReferralRow {
    pub referred_id: Uuid,
    pub referrer_id: Uuid,
}

// ---------------------------------------------------------------------------
// Payment models
// ---------------------------------------------------------------------------

/// Row struct for reading from the payments table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PaymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_kopecks: i64,
    pub reference: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRow {
    pub(crate) fn into_domain(self) -> Result<PaymentRecord, String> {
        let status = PaymentStatus::from_str(&self.status)
            .map_err(|_| format!("unknown payment status in database: {}", self.status))?;

        Ok(PaymentRecord {
            id: self.id,
            user_id: UserId::from_uuid(self.user_id),
            amount_kopecks: self.amount_kopecks,
            reference: self.reference,
            status,
            created_at: self.created_at,
        })
    }
}

/// Insertable struct for creating pending payment records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub(crate) struct NewPaymentRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_kopecks: i64,
    pub reference: &'a str,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> NewPaymentRow<'a> {
    pub(crate) fn from_domain(payment: &'a PaymentRecord) -> Self {
        Self {
            id: payment.id,
            user_id: *payment.user_id.as_uuid(),
            amount_kopecks: payment.amount_kopecks,
            reference: &payment.reference,
            status: payment.status.as_str(),
            created_at: payment.created_at,
        }
    }
}
