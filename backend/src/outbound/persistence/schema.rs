//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations exactly. Regenerate with
//! `diesel print-schema` after changing migrations, then restore the doc
//! comments on the constraints the application relies on.

diesel::table! {
    /// User accounts keyed by the external messenger identity.
    ///
    /// `external_id` carries a unique index; `balance_kopecks` is the cached
    /// ledger balance and is only ever written alongside a ledger entry.
    users (id) {
        id -> Uuid,
        external_id -> Int8,
        display_name -> Varchar,
        photo_url -> Nullable<Varchar>,
        balance_kopecks -> Int8,
        is_admin -> Bool,
        driver_categories -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Service orders through their lifecycle.
    ///
    /// `status` holds the stable string forms of the domain enum. The
    /// searching-to-accepted race is decided by a conditional update on this
    /// table, so `status` must never be written unconditionally.
    service_orders (id) {
        id -> Uuid,
        code -> Varchar,
        customer_id -> Uuid,
        driver_id -> Nullable<Uuid>,
        category -> Varchar,
        latitude -> Float8,
        longitude -> Float8,
        description -> Text,
        price_kopecks -> Int8,
        status -> Varchar,
        eta_from_minutes -> Nullable<Int2>,
        eta_to_minutes -> Nullable<Int2>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only balance movements.
    ///
    /// `payment_ref` carries a partial unique index (where not null); the
    /// constraint is what makes provider webhook replays idempotent.
    ledger_entries (id) {
        id -> Uuid,
        user_id -> Uuid,
        amount_kopecks -> Int8,
        category -> Varchar,
        description -> Text,
        payment_ref -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One live position row per driver, superseded on every report.
    driver_positions (driver_id) {
        driver_id -> Uuid,
        latitude -> Float8,
        longitude -> Float8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Promotional codes and their redemption budget.
    promo_codes (id) {
        id -> Uuid,
        code -> Varchar,
        effect -> Varchar,
        value -> Int8,
        usage_cap -> Int4,
        used_count -> Int4,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per user per claimed code; the composite primary key decides
    /// concurrent claims.
    promo_usages (user_id, promo_id) {
        user_id -> Uuid,
        promo_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Referral bindings; a user appears as `referred_id` at most once.
    referrals (referred_id) {
        referred_id -> Uuid,
        referrer_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Payment records keyed by the provider reference (unique index).
    payments (id) {
        id -> Uuid,
        user_id -> Uuid,
        amount_kopecks -> Int8,
        reference -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(service_orders -> users (customer_id));
diesel::joinable!(promo_usages -> promo_codes (promo_id));
diesel::joinable!(promo_usages -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    service_orders,
    ledger_entries,
    driver_positions,
    promo_codes,
    promo_usages,
    referrals,
    payments,
);
