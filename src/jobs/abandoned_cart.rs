//! Abandoned-cart reminders.
//!
//! A cart is abandoned when it holds items, has not been modified for the
//! inactivity window, and its customer has not been reminded within the cooldown.
//! Each reminder is claimed by stamping `last_reminder_sent_at` before sending,
//! so overlapping sweeps never message the same customer twice.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, Query},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AbandonedCartConfig,
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    notifier::{Notification, NotificationKind, Notifier, NotifyError},
    services::catalog,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub matched: usize,
    pub notified: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Error)]
enum ReminderError {
    #[error(transparent)]
    Lookup(#[from] AppError),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

enum Reminder {
    Sent,
    Skipped,
}

/// Runs one sweep as of `now`. A failure for one cart is logged and counted,
/// and the sweep moves on to the next cart.
pub async fn sweep(
    orm: &DatabaseConnection,
    notifier: &dyn Notifier,
    config: &AbandonedCartConfig,
    now: DateTime<Utc>,
) -> AppResult<SweepReport> {
    // Postgres keeps microseconds; the claim is matched by exact value later.
    let now = now.trunc_subsecs(6);
    let idle_before: DateTimeWithTimeZone = (now - config.inactivity).into();
    let remind_before: DateTimeWithTimeZone = (now - config.cooldown).into();

    let carts = Carts::find()
        .filter(abandoned(idle_before, remind_before))
        .order_by_asc(CartCol::UpdatedAt)
        .all(orm)
        .await?;

    let mut report = SweepReport {
        matched: carts.len(),
        ..SweepReport::default()
    };

    for cart in carts {
        match remind(orm, notifier, &cart, idle_before, remind_before, now.into()).await {
            Ok(Reminder::Sent) => report.notified += 1,
            Ok(Reminder::Skipped) => report.skipped += 1,
            Err(err) => {
                report.failed += 1;
                tracing::warn!(cart_id = %cart.id, error = %err, "abandoned cart reminder failed");
            }
        }
    }

    Ok(report)
}

/// Idle, non-empty and out of cooldown. Checked again when claiming, since the
/// cart may change while earlier reminders are being sent.
fn abandoned(idle_before: DateTimeWithTimeZone, remind_before: DateTimeWithTimeZone) -> Condition {
    Condition::all()
        .add(CartCol::UpdatedAt.lt(idle_before))
        .add(
            Condition::any()
                .add(CartCol::LastReminderSentAt.is_null())
                .add(CartCol::LastReminderSentAt.lt(remind_before)),
        )
        .add(
            CartCol::Id.in_subquery(
                Query::select()
                    .column(CartItemCol::CartId)
                    .from(CartItems)
                    .to_owned(),
            ),
        )
}

async fn remind(
    orm: &DatabaseConnection,
    notifier: &dyn Notifier,
    cart: &CartModel,
    idle_before: DateTimeWithTimeZone,
    remind_before: DateTimeWithTimeZone,
    stamp: DateTimeWithTimeZone,
) -> Result<Reminder, ReminderError> {
    let Some(customer) = catalog::find_customer(orm, cart.user_id).await? else {
        tracing::warn!(cart_id = %cart.id, user_id = %cart.user_id, "cart owner not found");
        return Ok(Reminder::Skipped);
    };

    let claimed = Carts::update_many()
        .col_expr(CartCol::LastReminderSentAt, Expr::value(stamp))
        .filter(CartCol::Id.eq(cart.id))
        .filter(abandoned(idle_before, remind_before))
        .exec(orm)
        .await?;
    if claimed.rows_affected == 0 {
        tracing::debug!(cart_id = %cart.id, "cart no longer due a reminder");
        return Ok(Reminder::Skipped);
    }

    let notification = Notification::new(
        NotificationKind::AbandonedCart,
        customer.email.clone(),
        json!({
            "customer_name": customer.full_name(),
            "first_name": customer.first_name,
            "cart_id": cart.id,
        }),
    );

    if let Err(err) = notifier.send(notification).await {
        // Release the claim so the next sweep retries this cart.
        Carts::update_many()
            .col_expr(
                CartCol::LastReminderSentAt,
                Expr::value(cart.last_reminder_sent_at),
            )
            .filter(CartCol::Id.eq(cart.id))
            .filter(CartCol::LastReminderSentAt.eq(stamp))
            .exec(orm)
            .await?;
        return Err(err.into());
    }

    tracing::debug!(cart_id = %cart.id, recipient = %customer.email, "abandoned cart reminder sent");
    Ok(Reminder::Sent)
}

/// Periodic driver for [`sweep`]. Cancellation stops it between sweeps; a sweep
/// already in progress runs to completion.
pub struct AbandonedCartScheduler {
    orm: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    config: AbandonedCartConfig,
    shutdown: CancellationToken,
}

impl AbandonedCartScheduler {
    pub fn new(
        orm: DatabaseConnection,
        notifier: Arc<dyn Notifier>,
        config: AbandonedCartConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orm,
            notifier,
            config,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "abandoned cart scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sweeps start one interval after boot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match sweep(&self.orm, self.notifier.as_ref(), &self.config, Utc::now()).await {
                Ok(report) => tracing::info!(
                    matched = report.matched,
                    notified = report.notified,
                    failed = report.failed,
                    skipped = report.skipped,
                    "abandoned cart sweep finished"
                ),
                Err(err) => tracing::error!(error = %err, "abandoned cart sweep failed"),
            }
        }

        tracing::info!("abandoned cart scheduler stopped");
    }
}
