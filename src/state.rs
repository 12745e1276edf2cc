use std::sync::Arc;

use crate::{db::OrmConn, notifier::Notifier, payments::PaymentGateways};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub gateways: Arc<PaymentGateways>,
    pub notifier: Arc<dyn Notifier>,
    pub jwt_secret: Arc<str>,
}
