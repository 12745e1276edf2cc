#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use storefront_checkout::{
    db::{create_in_memory_conn, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    models::PaymentProvider,
    notifier::{Notification, NotificationKind, Notifier, NotifyError},
    payments::{GatewayError, PaymentGateway, PaymentGateways, PaymentInit, PaymentSession},
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Settled,
    NotSettled,
    Unavailable,
}

/// Gateway double whose verification answer is set by the test.
pub struct FakeGateway {
    provider: PaymentProvider,
    verdict: Mutex<Verdict>,
    verify_calls: AtomicUsize,
    init_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new(provider: PaymentProvider) -> Self {
        Self {
            provider,
            verdict: Mutex::new(Verdict::Settled),
            verify_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError> {
        let n = self.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("{}_{}_{n}", self.provider, request.order_number);
        Ok(match self.provider {
            PaymentProvider::Stripe => PaymentSession {
                provider: self.provider,
                client_secret: Some(format!("{reference}_secret")),
                reference,
                authorization_url: None,
                access_code: None,
            },
            PaymentProvider::Paystack => PaymentSession {
                provider: self.provider,
                authorization_url: Some(format!("https://checkout.test/{reference}")),
                access_code: Some("ac_test".into()),
                reference,
                client_secret: None,
            },
        })
    }

    async fn verify(&self, _reference: &str) -> Result<bool, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match *self.verdict.lock().unwrap() {
            Verdict::Settled => Ok(true),
            Verdict::NotSettled => Ok(false),
            Verdict::Unavailable => Err(GatewayError::UnexpectedResponse {
                provider: self.provider,
                detail: "connection reset".into(),
            }),
        }
    }
}

/// Notifier double that records deliveries and can refuse chosen recipients.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn recover(&self, recipient: &str) {
        self.failing.lock().unwrap().remove(recipient);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Waits for fire-and-forget deliveries to land.
    pub async fn wait_for(&self, kind: NotificationKind, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.sent_of(kind);
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent_of(kind)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.lock().unwrap().contains(&notification.recipient) {
            return Err(NotifyError::Rejected(503));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub stripe: Arc<FakeGateway>,
    pub paystack: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let orm = create_in_memory_conn().await?;
    run_migrations(&orm).await?;

    let stripe = Arc::new(FakeGateway::new(PaymentProvider::Stripe));
    let paystack = Arc::new(FakeGateway::new(PaymentProvider::Paystack));
    let notifier = Arc::new(RecordingNotifier::default());

    let gateways = PaymentGateways::new("usd")
        .with_gateway(stripe.clone())
        .with_gateway(paystack.clone());

    let state = AppState {
        orm,
        gateways: Arc::new(gateways),
        notifier: notifier.clone(),
        jwt_secret: Arc::from(JWT_SECRET),
    };

    Ok(TestApp {
        state,
        stripe,
        paystack,
        notifier,
    })
}

pub async fn create_user(
    state: &AppState,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.into()),
        first_name: Set(first_name.into()),
        last_name: Set(last_name.into()),
        role: Set(role.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
    })
}

pub async fn create_customer(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    create_user(state, email, "Grace", "Hopper", "customer").await
}

pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, "admin@example.com", "Ada", "Admin", "admin").await
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    is_active: bool,
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let slug = name.to_lowercase().replace(' ', "-");
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        slug: Set(slug),
        image_url: Set(Some(format!("https://img.test/{}.png", name.len()))),
        price: Set(price),
        is_active: Set(is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}
