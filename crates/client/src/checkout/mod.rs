//! Checkout orchestration.
//!
//! [`CheckoutOrchestrator`] turns the cart and the checkout form into one
//! order submission. The cart is cleared only once the server has confirmed
//! the order; any failure leaves both the cart and the form as they were.
//!
//! Each distinct snapshot gets its own submission id, sent as the
//! `Idempotency-Key` header and the `submission_id` field. Resubmitting the
//! same snapshot after a failure reuses the id so the server can recognise
//! the retry.

mod form;
mod notify;
mod submission;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shopdesk_core::Audience;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

pub use form::{CheckoutForm, CheckoutStep, CustomerDetails, PaymentMethod};
pub use notify::{Notification, Notifier, Severity, TracingNotifier};
pub use submission::{CheckoutSubmission, SubmissionLine};

use submission::{OrderResponse, SubmissionBody};

use crate::cart::Cart;
use crate::dispatcher::{Dispatcher, Request};
use crate::error::{ApiError, ErrorKind, add_breadcrumb};
use crate::models::Order;
use crate::profile::ProfileService;
use crate::session::{CustomerSession, SessionState};

const CHECKOUT_PATH: &str = "/client/checkout";

/// Why a submission produced no order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines; nothing was sent.
    #[error("Cart is empty")]
    EmptyCart,

    /// The request failed or the server refused the order.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Observes whether a submission is in flight, from outside the
/// orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SubmitIndicator(Arc<AtomicBool>);

impl SubmitIndicator {
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Resets the indicator when the submission ends, including on cancellation.
struct Submitting<'a>(&'a AtomicBool);

impl<'a> Submitting<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One checkout flow.
pub struct CheckoutOrchestrator {
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
    form: CheckoutForm,
    step: CheckoutStep,
    submitting: SubmitIndicator,
    pending: Option<(CheckoutSubmission, Uuid)>,
    last_order: Option<Order>,
}

impl CheckoutOrchestrator {
    /// Start a checkout with a blank form.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            dispatcher,
            notifier,
            form: CheckoutForm::default(),
            step: CheckoutStep::default(),
            submitting: SubmitIndicator::default(),
            pending: None,
            last_order: None,
        }
    }

    /// Start a checkout, pre-filling the form from the customer's saved
    /// details.
    ///
    /// Uses the session identity when it is known and otherwise tries the
    /// profile endpoint once. Any failure leaves the form blank.
    #[instrument(skip_all)]
    pub async fn start(
        dispatcher: Dispatcher,
        session: &CustomerSession,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut orchestrator = Self::new(dispatcher.clone(), notifier);

        let customer = match session.identity() {
            Some(customer) => Some(customer),
            None if session.state() == SessionState::Unverified => {
                match ProfileService::new(dispatcher, session.clone()).fetch().await {
                    Ok(profile) => session.identity().or(Some(profile.profile)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Checkout pre-fill skipped");
                        None
                    }
                }
            }
            None => None,
        };
        if let Some(customer) = customer {
            orchestrator.form.prefill_from(&customer);
        }
        orchestrator
    }

    #[must_use]
    pub const fn form(&self) -> &CheckoutForm {
        &self.form
    }

    pub const fn form_mut(&mut self) -> &mut CheckoutForm {
        &mut self.form
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Move to the following step; stays put on the last one.
    pub fn next_step(&mut self) {
        self.step = self.step.next();
    }

    /// Move to the preceding step; stays put on the first one.
    pub fn prev_step(&mut self) {
        self.step = self.step.prev();
    }

    /// Whether the checkout POST is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.is_submitting()
    }

    /// Handle for watching [`CheckoutOrchestrator::is_submitting`] while
    /// `submit` holds the orchestrator.
    #[must_use]
    pub fn indicator(&self) -> SubmitIndicator {
        self.submitting.clone()
    }

    /// The order confirmed by the last successful submission.
    #[must_use]
    pub const fn last_order(&self) -> Option<&Order> {
        self.last_order.as_ref()
    }

    /// Submit the cart and the form as an order.
    ///
    /// On success the cart is cleared and the order returned. On failure the
    /// cart and form are untouched and one error notification is emitted;
    /// nothing is retried automatically.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` without sending anything when the
    /// cart is empty, or `CheckoutError::Api` when the submission fails.
    #[instrument(skip_all, fields(lines = cart.len()))]
    pub async fn submit(&mut self, cart: &mut Cart) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            self.notifier.notify(Notification::new(
                Severity::Warning,
                "Empty cart",
                "Add products before placing an order.",
            ));
            return Err(CheckoutError::EmptyCart);
        }

        let submission = CheckoutSubmission::snapshot(&self.form, cart);
        let submission_id = self.submission_id(&submission);
        add_breadcrumb(
            "checkout",
            "submit",
            &[
                ("submission_id", submission_id.to_string()),
                ("lines", submission.items.len().to_string()),
            ],
        );

        let outcome = {
            let _submitting = Submitting::start(&self.submitting.0);
            self.send(&submission, submission_id).await
        };

        match outcome {
            Ok(order) => {
                self.pending = None;
                cart.clear();
                tracing::info!(
                    order_id = %order.id,
                    reference = %order.display_reference(),
                    "Order placed"
                );
                self.notifier.notify(Notification::new(
                    Severity::Success,
                    "Order placed",
                    format!("Your order {} has been recorded.", order.display_reference()),
                ));
                self.last_order = Some(order.clone());
                Ok(order)
            }
            Err(e) => {
                tracing::warn!(error = %e, %submission_id, "Checkout failed");
                if matches!(e.kind(), ErrorKind::Server | ErrorKind::Decode) {
                    sentry::capture_error(&e);
                }
                self.notifier.notify(failure_notification(&e));
                Err(CheckoutError::Api(e))
            }
        }
    }

    async fn send(
        &self,
        submission: &CheckoutSubmission,
        submission_id: Uuid,
    ) -> Result<Order, ApiError> {
        let request = Request::post(CHECKOUT_PATH)
            .for_audience(Audience::Customer)
            .idempotency_key(submission_id.to_string())
            .json(&SubmissionBody {
                submission,
                submission_id,
            })?;
        let response: OrderResponse = self.dispatcher.send_json(request).await?;
        Ok(response.into())
    }

    /// Id for `submission`: the pending one if the snapshot is unchanged,
    /// otherwise a fresh one.
    fn submission_id(&mut self, submission: &CheckoutSubmission) -> Uuid {
        if let Some((previous, id)) = &self.pending
            && previous == submission
        {
            return *id;
        }
        let id = Uuid::new_v4();
        self.pending = Some((submission.clone(), id));
        id
    }
}

fn failure_notification(error: &ApiError) -> Notification {
    let detail = match error.kind() {
        ErrorKind::Transport => "The shop could not be reached. Please try again.".to_string(),
        ErrorKind::Validation => error
            .field_errors()
            .and_then(|fields| fields.values().flatten().next().cloned())
            .unwrap_or_else(|| "Please check the information you entered.".to_string()),
        ErrorKind::Authentication => "Your session has expired. Please sign in again.".to_string(),
        _ => "The order could not be completed right now.".to_string(),
    };
    Notification::new(Severity::Error, "Checkout failed", detail)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use shopdesk_core::ProductId;

    use super::*;
    use crate::cart::ProductSnapshot;
    use crate::credentials::CredentialStore;
    use crate::dispatcher::{IDEMPOTENCY_HEADER, UnclassifiedPolicy};
    use crate::locale::LocalePreference;
    use crate::storage::MemoryStore;
    use crate::testing::{RecordingNotifier, ScriptedTransport};
    use crate::transport::TransportError;

    const ORDER: &str = r#"{"data":{"id":501,"reference":"CMD-501","status":"pending","total":"25.00"}}"#;

    struct Harness {
        credentials: CredentialStore,
        dispatcher: Dispatcher,
        transport: Arc<ScriptedTransport>,
        notifier: Arc<RecordingNotifier>,
        cart: Cart,
    }

    fn harness() -> Harness {
        let storage = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::load(storage.clone());
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Dispatcher::new(
            transport.clone(),
            credentials.clone(),
            LocalePreference::new(storage.clone()),
            "https://shop.example.fr/api",
            "/api",
            UnclassifiedPolicy::AdminFallback,
        );
        let mut cart = Cart::load(storage);
        cart.add_item(product(1, 10), 2);
        cart.add_item(product(2, 5), 1);
        Harness {
            credentials,
            dispatcher,
            transport,
            notifier: Arc::new(RecordingNotifier::new()),
            cart,
        }
    }

    fn product(id: i64, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::from(id),
            slug: None,
            name: format!("Product {id}"),
            price: Decimal::from(price),
            image_url: None,
            variant: None,
        }
    }

    fn orchestrator(h: &Harness) -> CheckoutOrchestrator {
        let mut checkout = CheckoutOrchestrator::new(h.dispatcher.clone(), h.notifier.clone());
        let details = &mut checkout.form_mut().customer;
        details.email = "jane@example.fr".to_string();
        details.first_name = "Jane".to_string();
        details.last_name = "Doe".to_string();
        checkout
    }

    #[tokio::test]
    async fn test_success_clears_cart_and_blocks_resubmission() {
        let mut h = harness();
        assert_eq!(h.cart.item_count(), 3);
        assert_eq!(h.cart.subtotal(), Decimal::from(25));
        h.credentials
            .set_token(Audience::Customer, SecretString::from("cus-1"));
        h.credentials
            .set_token(Audience::Admin, SecretString::from("adm-1"));
        h.transport.push_json(201, ORDER);
        let mut checkout = orchestrator(&h);

        let order = checkout.submit(&mut h.cart).await.unwrap();

        assert_eq!(order.display_reference(), "CMD-501");
        assert_eq!(checkout.last_order(), Some(&order));
        assert!(h.cart.is_empty());
        assert!(!checkout.is_submitting());
        assert_eq!(h.notifier.count(Severity::Success), 1);

        let sent = h.transport.last_request().unwrap();
        assert!(sent.url.ends_with("/client/checkout"));
        assert_eq!(sent.header("Authorization"), Some("Bearer cus-1"));
        let body = sent.body.clone().unwrap();
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["payment_method"], "cod");
        assert_eq!(body["submission_id"].as_str(), sent.header(IDEMPOTENCY_HEADER));

        let err = checkout.submit(&mut h.cart).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(h.transport.requests().len(), 1);
        assert_eq!(h.notifier.count(Severity::Warning), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_cart_untouched() {
        let mut h = harness();
        let before = h.cart.items().to_vec();
        h.transport.push_failure(TransportError::Timeout);
        let mut checkout = orchestrator(&h);
        let form_before = checkout.form().clone();

        let err = checkout.submit(&mut h.cart).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Api(ApiError::Transport(_))));
        assert_eq!(h.cart.items(), before.as_slice());
        assert_eq!(checkout.form(), &form_before);
        assert!(checkout.last_order().is_none());
        assert_eq!(h.notifier.count(Severity::Error), 1);
        assert_eq!(h.notifier.all().len(), 1);
        assert_eq!(h.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_of_same_snapshot_reuses_submission_id() {
        let mut h = harness();
        let mut checkout = orchestrator(&h);
        h.transport.push_failure(TransportError::Timeout);
        h.transport.push_json(201, ORDER);

        checkout.submit(&mut h.cart).await.unwrap_err();
        checkout.submit(&mut h.cart).await.unwrap();

        let keys: Vec<_> = h
            .transport
            .requests()
            .iter()
            .map(|r| r.header(IDEMPOTENCY_HEADER).unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn test_changed_snapshot_gets_new_submission_id() {
        let mut h = harness();
        let mut checkout = orchestrator(&h);
        h.transport.push_failure(TransportError::Timeout);
        h.transport.push_failure(TransportError::Timeout);

        checkout.submit(&mut h.cart).await.unwrap_err();
        h.cart.update_quantity(&ProductId::from(2), 4);
        checkout.submit(&mut h.cart).await.unwrap_err();

        let requests = h.transport.requests();
        assert_ne!(
            requests[0].header(IDEMPOTENCY_HEADER),
            requests[1].header(IDEMPOTENCY_HEADER)
        );
    }

    #[tokio::test]
    async fn test_validation_failure_surfaces_field_message() {
        let mut h = harness();
        let mut checkout = orchestrator(&h);
        h.transport.push_json(
            422,
            r#"{"message":"Invalid","errors":{"customer.billing_address.line1":["The street is required."]}}"#,
        );

        let err = checkout.submit(&mut h.cart).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Api(ApiError::Validation { .. })));
        let notification = h.notifier.all().pop().unwrap();
        assert_eq!(notification.detail, "The street is required.");
        assert_eq!(h.cart.len(), 2);
    }

    #[tokio::test]
    async fn test_notes_and_payment_method_are_forwarded() {
        let mut h = harness();
        let mut checkout = orchestrator(&h);
        checkout.form_mut().notes = " Leave at the door ".to_string();
        checkout.form_mut().payment_method = PaymentMethod::BankTransfer;
        h.transport.push_json(201, ORDER);

        checkout.submit(&mut h.cart).await.unwrap();

        let body = h.transport.last_request().unwrap().body.unwrap();
        assert_eq!(body["notes"], "Leave at the door");
        assert_eq!(body["payment_method"], "bank_transfer");
    }

    #[tokio::test]
    async fn test_steps_do_not_gate_submit() {
        let mut h = harness();
        let mut checkout = orchestrator(&h);
        checkout.prev_step();
        assert_eq!(checkout.step(), CheckoutStep::Info);
        h.transport.push_json(201, ORDER);

        assert!(checkout.submit(&mut h.cart).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_prefills_from_profile_and_swallows_failures() {
        let h = harness();
        let session = CustomerSession::new(h.dispatcher.clone());

        let checkout = CheckoutOrchestrator::start(h.dispatcher.clone(), &session, h.notifier.clone()).await;
        assert_eq!(checkout.form(), &CheckoutForm::default());
        assert!(h.transport.requests().is_empty());

        h.credentials
            .set_token(Audience::Customer, SecretString::from("cus-1"));
        h.transport.push_json(
            200,
            r#"{"profile":{"id":7,"name":"Jane Doe","email":"jane@example.fr","first_name":"Jane","phone":"0102030405"}}"#,
        );
        let checkout = CheckoutOrchestrator::start(h.dispatcher.clone(), &session, h.notifier.clone()).await;
        assert_eq!(checkout.form().customer.first_name, "Jane");
        assert_eq!(checkout.form().customer.phone, "0102030405");

        let other = harness();
        other
            .credentials
            .set_token(Audience::Customer, SecretString::from("cus-2"));
        other.transport.push_json(500, "");
        let session = CustomerSession::new(other.dispatcher.clone());
        let checkout =
            CheckoutOrchestrator::start(other.dispatcher.clone(), &session, other.notifier.clone()).await;
        assert_eq!(checkout.form(), &CheckoutForm::default());
        assert!(other.notifier.all().is_empty());
        assert!(other.credentials.has_token(Audience::Customer));
    }
}
