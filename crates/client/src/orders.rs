//! Customer order history.

use serde::Deserialize;
use shopdesk_core::{Audience, OrderId};
use tracing::instrument;

use crate::dispatcher::{Dispatcher, Request};
use crate::error::Result;
use crate::models::{OrderDetail, OrderPage};

/// Page selection for [`OrderHistory::list`]; unset fields use the server
/// defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize)]
struct Resource<T> {
    data: T,
}

/// Read-only view of the signed-in customer's orders.
#[derive(Clone)]
pub struct OrderHistory {
    dispatcher: Dispatcher,
}

impl OrderHistory {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// One page of orders, newest first as the server sorts them.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCredential` without a customer session, or
    /// the dispatcher error.
    #[instrument(skip(self))]
    pub async fn list(&self, page: PageRequest) -> Result<OrderPage> {
        let mut request = Request::get("/client/orders")
            .for_audience(Audience::Customer)
            .require_credential();
        if let Some(number) = page.page {
            request = request.query("page", number);
        }
        if let Some(size) = page.per_page {
            request = request.query("per_page", size);
        }
        self.dispatcher.send_json(request).await
    }

    /// Full detail of one order.
    ///
    /// # Errors
    ///
    /// As [`OrderHistory::list`]; an unknown id is `ApiError::NotFound`.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get(&self, id: &OrderId) -> Result<OrderDetail> {
        let request = Request::get(format!("/client/orders/{id}"))
            .for_audience(Audience::Customer)
            .require_credential();
        let resource: Resource<OrderDetail> = self.dispatcher.send_json(request).await?;
        Ok(resource.data)
    }
}
