use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::store::{MarketStore, StoreError};
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::{amount_held, Payment, PaymentRequest};
use super::commands::PaymentCommand;
use super::errors::PaymentError;
use super::value_objects::PaymentStatus;

// ============================================================================
// Payment Command Handler
// ============================================================================

#[derive(Clone)]
pub struct PaymentCommandHandler {
    store: Arc<dyn MarketStore>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl PaymentCommandHandler {
    pub fn new(store: Arc<dyn MarketStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn handle(&self, command: PaymentCommand) -> Result<Payment, PaymentError> {
        match command {
            PaymentCommand::Record { order_id, request } => self.record(order_id, request).await,
            PaymentCommand::ChangeStatus { payment_id, status } => {
                self.change_status(payment_id, status).await
            }
        }
    }

    async fn record(&self, order_id: Uuid, request: PaymentRequest) -> Result<Payment, PaymentError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        let already_paid = amount_held(&self.store.payments_for_order(order_id).await?);

        let payment = Payment::for_order(&order, request, already_paid).inspect_err(|e| {
            tracing::warn!(order_id = %order_id, error = %e, "Payment rejected");
        })?;

        // The store re-checks the balance under its lock; a concurrent
        // payment may have taken the outstanding amount meanwhile.
        self.store.insert_payment(&payment).await.map_err(|e| match e {
            StoreError::Missing(_) => PaymentError::OrderNotFound(order_id),
            StoreError::Rejected(reason) => PaymentError::InvalidAmount(reason),
            other => PaymentError::Storage(other),
        })?;

        self.metrics.record_payment(payment.payment_method.as_str());
        tracing::info!(
            payment_id = %payment.id,
            order_id = %order_id,
            amount = %payment.amount,
            payment_type = %payment.payment_type,
            method = %payment.payment_method,
            "Payment recorded"
        );

        Ok(payment)
    }

    async fn change_status(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
    ) -> Result<Payment, PaymentError> {
        let metrics = &self.metrics;

        let (from, payment) = retry_on_transient(self.retry.clone(), move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("change_payment_status", attempt);
            }
            self.apply_status(payment_id, target)
        })
        .await
        .into_result()
        .inspect_err(|e| {
            tracing::warn!(payment_id = %payment_id, to = %target, error = %e, "Payment status change rejected");
        })?;

        self.metrics.record_payment_transition(from.as_str(), target.as_str());
        tracing::info!(payment_id = %payment_id, from = %from, to = %target, "Payment status changed");

        Ok(payment)
    }

    async fn apply_status(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
    ) -> Result<(PaymentStatus, Payment), PaymentError> {
        let payment = self
            .store
            .find_payment(payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))?;
        payment.check_transition(target)?;

        let updated = self
            .store
            .update_payment_status(payment_id, payment.status, target)
            .await
            .map_err(|e| match e {
                StoreError::Missing(_) => PaymentError::PaymentNotFound(payment_id),
                other => PaymentError::Storage(other),
            })?;
        Ok((payment.status, updated))
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))
    }

    /// Payments of an existing order, oldest first.
    pub async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, PaymentError> {
        if self.store.find_order(order_id).await?.is_none() {
            return Err(PaymentError::OrderNotFound(order_id));
        }
        Ok(self.store.payments_for_order(order_id).await?)
    }
}
