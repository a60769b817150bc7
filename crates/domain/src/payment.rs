//! Payment Ledger.
//!
//! Payments are plain ledger rows. Recording a payment checks the order out
//! (draft to pending payment); a payment that succeeds marks a pending order
//! as paid.

use common::{Money, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus};
use serde::Deserialize;
use store::{NewPayment, OrderRepository, Payment, PaymentRepository, Store, Transaction};

use crate::error::DomainError;
use crate::order::apply_transition;

/// Command to record a payment attempt against an order.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
}

/// Service for recording and settling payments.
pub struct PaymentService<S: Store> {
    store: S,
}

impl<S: Store> PaymentService<S> {
    /// Creates a new payment service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a pending payment for the full final price of the order.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment(&self, cmd: RecordPayment) -> Result<Payment, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(cmd.order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(cmd.order_id))?;

        if !order.order_status.accepts_payment() {
            return Err(DomainError::IllegalTransition {
                from: order.order_status,
                to: OrderStatus::PendingPayment,
            });
        }
        if cmd.amount != order.final_price {
            return Err(DomainError::validation(format!(
                "payment amount {} does not match order total {}",
                cmd.amount, order.final_price
            )));
        }

        let payment = tx
            .insert_payment(NewPayment {
                order_id: cmd.order_id,
                amount: cmd.amount,
                method: cmd.method,
            })
            .await?;

        if order.order_status == OrderStatus::Draft {
            apply_transition(&mut tx, &mut order, OrderStatus::PendingPayment).await?;
            tx.update_order(&order).await?;
        }
        tx.commit().await?;

        metrics::counter!("payments_recorded_total").increment(1);
        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount = %payment.amount,
            method = %payment.method,
            "payment recorded"
        );
        Ok(payment)
    }

    /// Gets a payment by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: PaymentId) -> Result<Payment, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.get_payment(payment_id)
            .await?
            .ok_or(DomainError::PaymentNotFound(payment_id))
    }

    /// Lists an order's payments, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_payments(&self, order_id: OrderId) -> Result<Vec<Payment>, DomainError> {
        let mut tx = self.store.begin().await?;
        if tx.get_order(order_id).await?.is_none() {
            return Err(DomainError::OrderNotFound(order_id));
        }
        Ok(tx.list_payments_for_order(order_id).await?)
    }

    /// Settles a pending payment as succeeded or failed.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Payment, DomainError> {
        if !status.is_settled() {
            return Err(DomainError::validation(
                "payment status can only change to succeeded or failed",
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut payment = tx
            .lock_payment(payment_id)
            .await?
            .ok_or(DomainError::PaymentNotFound(payment_id))?;

        if payment.status.is_settled() {
            return Err(DomainError::PaymentAlreadySettled {
                payment_id,
                status: payment.status,
            });
        }

        let now = store::now();
        payment.status = status;
        payment.updated_at = now;
        if status == PaymentStatus::Succeeded {
            payment.paid_at = Some(now);
        }
        tx.update_payment(&payment).await?;

        if status == PaymentStatus::Succeeded {
            let mut order = tx
                .lock_order(payment.order_id)
                .await?
                .ok_or(DomainError::OrderNotFound(payment.order_id))?;
            if order.order_status == OrderStatus::PendingPayment {
                apply_transition(&mut tx, &mut order, OrderStatus::Paid).await?;
                tx.update_order(&order).await?;
            }
        }
        tx.commit().await?;

        metrics::counter!("payments_settled_total", "status" => status.as_str()).increment(1);
        tracing::info!(%payment_id, %status, "payment settled");
        Ok(payment)
    }
}
