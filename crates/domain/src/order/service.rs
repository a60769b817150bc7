//! Order Lifecycle Manager.

use common::{MedicineId, Money, OrderId, OrderStatus, Patch, UserId};
use store::{
    CartRepository, MedicineRepository, NewOrder, Order, OrderLine, OrderRepository,
    PaymentRepository, PromocodeRepository, Store, Transaction,
};

use super::{CreateOrder, OrderUpdate};
use crate::error::DomainError;
use crate::promocode;

/// Moves `order` to `to` inside the caller's transaction.
///
/// Enforces the status table, requires a succeeded payment before `Paid` and
/// returns the order's stock when it is canceled. The caller persists the
/// order afterwards.
pub(crate) async fn apply_transition<T: Transaction>(
    tx: &mut T,
    order: &mut Order,
    to: OrderStatus,
) -> Result<(), DomainError> {
    let from = order.order_status;
    if !from.can_transition_to(to) {
        return Err(DomainError::IllegalTransition { from, to });
    }

    match to {
        OrderStatus::Paid => {
            if !tx.has_succeeded_payment(order.id).await? {
                return Err(DomainError::PaymentRequired(order.id));
            }
        }
        OrderStatus::Canceled => {
            for line in by_medicine(&order.lines, |l| l.medicine_id) {
                tx.increment_stock(line.medicine_id, line.quantity).await?;
            }
        }
        _ => {}
    }

    order.order_status = to;
    order.updated_at = store::now();

    metrics::counter!("order_status_transitions_total", "to" => to.as_str()).increment(1);
    tracing::info!(order_id = %order.id, %from, %to, "order status changed");
    Ok(())
}

/// Returns `items` ordered by medicine id. Stock rows are always locked in
/// this order.
fn by_medicine<T>(items: &[T], medicine_id: impl Fn(&T) -> MedicineId) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| medicine_id(*item));
    sorted
}

/// Service for managing orders.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the user's cart.
    ///
    /// In one transaction: snapshots the cart lines, applies the promocode,
    /// takes the ordered units out of stock, records the redemption and
    /// empties the cart.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let delivery_address = cmd.delivery_address.trim().to_string();
        if delivery_address.is_empty() {
            return Err(DomainError::validation("delivery address must not be empty"));
        }
        if !cmd.user_id.is_valid() {
            return Err(DomainError::validation("user id must not be zero"));
        }
        let code = cmd
            .promocode
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let mut tx = self.store.begin().await?;
        let cart = match tx.lock_cart(cmd.user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(DomainError::CartEmpty(cmd.user_id)),
        };
        let total_price = cart
            .checked_total()
            .ok_or_else(|| DomainError::validation("cart total is too large"))?;

        let evaluation = match code {
            Some(code) => {
                Some(promocode::evaluate(&mut tx, code, total_price, cmd.user_id, cmd.now).await?)
            }
            None => None,
        };
        let discount_total = evaluation
            .as_ref()
            .map_or(Money::zero(), |e| e.discount);
        let final_price = total_price.saturating_sub_floor_zero(discount_total);

        for item in by_medicine(&cart.items, |i| i.medicine_id) {
            if !tx.decrement_stock(item.medicine_id, item.quantity).await? {
                let available = tx
                    .get_medicine(item.medicine_id)
                    .await?
                    .map_or(0, |m| m.stock_quantity);
                return Err(DomainError::OutOfStock {
                    medicine_id: item.medicine_id,
                    requested: item.quantity,
                    available,
                });
            }
        }

        let order = tx
            .insert_order(NewOrder {
                user_id: cmd.user_id,
                order_status: OrderStatus::Draft,
                total_price,
                discount_total: total_price - final_price,
                final_price,
                delivery_address,
                comment: cmd.comment,
                promocode: evaluation.as_ref().map(|e| e.promocode.code.clone()),
                lines: cart.items.iter().map(OrderLine::from).collect(),
            })
            .await?;

        if let Some(evaluation) = &evaluation {
            tx.record_redemption(evaluation.promocode.id, cmd.user_id, order.id)
                .await?;
        }

        tx.clear_cart(cart.id).await?;
        tx.set_cart_total(cart.id, Money::zero()).await?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        if evaluation.is_some() {
            metrics::counter!("promocode_redemptions_total").increment(1);
        }
        tracing::info!(
            order_id = %order.id,
            total = %order.total_price,
            discount = %order.discount_total,
            final_price = %order.final_price,
            "order created"
        );

        Ok(order)
    }

    /// Gets an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.get_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_orders_for_user(user_id).await?)
    }

    /// Moves an order to `target` per the status table.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        apply_transition(&mut tx, &mut order, target).await?;
        tx.update_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Applies a partial update.
    ///
    /// Address and comment change freely, the status follows the same rules
    /// as [`transition_status`](Self::transition_status) and prices never
    /// change.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_order(
        &self,
        order_id: OrderId,
        update: OrderUpdate,
    ) -> Result<Order, DomainError> {
        if let Some(field) = update.immutable_field() {
            return Err(DomainError::ImmutableField { field });
        }

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        if order.order_status.is_terminal() {
            let to = update
                .order_status
                .into_option()
                .unwrap_or(order.order_status);
            return Err(DomainError::IllegalTransition {
                from: order.order_status,
                to,
            });
        }

        if let Patch::Present(address) = update.delivery_address {
            let address = address.trim();
            if address.is_empty() {
                return Err(DomainError::validation("delivery address must not be empty"));
            }
            order.delivery_address = address.to_string();
        }
        update.comment.apply_to(&mut order.comment);

        if let Patch::Present(status) = update.order_status
            && status != order.order_status
        {
            apply_transition(&mut tx, &mut order, status).await?;
        }

        order.updated_at = store::now();
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, "order updated");
        Ok(order)
    }
}
