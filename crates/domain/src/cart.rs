//! Cart Mutation Service.
//!
//! Every mutation runs in one store transaction that locks the user's cart
//! row first and the medicine row second, so two concurrent additions of the
//! same medicine cannot both pass the stock check. Stock is only checked
//! here; it is decremented when an order is created.

use common::{MedicineId, UserId};
use store::{
    Cart, CartItem, CartRepository, Medicine, MedicineRepository, Store, Transaction,
};

use crate::error::DomainError;

/// Service for mutating per-user carts.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds `quantity` units of a medicine to the user's cart, creating the
    /// cart if needed and merging with an existing line for the medicine.
    ///
    /// Returns the cart with recomputed totals.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        medicine_id: MedicineId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        let result = self.try_add_item(user_id, medicine_id, quantity).await;

        match &result {
            Ok(cart) => {
                metrics::counter!("cart_items_added_total").increment(1);
                tracing::info!(
                    %user_id,
                    %medicine_id,
                    quantity,
                    total = %cart.total_price,
                    "cart item added"
                );
            }
            Err(e) => {
                metrics::counter!("cart_add_rejected_total").increment(1);
                tracing::debug!(%user_id, %medicine_id, quantity, error = %e, "cart item rejected");
            }
        }

        result
    }

    async fn try_add_item(
        &self,
        user_id: UserId,
        medicine_id: MedicineId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if !user_id.is_valid() {
            return Err(DomainError::validation("user id must not be zero"));
        }

        let mut tx = self.store.begin().await?;
        let cart = tx.lock_or_create_cart(user_id).await?;
        let medicine = lock_medicine(&mut tx, medicine_id).await?;

        let requested = cart
            .item(medicine_id)
            .map_or(quantity, |item| item.quantity.saturating_add(quantity));
        ensure_in_stock(&medicine, requested)?;
        ensure_line_fits(&medicine, requested)?;

        let item = match cart.item(medicine_id) {
            Some(existing) => {
                let mut item = existing.clone();
                item.reprice(requested, medicine.price);
                item
            }
            None => CartItem::for_medicine(&medicine, requested),
        };
        tx.upsert_cart_item(cart.id, &item).await?;

        let cart = refresh_total(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Returns the user's cart with totals recomputed from its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut cart = tx
            .get_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;
        cart.recompute_total();
        Ok(cart)
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        medicine_id: MedicineId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }

        let mut tx = self.store.begin().await?;
        let cart = tx
            .lock_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;
        let mut item = cart
            .item(medicine_id)
            .cloned()
            .ok_or(DomainError::CartItemNotFound {
                user_id,
                medicine_id,
            })?;

        if quantity == 0 {
            tx.delete_cart_item(cart.id, medicine_id).await?;
        } else {
            let medicine = lock_medicine(&mut tx, medicine_id).await?;
            ensure_in_stock(&medicine, quantity)?;
            ensure_line_fits(&medicine, quantity)?;
            item.reprice(quantity, medicine.price);
            tx.upsert_cart_item(cart.id, &item).await?;
        }

        let cart = refresh_total(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(%user_id, %medicine_id, quantity, "cart item quantity set");
        Ok(cart)
    }

    /// Removes one line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        medicine_id: MedicineId,
    ) -> Result<Cart, DomainError> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .lock_cart(user_id)
            .await?
            .ok_or(DomainError::CartNotFound(user_id))?;

        if !tx.delete_cart_item(cart.id, medicine_id).await? {
            return Err(DomainError::CartItemNotFound {
                user_id,
                medicine_id,
            });
        }

        let cart = refresh_total(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(%user_id, %medicine_id, "cart item removed");
        Ok(cart)
    }

    /// Removes every line from the user's cart.
    ///
    /// Idempotent: clearing a missing or empty cart succeeds. Returns whether
    /// the user had a cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<bool, DomainError> {
        let mut tx = self.store.begin().await?;
        let Some(cart) = tx.lock_cart(user_id).await? else {
            return Ok(false);
        };

        let removed = tx.clear_cart(cart.id).await?;
        tx.set_cart_total(cart.id, common::Money::zero()).await?;
        tx.commit().await?;

        tracing::info!(%user_id, removed, "cart cleared");
        Ok(true)
    }
}

async fn lock_medicine<T: Transaction>(
    tx: &mut T,
    medicine_id: MedicineId,
) -> Result<Medicine, DomainError> {
    tx.lock_medicine(medicine_id)
        .await?
        .ok_or(DomainError::MedicineNotFound(medicine_id))
}

fn ensure_in_stock(medicine: &Medicine, requested: i64) -> Result<(), DomainError> {
    if requested > medicine.stock_quantity {
        return Err(DomainError::OutOfStock {
            medicine_id: medicine.id,
            requested,
            available: medicine.stock_quantity,
        });
    }
    Ok(())
}

fn ensure_line_fits(medicine: &Medicine, quantity: i64) -> Result<(), DomainError> {
    if medicine.price.checked_multiply(quantity).is_none() {
        return Err(DomainError::validation(format!(
            "line total for {quantity} units of medicine {} is too large",
            medicine.id
        )));
    }
    Ok(())
}

/// Re-reads the cart, recomputes its total from the lines and stores it.
///
/// Fails without writing when the total does not fit in [`Money`].
async fn refresh_total<T: Transaction>(tx: &mut T, user_id: UserId) -> Result<Cart, DomainError> {
    let mut cart = tx
        .get_cart(user_id)
        .await?
        .ok_or(DomainError::CartNotFound(user_id))?;
    let total = cart
        .checked_total()
        .ok_or_else(|| DomainError::validation("cart total is too large"))?;
    cart.total_price = total;
    tx.set_cart_total(cart.id, total).await?;
    Ok(cart)
}
