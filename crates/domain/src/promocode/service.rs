//! Promocode catalogue: create, read, update and delete discount codes.

use chrono::{DateTime, Utc};
use common::{DiscountType, Money, Patch, PromocodeId, UserId};
use serde::Deserialize;
use store::{NewPromocode, Promocode, PromocodeRepository, Store, StoreError, Transaction};

use super::evaluator;
use crate::error::DomainError;

const CODE_CONSTRAINT: &str = "promocodes_code_key";

/// Partial update of a promocode. Absent fields are left unchanged.
///
/// The usage caps are `Patch<Option<i64>>`: an explicit `null` removes the
/// cap, an absent field keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromocodeUpdate {
    #[serde(default)]
    pub code: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub discount_type: Patch<DiscountType>,
    #[serde(default)]
    pub discount_value: Patch<i64>,
    #[serde(default)]
    pub valid_from: Patch<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Patch<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Patch<Option<i64>>,
    #[serde(default)]
    pub max_uses_per_user: Patch<Option<i64>>,
    #[serde(default)]
    pub is_active: Patch<bool>,
}

/// The fields every promocode write must satisfy.
struct Rules<'a> {
    code: &'a str,
    discount_type: DiscountType,
    discount_value: i64,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    max_uses: Option<i64>,
    max_uses_per_user: Option<i64>,
}

impl Rules<'_> {
    fn check(&self) -> Result<(), DomainError> {
        if self.code.is_empty() {
            return Err(DomainError::validation("promocode must not be empty"));
        }
        if self.discount_value <= 0 {
            return Err(DomainError::validation(
                "discount value must be greater than 0",
            ));
        }
        if self.discount_type == DiscountType::Percent && self.discount_value > 100 {
            return Err(DomainError::validation(format!(
                "percent discount must be at most 100, got {}",
                self.discount_value
            )));
        }
        if self.valid_to < self.valid_from {
            return Err(DomainError::validation(
                "valid_to must not be earlier than valid_from",
            ));
        }
        if self.max_uses.is_some_and(|n| n <= 0) {
            return Err(DomainError::validation("max_uses must be greater than 0"));
        }
        if self.max_uses_per_user.is_some_and(|n| n <= 0) {
            return Err(DomainError::validation(
                "max_uses_per_user must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl<'a> From<&'a NewPromocode> for Rules<'a> {
    fn from(p: &'a NewPromocode) -> Self {
        Self {
            code: &p.code,
            discount_type: p.discount_type,
            discount_value: p.discount_value,
            valid_from: p.valid_from,
            valid_to: p.valid_to,
            max_uses: p.max_uses,
            max_uses_per_user: p.max_uses_per_user,
        }
    }
}

impl<'a> From<&'a Promocode> for Rules<'a> {
    fn from(p: &'a Promocode) -> Self {
        Self {
            code: &p.code,
            discount_type: p.discount_type,
            discount_value: p.discount_value,
            valid_from: p.valid_from,
            valid_to: p.valid_to,
            max_uses: p.max_uses,
            max_uses_per_user: p.max_uses_per_user,
        }
    }
}

fn map_code_taken(e: StoreError, code: &str) -> DomainError {
    if e.is_unique_violation(CODE_CONSTRAINT) {
        DomainError::PromocodeCodeTaken(code.to_string())
    } else {
        DomainError::Store(e)
    }
}

/// Service for managing promocodes.
pub struct PromocodeService<S: Store> {
    store: S,
}

impl<S: Store> PromocodeService<S> {
    /// Creates a new promocode service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a promocode. Codes are unique.
    #[tracing::instrument(skip(self, promocode), fields(code = %promocode.code))]
    pub async fn create_promocode(
        &self,
        mut promocode: NewPromocode,
    ) -> Result<Promocode, DomainError> {
        promocode.code = promocode.code.trim().to_string();
        Rules::from(&promocode).check()?;

        let code = promocode.code.clone();
        let mut tx = self.store.begin().await?;
        let created = tx
            .insert_promocode(promocode)
            .await
            .map_err(|e| map_code_taken(e, &code))?;
        tx.commit().await?;

        tracing::info!(promocode_id = %created.id, code = %created.code, "promocode created");
        Ok(created)
    }

    /// Gets a promocode by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_promocode(&self, id: PromocodeId) -> Result<Promocode, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.get_promocode(id)
            .await?
            .ok_or(DomainError::PromocodeNotFound(id))
    }

    /// Lists every promocode, active or not.
    #[tracing::instrument(skip(self))]
    pub async fn list_promocodes(&self) -> Result<Vec<Promocode>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_promocodes().await?)
    }

    /// Applies `update` and re-validates the merged promocode.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_promocode(
        &self,
        id: PromocodeId,
        update: PromocodeUpdate,
    ) -> Result<Promocode, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut promocode = tx
            .get_promocode(id)
            .await?
            .ok_or(DomainError::PromocodeNotFound(id))?;

        if let Patch::Present(code) = update.code {
            promocode.code = code.trim().to_string();
        }
        update.description.apply_to(&mut promocode.description);
        update.discount_type.apply_to(&mut promocode.discount_type);
        update.discount_value.apply_to(&mut promocode.discount_value);
        update.valid_from.apply_to(&mut promocode.valid_from);
        update.valid_to.apply_to(&mut promocode.valid_to);
        update.max_uses.apply_to(&mut promocode.max_uses);
        update
            .max_uses_per_user
            .apply_to(&mut promocode.max_uses_per_user);
        update.is_active.apply_to(&mut promocode.is_active);
        Rules::from(&promocode).check()?;

        promocode.updated_at = store::now();
        tx.update_promocode(&promocode)
            .await
            .map_err(|e| map_code_taken(e, &promocode.code))?;
        tx.commit().await?;

        tracing::info!(promocode_id = %id, "promocode updated");
        Ok(promocode)
    }

    /// Deletes a promocode together with its redemption history.
    #[tracing::instrument(skip(self))]
    pub async fn delete_promocode(&self, id: PromocodeId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_promocode(id).await? {
            return Err(DomainError::PromocodeNotFound(id));
        }
        tx.commit().await?;

        tracing::info!(promocode_id = %id, "promocode deleted");
        Ok(())
    }

    /// Evaluates `code` for an order total without redeeming it.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(
        &self,
        code: &str,
        order_total: Money,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Money, DomainError> {
        let mut tx = self.store.begin().await?;
        let evaluation = evaluator::evaluate(&mut tx, code, order_total, user_id, now).await?;
        Ok(evaluation.discount)
    }
}
