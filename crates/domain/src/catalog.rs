//! Medicine catalogue: the inventory records the cart and order flows read.

use common::{MedicineId, Money, Patch};
use serde::Deserialize;
use store::{Medicine, MedicineRepository, NewMedicine, Store, Transaction};

use crate::error::DomainError;

/// Partial update of a medicine. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineUpdate {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub price: Patch<Money>,
    #[serde(default)]
    pub stock_quantity: Patch<i64>,
    #[serde(default)]
    pub manufacturer: Patch<String>,
    #[serde(default)]
    pub prescription_required: Patch<bool>,
}

fn validate_medicine(name: &str, price: Money, stock_quantity: i64) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("medicine name must not be empty"));
    }
    if !price.is_positive() {
        return Err(DomainError::validation(format!(
            "medicine price must be positive, got {price}"
        )));
    }
    if stock_quantity < 0 {
        return Err(DomainError::validation(format!(
            "stock quantity must not be negative, got {stock_quantity}"
        )));
    }
    Ok(())
}

/// Service for managing the medicine catalogue.
pub struct MedicineService<S: Store> {
    store: S,
}

impl<S: Store> MedicineService<S> {
    /// Creates a new medicine service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a medicine to the catalogue after trimming and validating it.
    #[tracing::instrument(skip(self, medicine), fields(name = %medicine.name))]
    pub async fn create_medicine(&self, mut medicine: NewMedicine) -> Result<Medicine, DomainError> {
        medicine.name = medicine.name.trim().to_string();
        validate_medicine(&medicine.name, medicine.price, medicine.stock_quantity)?;

        let mut tx = self.store.begin().await?;
        let created = tx.insert_medicine(medicine).await?;
        tx.commit().await?;

        tracing::info!(medicine_id = %created.id, "medicine created");
        Ok(created)
    }

    /// Gets a medicine by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_medicine(&self, id: MedicineId) -> Result<Medicine, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.get_medicine(id)
            .await?
            .ok_or(DomainError::MedicineNotFound(id))
    }

    /// Lists medicines by id, optionally only those with stock left.
    #[tracing::instrument(skip(self))]
    pub async fn list_medicines(&self, in_stock_only: bool) -> Result<Vec<Medicine>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_medicines(in_stock_only).await?)
    }

    /// Applies a partial update and validates the merged record.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_medicine(
        &self,
        id: MedicineId,
        update: MedicineUpdate,
    ) -> Result<Medicine, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut medicine = tx
            .lock_medicine(id)
            .await?
            .ok_or(DomainError::MedicineNotFound(id))?;

        if let Patch::Present(name) = update.name {
            medicine.name = name.trim().to_string();
        }
        update.description.apply_to(&mut medicine.description);
        update.price.apply_to(&mut medicine.price);
        update.stock_quantity.apply_to(&mut medicine.stock_quantity);
        update.manufacturer.apply_to(&mut medicine.manufacturer);
        update
            .prescription_required
            .apply_to(&mut medicine.prescription_required);
        validate_medicine(&medicine.name, medicine.price, medicine.stock_quantity)?;

        medicine.refresh_in_stock();
        medicine.updated_at = store::now();
        tx.update_medicine(&medicine).await?;
        tx.commit().await?;

        tracing::info!(medicine_id = %id, "medicine updated");
        Ok(medicine)
    }

    /// Removes a medicine from the catalogue.
    ///
    /// Fails with [`DomainError::MedicineInUse`] while any cart holds it.
    /// Orders already placed keep their lines.
    #[tracing::instrument(skip(self))]
    pub async fn delete_medicine(&self, id: MedicineId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if tx.lock_medicine(id).await?.is_none() {
            return Err(DomainError::MedicineNotFound(id));
        }

        let carts = tx.count_cart_references(id).await?;
        if carts > 0 {
            return Err(DomainError::MedicineInUse {
                medicine_id: id,
                carts,
            });
        }

        tx.delete_medicine(id).await?;
        tx.commit().await?;

        tracing::info!(medicine_id = %id, "medicine deleted");
        Ok(())
    }
}
