use std::str::FromStr;

use async_trait::async_trait;
use common::{
    CartId, MedicineId, Money, OrderId, ParseEnumError, PaymentId, PaymentStatus, PromocodeId,
    UserId,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};

use crate::store::{
    CartRepository, MedicineRepository, OrderRepository, PaymentRepository, PromocodeRepository,
    Store, Transaction, now,
};
use crate::{
    Cart, CartItem, Medicine, NewMedicine, NewOrder, NewPayment, NewPromocode, Order, OrderLine,
    Payment, Promocode, Result, StoreError,
};

const MEDICINE_COLUMNS: &str = "id, name, description, price, stock_quantity, in_stock, \
     manufacturer, prescription_required, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, order_status, total_price, discount_total, \
     final_price, delivery_address, comment, promocode, created_at, updated_at";

const PROMOCODE_COLUMNS: &str = "id, code, description, discount_type, discount_value, \
     valid_from, valid_to, max_uses, max_uses_per_user, is_active, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, amount, status, method, paid_at, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

/// A transaction over a [`PgStore`]. Row locks are released on commit or drop.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn decode_enum<T>(table: &'static str, value: String) -> Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value.parse().map_err(|e: ParseEnumError| StoreError::CorruptRow {
        table,
        reason: e.to_string(),
    })
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        };
    }
    StoreError::Database(e)
}

fn row_to_medicine(row: PgRow) -> Result<Medicine> {
    Ok(Medicine {
        id: MedicineId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_minor(row.try_get("price")?),
        stock_quantity: row.try_get("stock_quantity")?,
        in_stock: row.try_get("in_stock")?,
        manufacturer: row.try_get("manufacturer")?,
        prescription_required: row.try_get("prescription_required")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        medicine_id: MedicineId::new(row.try_get("medicine_id")?),
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        price_per_unit: Money::from_minor(row.try_get("price_per_unit")?),
        line_total: Money::from_minor(row.try_get("line_total")?),
    })
}

fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        medicine_id: MedicineId::new(row.try_get("medicine_id")?),
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        price_per_unit: Money::from_minor(row.try_get("price_per_unit")?),
        line_total: Money::from_minor(row.try_get("line_total")?),
    })
}

/// Maps an order row; lines are loaded separately.
fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        order_status: decode_enum("orders", row.try_get("order_status")?)?,
        total_price: Money::from_minor(row.try_get("total_price")?),
        discount_total: Money::from_minor(row.try_get("discount_total")?),
        final_price: Money::from_minor(row.try_get("final_price")?),
        delivery_address: row.try_get("delivery_address")?,
        comment: row.try_get("comment")?,
        promocode: row.try_get("promocode")?,
        lines: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_promocode(row: PgRow) -> Result<Promocode> {
    Ok(Promocode {
        id: PromocodeId::new(row.try_get("id")?),
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        discount_type: decode_enum("promocodes", row.try_get("discount_type")?)?,
        discount_value: row.try_get("discount_value")?,
        valid_from: row.try_get("valid_from")?,
        valid_to: row.try_get("valid_to")?,
        max_uses: row.try_get("max_uses")?,
        max_uses_per_user: row.try_get("max_uses_per_user")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        amount: Money::from_minor(row.try_get("amount")?),
        status: decode_enum("payments", row.try_get("status")?)?,
        method: decode_enum("payments", row.try_get("method")?)?,
        paid_at: row.try_get("paid_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgTransaction {
    async fn fetch_medicine(&mut self, id: MedicineId, lock: bool) -> Result<Option<Medicine>> {
        let sql = format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_medicine).transpose()
    }

    async fn fetch_cart(&mut self, user_id: UserId, lock: bool) -> Result<Option<Cart>> {
        let sql = format!(
            "SELECT id, user_id, total_price, created_at, updated_at FROM carts WHERE user_id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let Some(row) = sqlx::query(&sql)
            .bind(user_id.get())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let cart_id = CartId::new(row.try_get("id")?);
        let items = sqlx::query(
            r#"
            SELECT medicine_id, name, quantity, price_per_unit, line_total
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_id.get())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_cart_item)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart {
            id: cart_id,
            user_id: UserId::new(row.try_get("user_id")?),
            items,
            total_price: Money::from_minor(row.try_get("total_price")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn load_order_lines(&mut self, order: &mut Order) -> Result<()> {
        order.lines = sqlx::query(
            r#"
            SELECT medicine_id, name, quantity, price_per_unit, line_total
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order.id.get())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_order_line)
        .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    async fn fetch_order(&mut self, id: OrderId, lock: bool) -> Result<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let mut order = row_to_order(row)?;
        self.load_order_lines(&mut order).await?;
        Ok(Some(order))
    }

    async fn fetch_payment(&mut self, id: PaymentId, lock: bool) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_payment).transpose()
    }

    async fn touch_cart(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart_id.get())
            .bind(now())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MedicineRepository for PgTransaction {
    async fn insert_medicine(&mut self, medicine: NewMedicine) -> Result<Medicine> {
        let timestamp = now();
        let sql = format!(
            r#"
            INSERT INTO medicines (name, description, price, stock_quantity, in_stock,
                                   manufacturer, prescription_required, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {MEDICINE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&medicine.name)
            .bind(&medicine.description)
            .bind(medicine.price.minor())
            .bind(medicine.stock_quantity)
            .bind(medicine.stock_quantity > 0)
            .bind(&medicine.manufacturer)
            .bind(medicine.prescription_required)
            .bind(timestamp)
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_medicine(row)
    }

    async fn get_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>> {
        self.fetch_medicine(id, false).await
    }

    async fn lock_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>> {
        self.fetch_medicine(id, true).await
    }

    async fn list_medicines(&mut self, in_stock_only: bool) -> Result<Vec<Medicine>> {
        let sql = format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE ($1 = FALSE OR stock_quantity > 0) ORDER BY id ASC"
        );
        sqlx::query(&sql)
            .bind(in_stock_only)
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(row_to_medicine)
            .collect()
    }

    async fn update_medicine(&mut self, medicine: &Medicine) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET name = $2, description = $3, price = $4, stock_quantity = $5,
                in_stock = $5 > 0, manufacturer = $6, prescription_required = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(medicine.id.get())
        .bind(&medicine.name)
        .bind(&medicine.description)
        .bind(medicine.price.minor())
        .bind(medicine.stock_quantity)
        .bind(&medicine.manufacturer)
        .bind(medicine.prescription_required)
        .bind(medicine.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "medicines",
                id: medicine.id.get(),
            });
        }
        Ok(())
    }

    async fn decrement_stock(&mut self, id: MedicineId, quantity: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET stock_quantity = stock_quantity - $2,
                in_stock = stock_quantity - $2 > 0,
                updated_at = $3
            WHERE id = $1 AND stock_quantity >= $2
            "#,
        )
        .bind(id.get())
        .bind(quantity)
        .bind(now())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_stock(&mut self, id: MedicineId, quantity: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET stock_quantity = stock_quantity + $2,
                in_stock = stock_quantity + $2 > 0,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(quantity)
        .bind(now())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "medicines",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn count_cart_references(&mut self, id: MedicineId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE medicine_id = $1")
                .bind(id.get())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }

    async fn delete_medicine(&mut self, id: MedicineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CartRepository for PgTransaction {
    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.fetch_cart(user_id, false).await
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.fetch_cart(user_id, true).await
    }

    async fn lock_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        let timestamp = now();
        sqlx::query(
            r#"
            INSERT INTO carts (user_id, total_price, created_at, updated_at)
            VALUES ($1, 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.get())
        .bind(timestamp)
        .execute(&mut *self.tx)
        .await?;

        self.fetch_cart(user_id, true)
            .await?
            .ok_or(StoreError::MissingRow {
                table: "carts",
                id: user_id.get(),
            })
    }

    async fn upsert_cart_item(&mut self, cart_id: CartId, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, medicine_id, name, quantity, price_per_unit, line_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cart_id, medicine_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                price_per_unit = EXCLUDED.price_per_unit,
                line_total = EXCLUDED.line_total
            "#,
        )
        .bind(cart_id.get())
        .bind(item.medicine_id.get())
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.price_per_unit.minor())
        .bind(item.line_total.minor())
        .execute(&mut *self.tx)
        .await?;

        self.touch_cart(cart_id).await
    }

    async fn delete_cart_item(
        &mut self,
        cart_id: CartId,
        medicine_id: MedicineId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND medicine_id = $2")
            .bind(cart_id.get())
            .bind(medicine_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_cart_total(&mut self, cart_id: CartId, total: Money) -> Result<()> {
        let result =
            sqlx::query("UPDATE carts SET total_price = $2, updated_at = $3 WHERE id = $1")
                .bind(cart_id.get())
                .bind(total.minor())
                .bind(now())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "carts",
                id: cart_id.get(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let timestamp = now();
        let sql = format!(
            r#"
            INSERT INTO orders (user_id, order_status, total_price, discount_total, final_price,
                                delivery_address, comment, promocode, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(order.user_id.get())
            .bind(order.order_status.as_str())
            .bind(order.total_price.minor())
            .bind(order.discount_total.minor())
            .bind(order.final_price.minor())
            .bind(&order.delivery_address)
            .bind(&order.comment)
            .bind(&order.promocode)
            .bind(timestamp)
            .fetch_one(&mut *self.tx)
            .await?;
        let mut record = row_to_order(row)?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, medicine_id, name, quantity, price_per_unit, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(record.id.get())
            .bind(line.medicine_id.get())
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.price_per_unit.minor())
            .bind(line.line_total.minor())
            .execute(&mut *self.tx)
            .await?;
        }

        record.lines = order.lines;
        Ok(record)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, false).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, true).await
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let mut orders = sqlx::query(&sql)
            .bind(user_id.get())
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;

        for order in &mut orders {
            self.load_order_lines(order).await?;
        }
        Ok(orders)
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET order_status = $2, delivery_address = $3, comment = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id.get())
        .bind(order.order_status.as_str())
        .bind(&order.delivery_address)
        .bind(&order.comment)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "orders",
                id: order.id.get(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PromocodeRepository for PgTransaction {
    async fn insert_promocode(&mut self, promocode: NewPromocode) -> Result<Promocode> {
        let timestamp = now();
        let sql = format!(
            r#"
            INSERT INTO promocodes (code, description, discount_type, discount_value, valid_from,
                                    valid_to, max_uses, max_uses_per_user, is_active,
                                    created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {PROMOCODE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&promocode.code)
            .bind(&promocode.description)
            .bind(promocode.discount_type.as_str())
            .bind(promocode.discount_value)
            .bind(promocode.valid_from)
            .bind(promocode.valid_to)
            .bind(promocode.max_uses)
            .bind(promocode.max_uses_per_user)
            .bind(promocode.is_active)
            .bind(timestamp)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_unique_violation)?;
        row_to_promocode(row)
    }

    async fn get_promocode(&mut self, id: PromocodeId) -> Result<Option<Promocode>> {
        let sql = format!("SELECT {PROMOCODE_COLUMNS} FROM promocodes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_promocode).transpose()
    }

    async fn lock_promocode_by_code(&mut self, code: &str) -> Result<Option<Promocode>> {
        let sql = format!("SELECT {PROMOCODE_COLUMNS} FROM promocodes WHERE code = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(row_to_promocode).transpose()
    }

    async fn list_promocodes(&mut self) -> Result<Vec<Promocode>> {
        let sql = format!("SELECT {PROMOCODE_COLUMNS} FROM promocodes ORDER BY id ASC");
        sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(row_to_promocode)
            .collect()
    }

    async fn update_promocode(&mut self, promocode: &Promocode) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE promocodes
            SET code = $2, description = $3, discount_type = $4, discount_value = $5,
                valid_from = $6, valid_to = $7, max_uses = $8, max_uses_per_user = $9,
                is_active = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(promocode.id.get())
        .bind(&promocode.code)
        .bind(&promocode.description)
        .bind(promocode.discount_type.as_str())
        .bind(promocode.discount_value)
        .bind(promocode.valid_from)
        .bind(promocode.valid_to)
        .bind(promocode.max_uses)
        .bind(promocode.max_uses_per_user)
        .bind(promocode.is_active)
        .bind(promocode.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "promocodes",
                id: promocode.id.get(),
            });
        }
        Ok(())
    }

    async fn delete_promocode(&mut self, id: PromocodeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM promocodes WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_redemptions(&mut self, id: PromocodeId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM promocode_redemptions WHERE promocode_id = $1")
                .bind(id.get())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }

    async fn count_user_redemptions(&mut self, id: PromocodeId, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM promocode_redemptions WHERE promocode_id = $1 AND user_id = $2",
        )
        .bind(id.get())
        .bind(user_id.get())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn record_redemption(
        &mut self,
        id: PromocodeId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO promocode_redemptions (promocode_id, user_id, order_id, redeemed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id.get())
        .bind(user_id.get())
        .bind(order_id.get())
        .bind(now())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PgTransaction {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        let timestamp = now();
        let sql = format!(
            r#"
            INSERT INTO payments (order_id, amount, status, method, paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(payment.order_id.get())
            .bind(payment.amount.minor())
            .bind(PaymentStatus::Pending.as_str())
            .bind(payment.method.as_str())
            .bind(timestamp)
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_payment(row)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.fetch_payment(id, false).await
    }

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.fetch_payment(id, true).await
    }

    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        let sql =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id ASC");
        sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(row_to_payment)
            .collect()
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, paid_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(payment.id.get())
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "payments",
                id: payment.id.get(),
            });
        }
        Ok(())
    }

    async fn has_succeeded_payment(&mut self, order_id: OrderId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE order_id = $1 AND status = $2)",
        )
        .bind(order_id.get())
        .bind(PaymentStatus::Succeeded.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }
}
