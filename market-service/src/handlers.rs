use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{
    pooled_connection::bb8::{Pool, PooledConnection},
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use num_traits::Zero;
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::MarketError;
use crate::models::{
    FarmerProfile, NewFarmerProfile, NewOrder, NewProduct, NewUser, Order, Product,
    ProfileUpdate, Role, User, ORDER_STATUS_PENDING,
};
use crate::schema::{farmer_profiles, orders, products, users};

pub type DbPool = Pool<AsyncPgConnection>;

async fn connect(pool: &DbPool) -> Result<PooledConnection<'_, AsyncPgConnection>, MarketError> {
    pool.get().await.map_err(MarketError::internal)
}

fn require_fields(fields: &[&str]) -> Result<(), MarketError> {
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(MarketError::InvalidInput(
            "All fields are required!".to_string(),
        ));
    }
    Ok(())
}

fn require_positive(value: &BigDecimal, message: &str) -> Result<(), MarketError> {
    if value <= &BigDecimal::zero() {
        return Err(MarketError::InvalidInput(message.to_string()));
    }
    Ok(())
}

async fn ensure_role(
    conn: &mut AsyncPgConnection,
    identifier: &str,
    role: Role,
    missing: &str,
) -> Result<(), MarketError> {
    let account = users::table
        .filter(users::identifier.eq(identifier))
        .filter(users::role.eq(role.as_str()))
        .first::<User>(conn)
        .await
        .optional()?;
    if account.is_none() {
        return Err(MarketError::NotFound(missing.to_string()));
    }
    Ok(())
}

/// Holds account identity, credentials and role.
#[derive(Clone)]
pub struct AccountStore {
    pool: DbPool,
}

impl AccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates the account and, for farmers, the empty profile in one
    /// transaction. A duplicate identifier never produces a second row.
    pub async fn register(
        &self,
        identifier: &str,
        secret: &str,
        role: Role,
    ) -> Result<(), MarketError> {
        require_fields(&[identifier, secret])?;
        let new_user = NewUser {
            identifier: identifier.to_string(),
            secret_hash: auth::hash_secret(secret)?,
            role: role.as_str().to_string(),
        };

        let mut conn = connect(&self.pool).await?;
        conn.transaction::<_, MarketError, _>(|conn| {
            Box::pin(async move {
                match diesel::insert_into(users::table)
                    .values(&new_user)
                    .execute(conn)
                    .await
                {
                    Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                        return Err(MarketError::Conflict(
                            "Account already exists!".to_string(),
                        ));
                    }
                    result => {
                        result?;
                    }
                }

                if role == Role::Farmer {
                    let profile = NewFarmerProfile {
                        identifier: new_user.identifier.clone(),
                    };
                    diesel::insert_into(farmer_profiles::table)
                        .values(&profile)
                        .execute(conn)
                        .await?;
                }

                Ok(())
            })
        })
        .await?;

        info!("registered {} account {}", role, identifier);
        Ok(())
    }

    /// Exact identifier+role match, then hash verification. Any mismatch is
    /// the same `Unauthorized` to the caller.
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        role: Role,
    ) -> Result<User, MarketError> {
        require_fields(&[identifier, secret])?;
        let mut conn = connect(&self.pool).await?;
        let user = users::table
            .filter(users::identifier.eq(identifier))
            .filter(users::role.eq(role.as_str()))
            .first::<User>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| MarketError::Unauthorized("Invalid credentials!".to_string()))?;

        if !auth::verify_secret(secret, &user.secret_hash)? {
            return Err(MarketError::Unauthorized("Invalid credentials!".to_string()));
        }
        Ok(user)
    }

    pub async fn reset_secret(
        &self,
        identifier: &str,
        role: Role,
        new_secret: &str,
    ) -> Result<(), MarketError> {
        require_fields(&[identifier, new_secret])?;
        let hash = auth::hash_secret(new_secret)?;
        let mut conn = connect(&self.pool).await?;
        let updated = diesel::update(
            users::table
                .filter(users::identifier.eq(identifier))
                .filter(users::role.eq(role.as_str())),
        )
        .set(users::secret_hash.eq(hash))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            return Err(MarketError::NotFound("Account not found!".to_string()));
        }
        info!("reset secret for {} account {}", role, identifier);
        Ok(())
    }
}

/// Farmer-facing descriptive metadata, one row per farmer account.
#[derive(Clone)]
pub struct ProfileManager {
    pool: DbPool,
}

impl ProfileManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, identifier: &str) -> Result<FarmerProfile, MarketError> {
        let mut conn = connect(&self.pool).await?;
        farmer_profiles::table
            .find(identifier)
            .first::<FarmerProfile>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| MarketError::NotFound("Farmer profile not found!".to_string()))
    }

    pub async fn update(
        &self,
        identifier: &str,
        update: ProfileUpdate,
    ) -> Result<(), MarketError> {
        let mut conn = connect(&self.pool).await?;
        let updated = diesel::update(farmer_profiles::table.find(identifier))
            .set((&update, farmer_profiles::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Err(MarketError::NotFound("Farmer profile not found!".to_string()));
        }
        Ok(())
    }
}

/// Product listings owned by farmer accounts.
#[derive(Clone)]
pub struct Catalog {
    pool: DbPool,
    enforce_ownership: bool,
}

impl Catalog {
    pub fn new(pool: DbPool, enforce_ownership: bool) -> Self {
        Self {
            pool,
            enforce_ownership,
        }
    }

    pub async fn add_product(
        &self,
        name: &str,
        quantity: BigDecimal,
        unit_price: BigDecimal,
        farmer: &str,
    ) -> Result<Product, MarketError> {
        require_fields(&[name, farmer])?;
        require_positive(&quantity, "Quantity and price must be greater than 0!")?;
        require_positive(&unit_price, "Quantity and price must be greater than 0!")?;

        let mut conn = connect(&self.pool).await?;
        ensure_role(&mut conn, farmer, Role::Farmer, "Farmer not found!").await?;

        let new_product = NewProduct {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit_price,
            farmer_identifier: farmer.to_string(),
        };
        let product = diesel::insert_into(products::table)
            .values(&new_product)
            .get_result::<Product>(&mut conn)
            .await?;

        info!("farmer {} listed product {}", farmer, product.id);
        Ok(product)
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, MarketError> {
        let mut conn = connect(&self.pool).await?;
        Ok(products::table
            .order(products::created_at.asc())
            .load::<Product>(&mut conn)
            .await?)
    }

    pub async fn list_by_farmer(&self, farmer: &str) -> Result<Vec<Product>, MarketError> {
        let mut conn = connect(&self.pool).await?;
        Ok(products::table
            .filter(products::farmer_identifier.eq(farmer))
            .order(products::created_at.asc())
            .load::<Product>(&mut conn)
            .await?)
    }

    /// Full replace of name/quantity/price; ownership is immutable.
    pub async fn update_product(
        &self,
        id: Uuid,
        name: &str,
        quantity: BigDecimal,
        unit_price: BigDecimal,
        farmer: &str,
    ) -> Result<(), MarketError> {
        require_fields(&[name])?;
        require_positive(&quantity, "Quantity and price must be greater than 0!")?;
        require_positive(&unit_price, "Quantity and price must be greater than 0!")?;

        let mut conn = connect(&self.pool).await?;
        let existing = products::table
            .find(id)
            .first::<Product>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| MarketError::NotFound("Product not found!".to_string()))?;
        if existing.farmer_identifier != farmer {
            return Err(MarketError::Forbidden(
                "Not authorized to modify this product!".to_string(),
            ));
        }

        diesel::update(products::table.find(id))
            .set((
                products::name.eq(name),
                products::quantity.eq(quantity),
                products::unit_price.eq(unit_price),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Idempotent removal. Ownership enforcement is a deployment choice;
    /// when on, deleting another farmer's product is `Forbidden`.
    pub async fn delete_product(&self, id: Uuid, farmer: &str) -> Result<(), MarketError> {
        let mut conn = connect(&self.pool).await?;
        if self.enforce_ownership {
            let existing = products::table
                .find(id)
                .first::<Product>(&mut conn)
                .await
                .optional()?;
            if let Some(product) = existing {
                if product.farmer_identifier != farmer {
                    return Err(MarketError::Forbidden(
                        "Not authorized to delete this product!".to_string(),
                    ));
                }
            }
        }

        diesel::delete(products::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

/// Validates and executes purchases against the catalog.
#[derive(Clone)]
pub struct OrderEngine {
    pool: DbPool,
    delete_at_zero: bool,
}

impl OrderEngine {
    pub fn new(pool: DbPool, delete_at_zero: bool) -> Self {
        Self {
            pool,
            delete_at_zero,
        }
    }

    /// The one correctness-sensitive operation in the system: the stock
    /// decrement and the order insert commit together or not at all. The
    /// guarded UPDATE takes the product's row lock, so a concurrent order
    /// re-evaluates `quantity >= $q` against the committed value and the
    /// sum of successful decrements can never exceed the stock.
    pub async fn place_order(
        &self,
        product_id: Uuid,
        client: &str,
        quantity: BigDecimal,
    ) -> Result<Order, MarketError> {
        require_fields(&[client])?;
        require_positive(&quantity, "Quantity must be greater than 0!")?;

        let mut conn = connect(&self.pool).await?;
        ensure_role(&mut conn, client, Role::Client, "Client not found!").await?;

        let delete_at_zero = self.delete_at_zero;
        let client = client.to_string();
        let order = conn
            .transaction::<_, MarketError, _>(|conn| {
                Box::pin(async move {
                    let decremented = diesel::update(
                        products::table
                            .filter(products::id.eq(product_id))
                            .filter(products::quantity.ge(quantity.clone())),
                    )
                    .set((
                        products::quantity.eq(products::quantity - quantity.clone()),
                        products::updated_at.eq(Utc::now()),
                    ))
                    .get_result::<Product>(conn)
                    .await
                    .optional()?;

                    let product = match decremented {
                        Some(product) => product,
                        None => {
                            let existing = products::table
                                .find(product_id)
                                .first::<Product>(conn)
                                .await
                                .optional()?;
                            return Err(match existing {
                                Some(product) => MarketError::InsufficientStock {
                                    available: product.quantity.normalized(),
                                },
                                None => {
                                    MarketError::NotFound("Product not found!".to_string())
                                }
                            });
                        }
                    };

                    let total_price = &quantity * &product.unit_price;
                    let new_order = NewOrder {
                        id: Uuid::new_v4(),
                        product_id,
                        client_identifier: client,
                        quantity,
                        total_price,
                        farmer_identifier: product.farmer_identifier.clone(),
                        status: ORDER_STATUS_PENDING.to_string(),
                    };
                    let order = diesel::insert_into(orders::table)
                        .values(&new_order)
                        .get_result::<Order>(conn)
                        .await?;

                    if delete_at_zero && product.quantity.is_zero() {
                        diesel::delete(products::table.find(product_id))
                            .execute(conn)
                            .await?;
                    }

                    Ok(order)
                })
            })
            .await?;

        info!(
            "order {} placed by {} for product {}",
            order.id, order.client_identifier, product_id
        );
        Ok(order)
    }

    /// Orders joined with the product name. LEFT so that rows survive a
    /// later product deletion.
    pub async fn list_for_client(
        &self,
        client: &str,
    ) -> Result<Vec<(Order, Option<String>)>, MarketError> {
        let mut conn = connect(&self.pool).await?;
        Ok(orders::table
            .left_join(products::table)
            .filter(orders::client_identifier.eq(client))
            .order(orders::created_at.asc())
            .select((orders::all_columns, products::name.nullable()))
            .load::<(Order, Option<String>)>(&mut conn)
            .await?)
    }
}
