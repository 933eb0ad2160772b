use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Orders are written once with this status and never transitioned.
pub const ORDER_STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Client => "client",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farmer" => Ok(Role::Farmer),
            "client" => Ok(Role::Client),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
pub struct User {
    pub identifier: String,
    pub secret_hash: String,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub identifier: String,
    pub secret_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
pub struct FarmerProfile {
    pub identifier: String,
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub product_summary: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::farmer_profiles)]
pub struct NewFarmerProfile {
    pub identifier: String,
}

/// Full replace of the descriptive fields: absent fields become NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::farmer_profiles)]
#[diesel(treat_none_as_null = true)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub product_summary: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub farmer_identifier: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub id: Uuid,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub farmer_identifier: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub product_id: Uuid,
    pub client_identifier: String,
    pub quantity: BigDecimal,
    pub total_price: BigDecimal,
    pub farmer_identifier: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub id: Uuid,
    pub product_id: Uuid,
    pub client_identifier: String,
    pub quantity: BigDecimal,
    pub total_price: BigDecimal,
    pub farmer_identifier: String,
    pub status: String,
}
