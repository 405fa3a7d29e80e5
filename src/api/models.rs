// API response models (DTOs)

use crate::database_ops::entities::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub engine: String,
    pub uptime_seconds: u64,
}

/// `count` stays a string so junk input falls back to the default size
/// instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    pub count: Option<String>,
}

/// Public shape of a sampled product. Prices are integer cents.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub net_price_cents: i64,
    pub image_url: String,
    pub category_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl ProductDto {
    /// Products without a primary key were never committed and are not exposed.
    pub fn from_product(p: Product) -> Option<Self> {
        let id = p.id?;
        let category_id = p.category_id();
        Some(Self {
            id,
            identifier: p.identifier,
            name: p.name,
            slug: p.slug,
            description: p.description,
            price_cents: p.price_cents,
            net_price_cents: p.net_price_cents,
            image_url: p.image_url,
            category_id,
            updated_at: p.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomProductsResponse {
    pub requested: Option<String>,
    pub count: i64,
    pub products: Vec<ProductDto>,
}
