// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::database_ops::sampler::{parse_count, RandomSampler};
use crate::database_ops::store::CatalogReader;
use actix_web::{web, HttpResponse, Result};
use std::time::Instant;

/// Process-wide facts the health endpoint reports.
pub struct ServerState {
    pub started: Instant,
    pub engine: String,
}

pub async fn health_check(db: web::Data<Db>, state: web::Data<ServerState>) -> Result<HttpResponse> {
    let db_status = if db.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        engine: state.engine.clone(),
        uptime_seconds: state.started.elapsed().as_secs(),
    });

    Ok(HttpResponse::Ok().json(response))
}

/// `GET /api/products/random?count=N`
pub async fn random_products<R>(
    sampler: web::Data<RandomSampler<R>>,
    query: web::Query<RandomQuery>,
) -> Result<HttpResponse>
where
    R: CatalogReader + 'static,
{
    let RandomQuery { count: requested } = query.into_inner();
    let count = parse_count(requested.as_deref());

    match sampler.sample(Some(count)).await {
        Ok(products) => {
            let products: Vec<ProductDto> = products
                .into_iter()
                .filter_map(ProductDto::from_product)
                .collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(RandomProductsResponse {
                requested,
                count,
                products,
            })))
        }
        Err(e) => {
            tracing::error!(error = %e, count, "random sample failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("failed to sample products")))
        }
    }
}
