// API route configuration

use crate::api::handlers;
use crate::database_ops::store::CatalogReader;
use actix_web::web;

pub fn configure_routes<R>(cfg: &mut web::ServiceConfig)
where
    R: CatalogReader + 'static,
{
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/products")
                .route("/random", web::get().to(handlers::random_products::<R>)),
        );
}
