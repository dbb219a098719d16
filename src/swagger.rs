use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::subscription::create_subscription,
        handlers::subscription::list_subscriptions,
        handlers::subscription::calculate_cost,
        handlers::subscription::get_subscription,
        handlers::subscription::update_subscription,
        handlers::subscription::delete_subscription,
    ),
    components(
        schemas(
            CreateSubscriptionRequest,
            UpdateSubscriptionRequest,
            SubscriptionResponse,
            SubscriptionListQuery,
            CostQuery,
            CostResponse,
            ApiError,
        )
    ),
    tags(
        (name = "subscription", description = "Subscription records and cost aggregation API"),
    ),
    info(
        title = "Subscription Aggregator API",
        version = "1.0.0",
        description = "REST API for user subscription records and their monthly cost",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_subscription_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/subscriptions",
            "/subscriptions/cost",
            "/subscriptions/{id}",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected} in {paths:?}"
            );
        }
    }
}
