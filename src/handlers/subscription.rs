use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, error, web};

use crate::error::AppError;
use crate::models::*;
use crate::services::SubscriptionService;
use crate::utils::RequestContext;

#[utoipa::path(
    post,
    path = "/subscriptions",
    tag = "subscription",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "创建订阅成功", body = SubscriptionResponse),
        (status = 400, description = "请求参数错误"),
        (status = 409, description = "订阅已存在")
    )
)]
pub async fn create_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    body: web::Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service.create(&ctx, body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscriptions",
    tag = "subscription",
    params(
        ("user_id" = Option<String>, Query, description = "用户 UUID"),
        ("service_name" = Option<String>, Query, description = "服务名称（不区分大小写的子串匹配）"),
        ("limit" = Option<i64>, Query, description = "返回数量 1-1000，默认 100"),
        ("offset" = Option<i64>, Query, description = "偏移量，默认 0")
    ),
    responses(
        (status = 200, description = "获取订阅列表成功", body = [SubscriptionResponse]),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "没有匹配的订阅")
    )
)]
pub async fn list_subscriptions(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    query: web::Query<SubscriptionListQuery>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service.get_all(&ctx, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscriptions/cost",
    tag = "subscription",
    params(
        ("user_id" = Option<String>, Query, description = "用户 UUID"),
        ("service_name" = Option<String>, Query, description = "服务名称（不区分大小写的子串匹配）"),
        ("start_date" = String, Query, description = "统计起始月份 MM-YYYY"),
        ("end_date" = String, Query, description = "统计结束月份 MM-YYYY")
    ),
    responses(
        (status = 200, description = "计算总费用成功", body = CostResponse),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn calculate_cost(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    query: web::Query<CostQuery>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service.calculate_cost(&ctx, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/subscriptions/{id}",
    tag = "subscription",
    params(("id" = i64, Path, description = "订阅 ID")),
    responses(
        (status = 200, description = "获取订阅成功", body = SubscriptionResponse),
        (status = 404, description = "订阅不存在")
    )
)]
pub async fn get_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service.get_by_id(&ctx, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/subscriptions/{id}",
    tag = "subscription",
    params(("id" = i64, Path, description = "订阅 ID")),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "更新订阅成功", body = SubscriptionResponse),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "订阅不存在")
    )
)]
pub async fn update_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateSubscriptionRequest>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service
        .update(&ctx, path.into_inner(), body.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/subscriptions/{id}",
    tag = "subscription",
    params(("id" = i64, Path, description = "订阅 ID")),
    responses(
        (status = 204, description = "删除订阅成功"),
        (status = 404, description = "订阅不存在")
    )
)]
pub async fn delete_subscription(
    service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let ctx = RequestContext::from_request(&req);

    match service.delete(&ctx, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

// 解析失败统一返回 INVALID_REQUEST 信封
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::InvalidRequest(err.to_string()))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::InvalidRequest(err.to_string()))
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::InvalidRequest(err.to_string()))
    }));
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscriptions")
            .configure(extractor_configs)
            .route("", web::post().to(create_subscription))
            .route("", web::get().to(list_subscriptions))
            .route("/cost", web::get().to(calculate_cost))
            .route("/{id}", web::get().to(get_subscription))
            .route("/{id}", web::put().to(update_subscription))
            .route("/{id}", web::delete().to(delete_subscription)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemorySubscriptionRepository;
    use crate::utils::REQUEST_ID_HEADER;
    use crate::validation::SubscriptionValidator;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> SubscriptionService {
        SubscriptionService::new(
            Arc::new(InMemorySubscriptionRepository::new()),
            Arc::new(SubscriptionValidator::new()),
        )
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(service()))
                    .service(web::scope("/api/v1").configure(subscription_config)),
            )
            .await
        };
    }

    fn body(user_id: Uuid) -> Value {
        json!({
            "service_name": "Yandex Plus",
            "price": 400,
            "user_id": user_id,
            "start_date": "07-2025"
        })
    }

    #[actix_web::test]
    async fn test_create_and_get() {
        let app = app!();
        let user_id = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .insert_header((REQUEST_ID_HEADER, "req-1"))
            .set_json(body(user_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["start_date"], "07-2025");
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/subscriptions/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched: Value = test::read_body_json(resp).await;
        assert_eq!(fetched["data"], created["data"]);
    }

    #[actix_web::test]
    async fn test_create_duplicate_is_conflict() {
        let app = app!();
        let user_id = Uuid::new_v4();
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let req = test::TestRequest::post()
                .uri("/api/v1/subscriptions")
                .set_json(body(user_id))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[actix_web::test]
    async fn test_invalid_payloads_are_bad_request() {
        let app = app!();
        let mut zero_price = body(Uuid::new_v4());
        zero_price["price"] = json!(0);

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(zero_price)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["code"], "INVALID_REQUEST");

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_update_and_delete() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(Uuid::new_v4()))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/subscriptions/{id}"))
            .set_json(json!({ "price": 500 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Value = test::read_body_json(resp).await;
        assert_eq!(updated["data"]["price"], 500);
        assert_eq!(updated["data"]["service_name"], "Yandex Plus");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/subscriptions/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/subscriptions/{id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["error"]["code"], "NOT_FOUND");
    }

    #[actix_web::test]
    async fn test_list_empty_is_not_found() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["error"]["code"], "NO_SUBSCRIPTIONS_FOUND");
    }

    #[actix_web::test]
    async fn test_cost_route_is_not_shadowed_by_id() {
        let app = app!();
        let user_id = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(user_id))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/v1/subscriptions/cost?user_id={user_id}&start_date=07-2025&end_date=09-2025"
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cost: Value = test::read_body_json(resp).await;
        assert_eq!(cost["data"]["total_cost"], 400);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/cost?start_date=01-2020&end_date=02-2020")
            .to_request();
        let cost: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(cost["data"]["total_cost"], 0);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/cost?service_name=&start_date=07-2025&end_date=07-2025")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cost: Value = test::read_body_json(resp).await;
        assert_eq!(cost["data"]["total_cost"], 400);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/cost?start_date=2025-07&end_date=09-2025")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
