use actix_cors::Cors;

use crate::utils::REQUEST_ID_HEADER;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| {
            // 在生产环境中应该限制允许的域名
            true
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        // 让前端能读到请求 ID 以便排查日志
        .expose_headers(vec![REQUEST_ID_HEADER])
        .max_age(3600)
}
