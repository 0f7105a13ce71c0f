use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, Scope, get, web};

use crate::api::{attendance, leave_request, payroll};
use crate::config::Config;
use crate::error::HrError;

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter settings for the protected scope. `None` if the quota
/// cannot be expressed.
pub fn limiter_config(requests_per_min: u32) -> Option<LimiterConfig> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed bodies, queries and paths answer with the same 400 envelope
/// as every other validation failure.
fn extractor_configs() -> (web::JsonConfig, web::QueryConfig, web::PathConfig) {
    (
        web::JsonConfig::default().error_handler(|err, _| HrError::validation(err.to_string()).into()),
        web::QueryConfig::default().error_handler(|err, _| HrError::validation(err.to_string()).into()),
        web::PathConfig::default().error_handler(|err, _| HrError::validation(err.to_string()).into()),
    )
}

/// All engine endpoints under `prefix`, without rate limiting.
pub fn api_scope(prefix: &str) -> Scope {
    let (json, query, path) = extractor_configs();

    web::scope(prefix)
        .app_data(json)
        .app_data(query)
        .app_data(path)
        .service(
            web::scope("/attendance")
                .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
                .service(web::resource("/today").route(web::get().to(attendance::today)))
                .service(web::resource("/history").route(web::get().to(attendance::history)))
                .service(
                    web::resource("/summary/{month}/{year}").route(web::get().to(attendance::my_summary)),
                )
                .service(
                    web::resource("/employee/{user_id}/summary/{month}/{year}")
                        .route(web::get().to(attendance::employee_summary)),
                )
                .service(web::resource("/all").route(web::get().to(attendance::all))),
        )
        .service(
            web::scope("/leaves")
                // /leaves
                .service(
                    web::resource("")
                        .route(web::get().to(leave_request::leave_list))
                        .route(web::post().to(leave_request::create_leave)),
                )
                // registered before /{id} so it is not read as an id
                .service(web::resource("/balance").route(web::get().to(leave_request::leave_balance)))
                // /leaves/{id}
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(leave_request::get_leave))
                        .route(web::delete().to(leave_request::cancel_leave)),
                )
                // /leaves/{id}/approve
                .service(
                    web::resource("/{id}/approve").route(web::patch().to(leave_request::approve_leave)),
                ),
        )
        .service(
            web::scope("/salary")
                .service(web::resource("").route(web::get().to(payroll::list_salaries)))
                .service(
                    web::resource("/calculate/{user_id}").route(web::post().to(payroll::calculate_salary)),
                )
                .service(
                    web::resource("/calculate-bulk").route(web::post().to(payroll::calculate_bulk_salary)),
                )
                .service(web::resource("/summary").route(web::get().to(payroll::salary_summary)))
                .service(web::resource("/my-history").route(web::get().to(payroll::my_history)))
                .service(web::resource("/{id}").route(web::get().to(payroll::get_salary))),
        )
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: &LimiterConfig) {
    cfg.service(health);

    // Protected routes
    cfg.service(
        api_scope(&config.api_prefix)
            .wrap(Governor::new(limiter)), // rate limiting
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_config_accepts_edge_quotas() {
        assert!(limiter_config(1000).is_some());
        assert!(limiter_config(0).is_some());
        assert!(limiter_config(120_000).is_some());
    }
}
