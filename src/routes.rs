use crate::{api::attendance, auth::middleware::auth_middleware, config::Config};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / u64::from(requests_per_min)).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let (Some(protected_limiter), Some(punch_limiter)) = (
        build_limiter(config.rate_protected_per_min),
        build_limiter(config.rate_punch_per_min),
    ) else {
        tracing::error!("Rate limiter configuration rejected, attendance routes not mounted");
        return;
    };

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance/punch
                    .service(
                        web::resource("/punch")
                            .wrap(punch_limiter)
                            .route(web::post().to(attendance::punch)),
                    )
                    // /attendance/finalize
                    .service(
                        web::resource("/finalize").route(web::post().to(attendance::finalize)),
                    )
                    // /attendance/{employee_id}/{date}
                    .service(
                        web::resource("/{employee_id}/{date}")
                            .route(web::get().to(attendance::get_record)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_zero_and_large_rates() {
        assert!(build_limiter(0).is_some());
        assert!(build_limiter(30).is_some());
        assert!(build_limiter(120_000).is_some());
    }
}
