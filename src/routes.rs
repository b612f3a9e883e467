use crate::{
    api::{attendance, location, shift, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route rate limiters, built once at start-up and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests/min"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    // Public routes; registered first so the protected scope below does not claim them.
    cfg.service(
        web::scope(&format!("{}/auth", config.api_prefix))
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/users")
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    // before /{id} so "profile" is not parsed as an id
                    .service(web::resource("/profile").route(web::get().to(user::profile)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/locations")
                    .service(
                        web::resource("")
                            .route(web::get().to(location::list_locations))
                            .route(web::post().to(location::create_location)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(location::get_location))
                            .route(web::put().to(location::update_location))
                            .route(web::delete().to(location::delete_location)),
                    ),
            )
            .service(
                web::scope("/shifts")
                    .service(
                        web::resource("")
                            .route(web::get().to(shift::list_shifts))
                            .route(web::post().to(shift::create_shift)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(shift::get_shift))
                            .route(web::put().to(shift::update_shift))
                            .route(web::delete().to(shift::delete_shift)),
                    )
                    .service(
                        web::resource("/{id}/locations")
                            .route(web::get().to(shift::list_shift_locations)),
                    )
                    .service(
                        web::resource("/{id}/locations/{location_id}")
                            .route(web::post().to(shift::add_shift_location))
                            .route(web::delete().to(shift::remove_shift_location)),
                    )
                    .service(
                        web::resource("/{id}/assign/{user_id}")
                            .route(web::post().to(shift::assign_employee)),
                    )
                    .service(
                        web::resource("/{id}/unassign/{user_id}")
                            .route(web::post().to(shift::unassign_employee)),
                    )
                    .service(
                        web::resource("/{id}/employees")
                            .route(web::get().to(shift::list_shift_employees)),
                    ),
            )
            .service(
                web::scope("/attendances")
                    .service(web::resource("").route(web::get().to(attendance::list_attendances)))
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/history").route(web::get().to(attendance::history))),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiters_accept_zero_and_large_rates() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(1).is_ok());
        assert!(build_limiter(120_000).is_ok());
    }
}
