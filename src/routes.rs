use crate::{
    api::{attendance, class, report, school, student, user},
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

/// Requests-per-minute limiter keyed on the peer address. A limit of 0 is
/// treated as 1.
fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

/// Rate limiters shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
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
                web::resource("/register-school")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register_school)),
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
                web::scope("/attendance")
                    .service(web::resource("/mark").route(web::post().to(attendance::mark_attendance)))
                    .service(
                        web::resource("/recognize").route(web::post().to(attendance::recognize_attendance)),
                    )
                    .service(web::resource("/daily").route(web::get().to(attendance::daily_attendance)))
                    .service(
                        web::resource("/monthly").route(web::get().to(attendance::monthly_attendance)),
                    )
                    .service(web::resource("/sync").route(web::post().to(attendance::sync_offline)))
                    // /attendance/student/{id}
                    .service(
                        web::resource("/student/{id}")
                            .route(web::get().to(attendance::student_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}").route(web::patch().to(attendance::update_attendance)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/daily").route(web::get().to(report::daily_report)))
                    .service(web::resource("/monthly").route(web::get().to(report::monthly_report)))
                    .service(
                        web::resource("/statistics").route(web::get().to(report::report_statistics)),
                    )
                    .service(
                        web::resource("/student/{id}").route(web::get().to(report::student_report)),
                    ),
            )
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::post().to(student::create_student))
                            .route(web::get().to(student::list_students)),
                    )
                    // /students/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student::get_student))
                            .route(web::put().to(student::update_student))
                            .route(web::delete().to(student::delete_student)),
                    )
                    // /students/{id}/face
                    .service(web::resource("/{id}/face").route(web::post().to(student::register_face)))
                    .service(
                        web::resource("/{id}/face/verify").route(web::post().to(student::verify_face)),
                    ),
            )
            .service(
                web::scope("/classes")
                    .service(
                        web::resource("")
                            .route(web::post().to(class::create_class))
                            .route(web::get().to(class::list_classes)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(class::get_class))
                            .route(web::put().to(class::update_class))
                            .route(web::delete().to(class::delete_class)),
                    ),
            )
            .service(
                web::scope("/schools")
                    .service(
                        web::resource("")
                            .route(web::post().to(school::create_school))
                            .route(web::get().to(school::list_schools)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(school::get_school)))
                    .service(
                        web::resource("/{id}/dashboard").route(web::get().to(school::school_dashboard)),
                    ),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(user::create_user))
                            .route(web::get().to(user::list_users)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_large_limits_still_build() {
        let config = Config::from_lookup(|key: &str| match key {
            "SERVER_ADDR" => Some("127.0.0.1:8080".to_string()),
            "DATABASE_URL" => Some("mysql://root@localhost/attendance".to_string()),
            "JWT_SECRET" => Some("secret".to_string()),
            "RATE_LOGIN_PER_MIN" => Some("0".to_string()),
            "RATE_PROTECTED_PER_MIN" => Some("120000".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(Limiters::from_config(&config).is_ok());
    }
}
