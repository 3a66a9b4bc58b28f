mod engine;
mod errors;
mod handlers;
mod models;
mod utils;

use actix_web::{web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use dotenv::dotenv;
use sqlx::PgPool;
use std::env;
use log::info;
use env_logger::Env;
use actix_web::middleware::Logger;
use actix_web_httpauth::middleware::HttpAuthentication;
use std::collections::HashMap;

use crate::engine::config::EngineConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Validate JWT secret
    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    if jwt_secret.is_empty() {
        panic!("JWT_SECRET cannot be empty");
    }

    // Gamification tunables, shared with every handler
    let engine_config = EngineConfig::from_env();
    info!("Engine config: {:?}", engine_config);

    // Initialize the database pool
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url).await.expect("Failed to connect to the database");

    // Fetch the server bind address from an environment variable, default to "127.0.0.1:8080"
    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("Starting server at {}", bind_address);

    // Authentication middleware
    let auth = HttpAuthentication::bearer(crate::utils::jwt::validator);

    // Set up Prometheus metrics
    let mut labels = HashMap::new();
    labels.insert("app".to_string(), "stryde".to_string());
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .const_labels(labels)
        .build()
        .expect("Failed to create Prometheus metrics");

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default()) // Logging middleware
            .wrap(prometheus.clone()) // Prometheus metrics middleware
            .app_data(web::Data::new(pool.clone())) // Database pool
            .app_data(web::Data::new(engine_config.clone())) // Gamification tunables
            .service(
                web::resource("/v1/login")
                    .route(web::post().to(handlers::auth::login)),
            )
            .service(
                web::resource("/v1/register")
                    .route(web::post().to(handlers::auth::register)),
            )
            .service(
                web::resource("/v1/username/check")
                    .route(web::get().to(handlers::profile::check_username_availability)),
            )
            .service(
                web::resource("/v1/user")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::profile::get_settings))
                    .route(web::patch().to(handlers::profile::update_settings)),
            )
            .service(
                web::resource("/v1/catalog")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::catalog::list_activities)),
            )
            .service(
                web::resource("/v1/goals")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::goals::get_goals))
                    .route(web::post().to(handlers::goals::create_goal)),
            )
            .service(
                web::resource("/v1/goals/{goalId}")
                    .wrap(auth.clone())
                    .route(web::patch().to(handlers::goals::update_goal))
                    .route(web::delete().to(handlers::goals::delete_goal)),
            )
            .service(
                web::resource("/v1/goals/{goalId}/toggle")
                    .wrap(auth.clone())
                    .route(web::post().to(handlers::goals::toggle_goal_active)),
            )
            .service(
                web::resource("/v1/activity")
                    .wrap(auth.clone())
                    .route(web::post().to(handlers::activity::log_activity)),
            )
            .service(
                web::resource("/v1/activity/{activityId}/bump")
                    .wrap(auth.clone())
                    .route(web::post().to(handlers::feed::add_bump))
                    .route(web::delete().to(handlers::feed::remove_bump)),
            )
            .service(
                web::resource("/v1/status")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::activity::get_user_status_header)),
            )
            .service(
                web::resource("/v1/feed")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::feed::get_home_feed)),
            )
            .service(
                web::resource("/v1/follows/requests")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::social::get_pending_follow_requests)),
            )
            .service(
                web::resource("/v1/follows/{targetId}")
                    .wrap(auth.clone())
                    .route(web::post().to(handlers::social::request_follow))
                    .route(web::delete().to(handlers::social::unfollow)),
            )
            .service(
                web::resource("/v1/follows/requests/{requestorId}")
                    .wrap(auth.clone())
                    .route(web::post().to(handlers::social::manage_follow_request)),
            )
            .service(
                web::resource("/v1/profiles/{username}")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::profile::get_profile_by_username)),
            )
            .service(
                web::resource("/v1/profiles/{profileId}/followers")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::social::get_followers)),
            )
            .service(
                web::resource("/v1/profiles/{profileId}/following")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::social::get_following)),
            )
            .service(
                web::resource("/v1/users/search")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::profile::search_users)),
            )
            .service(
                web::resource("/v1/users/latest")
                    .wrap(auth.clone())
                    .route(web::get().to(handlers::profile::get_latest_users)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
