use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use taskpad::auth::AuthMiddleware;
use taskpad::config::Config;
use taskpad::email::Mailer;
use taskpad::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let mailer = Mailer::from_env();
    if !mailer.is_enabled() {
        log::info!("SMTP relay not configured; account emails disabled");
    }

    let bind_addr = (config.server_host.clone(), config.server_port);
    log::info!("Starting taskpad server at {}", config.server_url());

    let pool_data = web::Data::new(pool);
    let mailer_data = web::Data::new(mailer);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(mailer_data.clone())
            .app_data(config_data.clone())
            // Wraps run last-registered first: Logger sees the request,
            // then CORS (so preflights never hit the auth guard), then
            // AuthMiddleware in front of the routes.
            .wrap(AuthMiddleware)
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
