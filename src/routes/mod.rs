pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

/// Registers every API route. Paths live at the root (no version prefix);
/// which of them require a session is decided by `AuthMiddleware`, not
/// here.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(users::register)
        .service(users::login)
        .service(users::logout)
        .service(users::logout_all)
        .service(users::list_users)
        .service(users::me)
        .service(users::update_me)
        .service(users::delete_me)
        .service(users::upload_avatar)
        .service(users::delete_avatar)
        .service(users::get_avatar)
        .service(tasks::create_task)
        .service(tasks::list_tasks)
        .service(tasks::list_tasks_alt)
        .service(tasks::get_task)
        .service(tasks::update_task)
        .service(tasks::delete_task);
}
