// Route exports
pub mod matching;

use actix_web::web;

pub use matching::{ApiError, AppState};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(matching::root)).service(
        web::scope("/api/v1")
            .configure(matching::configure),
    );
}
