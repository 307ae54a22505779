use rocket::Route;

pub mod admin;
pub mod assistant;
pub mod auth;
pub mod public;
pub mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(assistant::routes());
    routes.extend(auth::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}
