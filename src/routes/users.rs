use crate::{
    AppState,
    guards::{Guard, PROTECT, restrict_to, with_guards},
    handlers::{session, users},
    models::Role,
};
use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{MethodFilter, MethodRouter, on},
};

const ADMIN_ONLY: Guard = restrict_to(&[Role::Admin]);
const SUPERADMIN_ONLY: Guard = restrict_to(&[Role::Superadmin]);

/// RouteEntry
///
/// One row of the user route table: where it lives, which guards run (in order) and the
/// handler they protect. The handler is only reachable through `method`.
pub struct RouteEntry {
    pub method: Method,
    pub path: &'static str,
    pub guards: &'static [Guard],
    pub handler: MethodRouter<AppState>,
}

impl RouteEntry {
    fn new<H, T>(method: Method, path: &'static str, guards: &'static [Guard], handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let handler = match MethodFilter::try_from(method.clone()) {
            Ok(filter) => on(filter, handler),
            // Nothing is routed, so every request gets 405.
            Err(_) => MethodRouter::new(),
        };
        Self {
            method,
            path,
            guards,
            handler,
        }
    }

    pub fn is_public(&self) -> bool {
        self.guards.is_empty()
    }
}

/// route_table
///
/// The user resource, mounted under `/api/users` by `create_router`.
///
/// | Method | Path        | Guards                          | Handler          |
/// |--------|-------------|---------------------------------|------------------|
/// | GET    | `/`         | protect                         | find_all_users   |
/// | POST   | `/signup`   | none                            | create_user      |
/// | PUT    | `/profile/` | protect                         | update_profile   |
/// | DELETE | `/profile/` | protect                         | delete_profile   |
/// | GET    | `/{id}`     | protect                         | find_user_by_pk  |
/// | PUT    | `/{id}`     | protect, restrictTo(admin)      | update_user      |
/// | DELETE | `/{id}`     | protect, restrictTo(superadmin) | delete_user      |
/// | POST   | `/login`    | none                            | login            |
/// | POST   | `/logout`   | none                            | logout           |
pub fn route_table() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new(Method::GET, "/", &[PROTECT], users::find_all_users),
        RouteEntry::new(Method::POST, "/signup", &[], users::create_user),
        RouteEntry::new(Method::PUT, "/profile/", &[PROTECT], users::update_profile),
        RouteEntry::new(Method::DELETE, "/profile/", &[PROTECT], users::delete_profile),
        RouteEntry::new(Method::GET, "/{id}", &[PROTECT], users::find_user_by_pk),
        RouteEntry::new(Method::PUT, "/{id}", &[PROTECT, ADMIN_ONLY], users::update_user),
        RouteEntry::new(
            Method::DELETE,
            "/{id}",
            &[PROTECT, SUPERADMIN_ONLY],
            users::delete_user,
        ),
        RouteEntry::new(Method::POST, "/login", &[], session::login),
        RouteEntry::new(Method::POST, "/logout", &[], session::logout),
    ]
}

/// user_routes
///
/// Builds the router from `route_table`. Entries sharing a path are merged into one
/// method router, each method keeping its own guard chain. Paths declared with a trailing
/// slash are also served without it.
pub fn user_routes(state: &AppState) -> Router<AppState> {
    route_table()
        .into_iter()
        .fold(Router::new(), |router, entry| {
            let guarded = with_guards(entry.handler, state, entry.guards);
            match entry.path.strip_suffix('/').filter(|bare| !bare.is_empty()) {
                Some(bare) => router
                    .route(bare, guarded.clone())
                    .route(entry.path, guarded),
                None => router.route(entry.path, guarded),
            }
        })
}
