use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;

use crate::{AppState, auth::AuthUser, error::AppError, models::Role};

/// Guard
///
/// A check that runs in front of a handler and either lets the request continue or ends it
/// with an error response. Each route declares its guards as an ordered slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Resolves the caller's identity from the session token and attaches it to the request.
    /// Rejects with 401.
    Protect,
    /// Requires the identity attached by `Protect` to hold one of the listed roles.
    /// Rejects with 403, or 401 when no identity was attached.
    RestrictTo(&'static [Role]),
}

pub const PROTECT: Guard = Guard::Protect;

pub const fn restrict_to(roles: &'static [Role]) -> Guard {
    Guard::RestrictTo(roles)
}

impl Guard {
    /// Runs this guard against the request head.
    pub async fn check(&self, parts: &mut Parts, state: &AppState) -> Result<(), AppError> {
        match self {
            Guard::Protect => {
                let user = AuthUser::from_request_parts(parts, state).await?;
                tracing::debug!(user_id = user.id, role = %user.role, "request authenticated");
                parts.extensions.insert(user);
            }
            Guard::RestrictTo(allowed) => {
                let user = parts.extensions.get::<AuthUser>().ok_or_else(|| {
                    AppError::unauthenticated("You are not logged in. Please log in to get access.")
                })?;
                if !allowed.contains(&user.role) {
                    tracing::warn!(
                        user_id = user.id,
                        role = %user.role,
                        ?allowed,
                        "role not allowed on this route"
                    );
                    return Err(AppError::forbidden(
                        "You do not have permission to perform this action",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// GuardChain
///
/// The guards of one route plus the state they need, handed to the chain middleware.
#[derive(Clone)]
pub struct GuardChain {
    state: AppState,
    guards: Arc<[Guard]>,
}

impl GuardChain {
    pub fn new(state: AppState, guards: &[Guard]) -> Self {
        Self {
            state,
            guards: guards.into(),
        }
    }

    /// Runs every guard in declaration order, stopping at the first rejection.
    pub async fn run(&self, parts: &mut Parts) -> Result<(), AppError> {
        for guard in self.guards.iter() {
            guard.check(parts, &self.state).await?;
        }
        Ok(())
    }
}

/// run_guards
///
/// Middleware body shared by every guarded route. The handler (`next`) is only reached
/// once the whole chain has passed.
async fn run_guards(
    State(chain): State<GuardChain>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    chain.run(&mut parts).await?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// with_guards
///
/// Wraps the handlers of `route` in the chain of `guards`. `route_layer` keeps the chain
/// scoped to the methods of this `MethodRouter`, so methods sharing a path can carry
/// different guards.
pub fn with_guards(
    route: MethodRouter<AppState>,
    state: &AppState,
    guards: &[Guard],
) -> MethodRouter<AppState> {
    if guards.is_empty() {
        return route;
    }
    route.route_layer(middleware::from_fn_with_state(
        GuardChain::new(state.clone(), guards),
        run_guards,
    ))
}
