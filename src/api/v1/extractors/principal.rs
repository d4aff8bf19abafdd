use std::{convert::Infallible, sync::Arc};

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};

use crate::services::auth::principal::{Principal, shared_principal_from};

/// Principal attached by the middleware in front of this route.
/// Missing means the route is not protected (a wiring mistake), so 401.
pub struct Authenticated<P>(pub Arc<P>);

impl<S, P> FromRequestParts<S> for Authenticated<P>
where
    S: Send + Sync,
    P: Principal,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        shared_principal_from::<P>(&parts.extensions)
            .map(Authenticated)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// For routes that serve anonymous callers too.
pub struct MaybeAuthenticated<P>(pub Option<Arc<P>>);

impl<S, P> FromRequestParts<S> for MaybeAuthenticated<P>
where
    S: Send + Sync,
    P: Principal,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(shared_principal_from::<P>(&parts.extensions)))
    }
}
