//! Axum extractors for authentication context.
//!
//! The auth middleware validates the bearer token and stores [`AuthInfo`] in
//! request extensions; handlers take `AuthInfo` (or [`AdminAuth`]) as an
//! argument to require it.

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::AppError;
use crate::jwt::AuthInfo;

impl<S: Send + Sync> FromRequestParts<S> for AuthInfo {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthInfo>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))
    }
}

/// Authenticated caller with the administrator role.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AuthInfo);

impl<S: Send + Sync> FromRequestParts<S> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = <AuthInfo as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            return Err(AppError::PermissionDenied(
                "Admin access required".to_string(),
            ));
        }
        Ok(Self(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::UserRole;
    use uuid::Uuid;

    fn parts_with(auth: Option<AuthInfo>) -> Parts {
        let mut req = http::Request::builder().body(()).unwrap();
        if let Some(auth) = auth {
            req.extensions_mut().insert(auth);
        }
        req.into_parts().0
    }

    fn auth(role: UserRole) -> AuthInfo {
        AuthInfo {
            user_id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            name: "A".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn missing_auth_is_unauthenticated() {
        let mut parts = parts_with(None);
        let result = <AuthInfo as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn present_auth_is_extracted() {
        let expected = auth(UserRole::User);
        let mut parts = parts_with(Some(expected.clone()));
        let got = <AuthInfo as FromRequestParts<()>>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(got.user_id, expected.user_id);
    }

    #[tokio::test]
    async fn admin_extractor_checks_role() {
        let mut parts = parts_with(Some(auth(UserRole::User)));
        let result = AdminAuth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));

        let mut parts = parts_with(Some(auth(UserRole::Administrator)));
        assert!(AdminAuth::from_request_parts(&mut parts, &()).await.is_ok());
    }
}
