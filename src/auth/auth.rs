use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// School the caller may read and write; `None` only for global admins
    pub school_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.token_type != TokenType::Access {
            return None;
        }
        let role = Role::from_id(claims.role)?;
        Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            school_id: claims.school_id,
        })
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn require_teacher_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Teacher) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Teacher/Admin only".to_string()))
        }
    }

    /// True when a row owned by `school_id` is visible to the caller.
    pub fn can_access_school(&self, school_id: u64) -> bool {
        match self.school_id {
            Some(own) => own == school_id,
            None => self.role == Role::Admin,
        }
    }

    /// Admin without a school: sees and manages every school.
    pub fn is_global_admin(&self) -> bool {
        self.role == Role::Admin && self.school_id.is_none()
    }

    /// School that new rows are created under.
    pub fn owning_school(&self) -> Result<u64, AppError> {
        self.school_id
            .ok_or_else(|| AppError::Forbidden("Account is not linked to a school".to_string()))
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        match AuthUser::from_claims(claims) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("Invalid token"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: u8, school_id: Option<u64>, token_type: TokenType) -> Claims {
        Claims {
            user_id: 1,
            sub: "u".to_string(),
            role,
            exp: 0,
            jti: "j".to_string(),
            token_type,
            school_id,
        }
    }

    #[test]
    fn refresh_tokens_and_unknown_roles_do_not_authenticate() {
        assert!(AuthUser::from_claims(claims(2, Some(1), TokenType::Refresh)).is_none());
        assert!(AuthUser::from_claims(claims(7, Some(1), TokenType::Access)).is_none());
    }

    #[test]
    fn school_scoping() {
        let teacher = AuthUser::from_claims(claims(2, Some(1), TokenType::Access)).unwrap();
        assert!(teacher.can_access_school(1));
        assert!(!teacher.can_access_school(2));
        assert!(teacher.require_admin().is_err());
        assert!(teacher.require_teacher_or_admin().is_ok());

        let global_admin = AuthUser::from_claims(claims(1, None, TokenType::Access)).unwrap();
        assert!(global_admin.can_access_school(2));
        assert!(global_admin.owning_school().is_err());
        assert!(global_admin.is_global_admin());

        let school_admin = AuthUser::from_claims(claims(1, Some(1), TokenType::Access)).unwrap();
        assert!(!school_admin.is_global_admin());
        assert!(!school_admin.can_access_school(2));
    }
}
