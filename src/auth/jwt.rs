use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

/// Who a token is issued to.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: u64,
    pub email: &'a str,
    pub role: Role,
}

fn now() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

fn generate_token(
    subject: &TokenSubject<'_>,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.email.to_string(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    subject: &TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    generate_token(subject, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    subject: &TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    generate_token(subject, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: 5,
            email: "budi@company.com",
            role: Role::Admin,
        }
    }

    #[test]
    fn access_token_verifies_with_same_secret() {
        let token = generate_access_token(&subject(), "s3cret", 60).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 5);
        assert_eq!(claims.sub, "budi@company.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&subject(), "s3cret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn refresh_tokens_get_distinct_ids() {
        let (_, a) = generate_refresh_token(&subject(), "s3cret", 60).unwrap();
        let (_, b) = generate_refresh_token(&subject(), "s3cret", 60).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = verify_token(
            &generate_access_token(&subject(), "s3cret", 60).unwrap(),
            "s3cret",
        )
        .unwrap();
        // Past the default 60s leeway.
        claims.exp = now() - 3600;
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(verify_token(&token, "s3cret").is_err());
    }
}
