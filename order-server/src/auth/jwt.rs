//! JWT 令牌服务
//!
//! 处理 JWT 令牌的生成、验证和解析。令牌同时用于 API 访问、匿名司机的一次性
//! 访问凭证，以及通知消息中的访问链接。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use shared::models::{Actor, User, UserRole};
use thiserror::Error;

const DEV_FALLBACK_SECRET: &str = "order-server-development-secret-change-me!";

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// JWT 密钥 (应至少 32 字节)
    pub secret: String,
    /// 令牌过期时间 (分钟)
    pub expiration_minutes: i64,
    /// 令牌签发者
    pub issuer: String,
    /// 令牌受众
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        let secret = match load_jwt_secret() {
            Ok(secret) => secret,
            Err(e) => {
                tracing::warn!("JWT configuration error: {}, using development key", e);
                DEV_FALLBACK_SECRET.to_string()
            }
        };

        Self {
            secret,
            expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1440), // 默认 24 小时
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "order-server".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "order-clients".to_string()),
        }
    }
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID (Subject)
    pub sub: String,
    /// 角色名称
    pub role: String,
    /// 令牌类型 (access | link)
    pub token_type: String,
    /// 过期时间戳
    pub exp: i64,
    /// 签发时间戳
    pub iat: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,

    #[error("令牌生成失败: {0}")]
    GenerationFailed(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

/// 生成可打印的安全 JWT 密钥 (用于开发环境)
pub fn generate_secure_printable_jwt_secret() -> Result<String, JwtError> {
    const ALLOWED: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_=+.";

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 64];
    rng.fill(&mut bytes)
        .map_err(|_| JwtError::ConfigError("Failed to generate secure random key".to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| ALLOWED[(*b as usize) % ALLOWED.len()] as char)
        .collect())
}

/// 从环境变量安全地加载 JWT 密钥
fn load_jwt_secret() -> Result<String, JwtError> {
    match std::env::var("JWT_SECRET") {
        Ok(secret) => {
            if secret.len() < 32 {
                return Err(JwtError::ConfigError(
                    "JWT_SECRET must be at least 32 characters long".to_string(),
                ));
            }
            Ok(secret)
        }
        Err(_) => {
            tracing::warn!("⚠️  JWT_SECRET not set! Generating temporary key for this process.");
            generate_secure_printable_jwt_secret()
        }
    }
}

/// Issues access credentials for users.
///
/// The workflow uses it for anonymous-driver credentials and for access
/// links in notifications.
pub trait CredentialIssuer: Send + Sync {
    fn issue_access_token(&self, user: &User) -> Result<String, JwtError>;
}

/// JWT 令牌服务
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish()
    }
}

impl JwtService {
    /// 使用默认配置创建新的 JWT 服务
    pub fn new() -> Self {
        Self::with_config(JwtConfig::default())
    }

    /// 使用指定配置创建新的 JWT 服务
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 为用户生成新令牌
    pub fn generate_token(
        &self,
        user_id: i64,
        role: UserRole,
        token_type: &str,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            token_type: token_type.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

impl Default for JwtService {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialIssuer for JwtService {
    fn issue_access_token(&self, user: &User) -> Result<String, JwtError> {
        self.generate_token(user.id, user.role, "access")
    }
}

/// 当前用户上下文 (从 JWT Claims 解析)
///
/// 由提取器创建，注入到请求处理函数；进入订单核心前转换为 [`Actor`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    /// 用户 ID
    pub id: i64,
    /// 角色
    pub role: UserRole,
}

impl TryFrom<Claims> for CurrentUser {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| JwtError::InvalidToken(format!("non-numeric subject: {}", claims.sub)))?;
        let role = claims.role.parse::<UserRole>().map_err(JwtError::InvalidToken)?;
        Ok(Self { id, role })
    }
}

impl CurrentUser {
    /// 是否管理员
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}
