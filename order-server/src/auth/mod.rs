//! 认证模块
//!
//! - [`JwtService`]: 令牌签发与验证
//! - [`CurrentUser`]: 请求提取器 (Bearer token)
//! - [`CredentialIssuer`]: 订单核心使用的凭证签发接口

pub mod extractor;
pub mod jwt;

pub use jwt::{Claims, CredentialIssuer, CurrentUser, JwtConfig, JwtError, JwtService};
