use crate::orders::StorageError;
use thiserror::Error;

/// 启动与运行期错误
///
/// 请求级错误走 [`crate::AppError`]，这里只覆盖服务器本身的生命周期。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 服务器生命周期的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
