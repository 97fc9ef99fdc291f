pub mod auth;
pub mod cos;
mod endpoint;
mod error;
pub mod local;
mod memory;
pub mod onedrive;
pub mod oss;
pub mod qiniu;
mod registry;
pub mod s3;
mod strategy;
pub mod validation;

#[cfg(feature = "s3")]
mod s3_provider;

#[cfg(test)]
mod test_server;

pub use auth::{HttpTokenExchanger, OAuthEndpoints, OneDriveAuthHandler, TokenExchanger, TokenResponse};
pub use cos::CosStrategy;
pub use endpoint::S3Target;
pub use error::StrategyError;
pub use local::{LocalProvider, LocalStrategy};
pub use memory::MemoryProvider;
pub use onedrive::{OneDriveProvider, OneDriveStrategy};
pub use oss::OssStrategy;
pub use qiniu::QiniuStrategy;
pub use registry::{default_providers, StrategyRegistry, StrategyRegistryBuilder};
pub use s3::S3Strategy;
pub use strategy::{AuthHandler, PolicyTypeStrategy};

#[cfg(feature = "s3")]
pub use s3_provider::S3CompatibleProvider;
