mod credentials;

pub use credentials::EnvCredentialProvider;
