pub mod credential;
pub mod crypto;
pub mod paths;
pub mod settings;
