pub mod crypto;
pub mod id;
