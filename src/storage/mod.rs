//! Concrete implementations of the `contract` traits.

pub mod http;
pub mod local;
pub mod supabase;

pub use http::HttpFetcher;
pub use local::{DirectoryUploader, LocalStorage};
pub use supabase::SupabaseStorage;
