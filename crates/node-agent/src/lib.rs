pub mod api;
pub mod connectivity;
