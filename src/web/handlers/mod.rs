pub mod account;
pub mod admin;
pub mod booking;

pub async fn health() -> &'static str {
    "ok"
}
