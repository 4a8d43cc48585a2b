// Adapters layer: concrete implementations of the domain ports over HTTP.

pub mod identity;
pub mod square;

pub use identity::FirebaseIdentity;
pub use square::SquareClient;
