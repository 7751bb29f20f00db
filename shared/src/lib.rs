pub mod bounded;
pub mod errors;
pub mod models;
pub mod outcome;
pub mod response;

pub use bounded::*;
pub use errors::*;
pub use models::*;
pub use outcome::*;
pub use response::*;
