pub mod user;
pub mod course;
pub mod enrollment;
pub mod payment;
pub mod verification;

pub use user::*;
pub use course::*;
pub use enrollment::*;
pub use payment::*;
pub use verification::*;
