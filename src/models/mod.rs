pub mod health;
pub mod pdf;
pub mod highlight;
pub mod history;
pub mod diagnostics;
pub mod messages;
pub mod error;

pub use health::*;
pub use pdf::*;
pub use highlight::*;
pub use history::*;
pub use diagnostics::*;
pub use messages::*;
pub use error::*;
