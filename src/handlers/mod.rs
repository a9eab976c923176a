pub mod health;
pub mod pdf;
pub mod highlights;
pub mod history;
pub mod realtime;
pub mod diagnostics;

pub use health::*;
pub use pdf::*;
pub use highlights::*;
pub use history::*;
pub use realtime::*;
pub use diagnostics::*;
