pub mod health;
pub mod diagnostics;
pub mod fallback;

pub use health::*;
pub use diagnostics::*;
pub use fallback::*;
