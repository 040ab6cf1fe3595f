pub mod category;
pub mod diff;
pub mod flow;
pub mod span;
