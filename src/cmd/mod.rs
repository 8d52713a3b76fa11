pub mod check;
pub mod decisions;
pub mod plan;
pub mod run;
pub mod schedule;
