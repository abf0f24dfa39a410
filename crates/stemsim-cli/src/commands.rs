pub mod interactive;
pub mod simulate;
