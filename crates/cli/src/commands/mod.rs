pub mod detect;
pub mod inspect;
