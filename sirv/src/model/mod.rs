pub mod sirv;
pub mod trajectory;
