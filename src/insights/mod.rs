pub mod costs;
pub mod recommend;
