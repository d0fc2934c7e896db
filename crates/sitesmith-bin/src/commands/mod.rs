pub mod address;
pub mod ask;
pub mod publish;
