pub mod dispatch;
pub mod relay;
