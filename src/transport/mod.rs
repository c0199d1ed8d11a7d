pub mod matrix;
pub mod runtime;
pub mod traits;

pub use matrix::MatrixChannel;
pub use traits::{Channel, DeliveryGateway, InboundEvent, InboundMessage};
