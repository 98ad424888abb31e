pub mod common;
pub mod notification;
pub mod plan;
pub mod settings;
pub mod tenant;
