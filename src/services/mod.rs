pub mod admin_service;
pub mod cart_service;
pub mod catalog;
pub mod order_service;
pub mod payment_service;
