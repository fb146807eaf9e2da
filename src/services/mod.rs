pub mod availability;
pub mod booking;
pub mod clock;
pub mod gift_card;
pub mod locks;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod promotion;
