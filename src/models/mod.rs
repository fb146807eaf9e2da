pub mod availability;
pub mod booking;
pub mod game;
pub mod gift_card;
pub mod pricing;
pub mod promotion;
pub mod user;

pub use availability::{DaySchedule, SlotAvailability, SlotConfig, SlotStatus};
pub use booking::{
    Booking, BookingLine, BookingLineRequest, BookingResult, BookingStatus, CreateBookingRequest,
    CustomerContact, PaymentMethod,
};
pub use game::Game;
pub use gift_card::{GiftCard, GiftCardStatus};
pub use pricing::{LinePrice, PricePreview, PricingTier, TierTable};
pub use promotion::Promotion;
pub use user::{Actor, User};
