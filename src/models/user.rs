use serde::{Deserialize, Serialize};

use super::Booking;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

/// Whoever is calling a booking operation, as resolved by the caller context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub is_admin: bool,
}

impl Actor {
    pub fn admin() -> Self {
        Self {
            user_id: None,
            is_admin: true,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            is_admin: false,
        }
    }

    /// Admins manage every booking; users manage the bookings they own.
    pub fn may_manage(&self, booking: &Booking) -> bool {
        if self.is_admin {
            return true;
        }
        match (&self.user_id, &booking.user_id) {
            (Some(actor), Some(owner)) => actor == owner,
            _ => false,
        }
    }
}
