//! # Bookings Testing
//!
//! In-memory implementations of the `bookings-core` seams plus a fixed clock
//! and fixture builders. Pipeline and resolver tests run entirely against
//! these; nothing here touches a database or the network.

/// Fixture builders with sensible defaults.
pub mod fixtures;

/// In-memory repository implementations.
pub mod memory;

pub use memory::{
    CaptureSink, FixedClock, FixedHolidays, InMemoryCatalog, InMemoryClosures,
    InMemoryReservations, InMemorySchedules, InMemorySubscriptions,
};
