pub mod appsettings;
pub mod book;
pub mod clock;
pub mod commands;
pub mod delivery;
pub mod listing;
pub mod reminder;
pub mod renewal;
pub mod scheduling;
pub mod storage;
pub mod telegram;
pub mod time;

#[cfg(test)]
mod testing;
