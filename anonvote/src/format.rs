use crate::*;
use chrono::{Local, TimeZone};
use ethers::types::Address;

/// Human-readable time left until `end_time`, or "ended"
pub fn time_remaining(end_time: u64, now: u64) -> String {
    let remaining = end_time as i64 - now as i64;
    if remaining <= 0 {
        return "ended".into();
    }

    let days = remaining / 86400;
    let hours = (remaining % 86400) / 3600;
    let minutes = (remaining % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Unix timestamp in local time
pub fn format_timestamp(timestamp: u64) -> String {
    match Local.timestamp_opt(timestamp as i64, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// "you" for the current account, a shortened address otherwise
pub fn creator_label(creator: Address, account: Address) -> String {
    if creator == account {
        "you".into()
    } else {
        short_address(creator)
    }
}

/// Current Unix time, seconds
pub fn unix_now() -> u64 {
    let now = chrono::Utc::now().timestamp();
    if now < 0 {
        0
    } else {
        now as u64
    }
}
