pub mod config;
pub mod interval;
pub mod run;
pub mod session;
pub mod timer;

use ticks_core::format::format_short;
use ticks_core::{Confirmation, Session};

/// First eight characters of an id, enough to resolve it again.
pub fn short_id(session: &Session) -> String {
    session.id.to_string().chars().take(8).collect()
}

/// One line per interval, numbered from 1 in run order.
pub fn print_intervals(session: &Session) {
    for interval in session.sorted_intervals() {
        let gate = match interval.confirmation {
            Confirmation::Manual => "  [manual]",
            Confirmation::Automatic => "",
        };
        println!(
            "  {:>2}. {:<24} {:>8}{gate}",
            interval.order_index + 1,
            interval.label,
            format_short(interval.duration_secs),
        );
    }
}
