//! Message formatting utilities for client display.

use studyhall_shared::time::{timestamp_to_clock_label, timestamp_to_rfc3339};

use crate::synchronizer::{DeliveryState, Entry, SyncEvent};

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a synchronizer update for the terminal
    pub fn format_event(event: &SyncEvent, me: Option<&str>) -> String {
        match event {
            SyncEvent::Connected {
                connection_id,
                resumed,
            } => Self::format_connected(connection_id, *resumed),
            SyncEvent::History { room, entries } => Self::format_history(room, entries),
            SyncEvent::Presence { room, users } => Self::format_presence(room, users, me),
            SyncEvent::Received { room, entry } => Self::format_chat_message(room, entry),
            SyncEvent::Confirmed { entry, .. } => Self::format_sent_confirmation(entry.timestamp),
            SyncEvent::Failed { reason, body } => Self::format_failed(reason, body.as_deref()),
            SyncEvent::UserJoined {
                room,
                connection_id,
                at,
            } => Self::format_user_joined(room, connection_id, *at),
            SyncEvent::UserLeft {
                room,
                connection_id,
                at,
            } => Self::format_user_left(room, connection_id, *at),
        }
    }

    pub fn format_connected(connection_id: &str, resumed: bool) -> String {
        if resumed {
            format!("\n* Session {} resumed\n", connection_id)
        } else {
            format!("\n* Connected as {}\n", connection_id)
        }
    }

    /// Format the replayed history of a room
    pub fn format_history(room: &str, entries: &[Entry]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str(&format!("#{} history:\n", room));

        if entries.is_empty() {
            output.push_str("(No messages yet)\n");
        } else {
            for entry in entries {
                output.push_str(&Self::format_entry(entry));
                output.push('\n');
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format the participant list of a room, marking the current connection
    pub fn format_presence(room: &str, users: &[String], me: Option<&str>) -> String {
        let mut output = format!("#{} participants:\n", room);
        for user in users {
            let me_suffix = if Some(user.as_str()) == me { " (me)" } else { "" };
            output.push_str(&format!("  {}{}\n", user, me_suffix));
        }
        output
    }

    /// One timeline line: `[HH:MM] sender: body`
    pub fn format_entry(entry: &Entry) -> String {
        let clock = timestamp_to_clock_label(entry.timestamp);
        match entry.state {
            DeliveryState::Pending { .. } => {
                format!("[{}] {}: {} (sending...)", clock, entry.sender, entry.body)
            }
            DeliveryState::Confirmed => format!("[{}] {}: {}", clock, entry.sender, entry.body),
            DeliveryState::System => format!("[{}] * {}", clock, entry.body),
        }
    }

    /// Format a chat message from another member
    pub fn format_chat_message(room: &str, entry: &Entry) -> String {
        format!(
            "\n\n------------------------------------------------------------\n\
             #{} @{}: {}\n\
             sent at {}\n\
             ------------------------------------------------------------\n",
            room,
            entry.sender,
            entry.body,
            timestamp_to_rfc3339(entry.timestamp)
        )
    }

    /// Format a confirmation after the server accepted our message
    pub fn format_sent_confirmation(sent_at: i64) -> String {
        format!("sent at {}\n", timestamp_to_rfc3339(sent_at))
    }

    pub fn format_failed(reason: &str, body: Option<&str>) -> String {
        match body {
            Some(body) => format!("\n! Not sent: \"{}\" ({})\n", body, reason),
            None => format!("\n! {}\n", reason),
        }
    }

    pub fn format_user_joined(room: &str, connection_id: &str, at: i64) -> String {
        format!(
            "\n+ {} joined #{} at {}\n",
            connection_id,
            room,
            timestamp_to_rfc3339(at)
        )
    }

    pub fn format_user_left(room: &str, connection_id: &str, at: i64) -> String {
        format!(
            "\n- {} left #{} at {}\n",
            connection_id,
            room,
            timestamp_to_rfc3339(at)
        )
    }

    /// Format a frame the client could not interpret
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }

    pub fn format_help() -> String {
        [
            "Commands:",
            "  /join <room>    join a room and send there",
            "  /leave [room]   leave a room (default: current)",
            "  /room <room>    switch the current room",
            "  /rooms          list joined rooms",
            "  /name <name>    change your display name",
            "  /quit           exit",
            "",
        ]
        .join("\n")
    }
}
