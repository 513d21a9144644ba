//! Event column headers.
//!
//! A header is either a plain event name (`Approve`) or a name followed by
//! the roles allowed to trigger it (`Approve[manager, auditor]`).

use crate::error::LoaderError;
use gridfsm_core::Event;

/// Parses one event header cell.
pub fn parse_event_header(text: &str) -> Result<Event, LoaderError> {
    let text = text.trim();
    let malformed = |reason: &str| LoaderError::MalformedEvent {
        event: text.to_string(),
        reason: reason.to_string(),
    };

    let open = text.find('[');
    let close = text.find(']');

    let (open, close) = match (open, close) {
        (None, None) => {
            if text.is_empty() {
                return Err(malformed("event name is empty"));
            }
            return Ok(Event::new(text));
        }
        (None, Some(_)) => {
            return Err(LoaderError::EventMissingOpeningBrace {
                event: text.to_string(),
            })
        }
        (Some(_), None) => {
            return Err(LoaderError::EventMissingClosingBrace {
                event: text.to_string(),
            })
        }
        (Some(open), Some(close)) if close < open => {
            return Err(LoaderError::EventMissingOpeningBrace {
                event: text.to_string(),
            })
        }
        (Some(open), Some(close)) => (open, close),
    };

    if close != text.len() - 1 {
        return Err(malformed("unexpected text after the role list"));
    }

    let name = text[..open].trim();
    if name.is_empty() {
        return Err(malformed("event name is empty"));
    }

    let inner = &text[open + 1..close];
    if inner.contains('[') {
        return Err(malformed("role lists cannot be nested"));
    }
    if inner.trim().is_empty() {
        return Err(LoaderError::EmptyRoleList {
            event: text.to_string(),
        });
    }

    let roles: Vec<&str> = inner.split(',').map(str::trim).collect();
    if roles.iter().any(|r| r.is_empty()) {
        return Err(malformed("role names cannot be empty"));
    }

    Ok(Event::authorised(name, roles))
}

/// The event name of a header, ignoring any role list.
pub fn event_name(text: &str) -> &str {
    let text = text.trim();
    match text.find('[') {
        Some(index) => text[..index].trim(),
        None => text,
    }
}
