//! Parsing generated replies into card content
//!
//! A reply is accepted when its first balanced `{...}` span parses as a JSON
//! object and that object meets the card type's minimal shape contract.

use serde_json::{Map, Value};

use crate::models::CardType;
use crate::{Result, TripDeckError};

/// Parse a raw completion into card content for `card_type`
pub fn parse_card_reply(card_type: CardType, reply: &str) -> Result<Value> {
    let stripped = strip_code_fences(reply);
    let span = first_json_object(&stripped)
        .ok_or_else(|| TripDeckError::generation_parse("no JSON object in reply"))?;

    let value: Value = serde_json::from_str(span)
        .map_err(|e| TripDeckError::generation_parse(format!("invalid JSON: {e}")))?;

    check_shape(card_type, &value)?;
    Ok(value)
}

/// Remove markdown code-fence markers (an opening "```lang" token and any
/// closing "```"), keeping everything they enclose, even on the same line
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        // A language tag runs up to whitespace or the start of the JSON.
        let tag_len = after
            .find(|c: char| c.is_whitespace() || c == '{' || c == '[')
            .unwrap_or(after.len());
        rest = &after[tag_len..];
    }
    out.push_str(rest);
    out
}

/// First balanced `{...}` span, ignoring braces inside JSON strings
#[must_use]
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Minimal structure every card of `card_type` must have
pub fn check_shape(card_type: CardType, value: &Value) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| TripDeckError::generation_parse("reply is not a JSON object"))?;

    let ok = match card_type {
        CardType::Budget => {
            object.get("budget").is_some_and(Value::is_object)
                && object.get("currency").is_some_and(Value::is_string)
        }
        CardType::Itinerary => is_array(object, "days"),
        CardType::Attractions => is_array(object, "attractions"),
        CardType::Transport => is_array(object, "options"),
        CardType::Accommodation => is_array(object, "hotels"),
        CardType::Food => is_array(object, "dishes"),
        CardType::Tips => is_array(object, "tips"),
        CardType::Overview => object.get("summary").is_some_and(Value::is_string),
        CardType::Weather => object.get("climate").is_some_and(|v| !v.is_null()),
        CardType::Visa => object.get("visaRequired").is_some_and(Value::is_boolean),
    };

    if ok {
        Ok(())
    } else {
        Err(TripDeckError::generation_parse(format!(
            "{card_type} content is missing {}",
            required_fields(card_type).join(" + ")
        )))
    }
}

/// Fields named by the shape contract
#[must_use]
pub fn required_fields(card_type: CardType) -> &'static [&'static str] {
    match card_type {
        CardType::Budget => &["budget", "currency"],
        CardType::Itinerary => &["days"],
        CardType::Attractions => &["attractions"],
        CardType::Transport => &["options"],
        CardType::Accommodation => &["hotels"],
        CardType::Food => &["dishes"],
        CardType::Tips => &["tips"],
        CardType::Overview => &["summary"],
        CardType::Weather => &["climate"],
        CardType::Visa => &["visaRequired"],
    }
}

fn is_array(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).is_some_and(Value::is_array)
}
