//! Canonical booking normalization.
//!
//! Booking-platform payloads are alias-heavy and loosely typed: ids may be
//! strings or numbers, attributes live at the top level or under nested
//! `booking` / `reservation` / `guest` objects, and half the keys have a
//! camelCase twin. This module applies one ordered precedence list per
//! attribute and returns a fixed-shape [`Booking`]; nothing downstream
//! probes raw JSON again.

use std::collections::BTreeMap;

use serde_json::Value;
use slk_schemas::Booking;

/// Read a string-or-number field, stringified and trimmed. Blank strings
/// count as absent.
fn field_string(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First present key, in precedence order, across one object.
fn first_of(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| field_string(obj, k))
}

/// First present key across several objects, outer-first.
fn first_of_each(objs: &[&Value], keys: &[&str]) -> Option<String> {
    objs.iter().find_map(|o| first_of(o, keys))
}

fn resolve_property_id(
    booking: &Value,
    data: &Value,
    name_to_id: &BTreeMap<String, String>,
) -> (Option<String>, Option<String>) {
    let by_id = first_of(booking, &["property_id", "propertyId"])
        .or_else(|| field_string(&booking["property"], "id"))
        .or_else(|| first_of(data, &["property_id", "propertyId"]));

    let name = first_of_each(&[booking, data], &["property_name", "propertyName"]);

    if by_id.is_some() {
        return (by_id, name);
    }

    let by_name = name
        .as_ref()
        .and_then(|n| name_to_id.get(&n.trim().to_lowercase()).cloned());
    (by_name, name)
}

fn resolve_guest_name(guest: &Value, booking: &Value) -> String {
    if let Some(name) = field_string(guest, "name") {
        return name;
    }

    let first = first_of(guest, &["first_name", "firstName"]);
    let last = first_of(guest, &["last_name", "lastName"]);
    let combined = [first, last]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !combined.trim().is_empty() {
        return combined.trim().to_string();
    }

    field_string(booking, "guest_name").unwrap_or_else(|| "Guest".to_string())
}

fn resolve_dates(booking: &Value, data: &Value) -> (Option<String>, Option<String>) {
    let arrival_keys = ["date_arrival", "arrival_date", "check_in", "checkin"];
    let departure_keys = ["date_departure", "departure_date", "check_out", "checkout"];

    let mut arrival = first_of(booking, &arrival_keys)
        .or_else(|| first_of(data, &["date_arrival", "arrival_date"]));
    let mut departure = first_of(booking, &departure_keys)
        .or_else(|| first_of(data, &["date_departure", "departure_date"]));

    if arrival.is_none() || departure.is_none() {
        let reservation = &data["reservation"];
        arrival = arrival.or_else(|| field_string(reservation, "date_arrival"));
        departure = departure.or_else(|| field_string(reservation, "date_departure"));
    }

    (arrival, departure)
}

/// Normalize one event payload into a [`Booking`].
///
/// `name_to_id` is the reverse property-name lookup table (lowercased
/// display name -> property id) used when no id field is present.
/// Normalization never fails: absent attributes come back empty / `None`
/// and the engine decides what is fatal.
pub fn normalize(data: &Value, name_to_id: &BTreeMap<String, String>) -> Booking {
    let booking = data
        .get("booking")
        .or_else(|| data.get("reservation"))
        .cloned()
        .unwrap_or(Value::Null);
    let guest = data
        .get("guest")
        .or_else(|| booking.get("guest"))
        .cloned()
        .unwrap_or(Value::Null);

    let (property_id, property_name) = resolve_property_id(&booking, data, name_to_id);

    let booking_id = field_string(&booking, "id")
        .or_else(|| field_string(data, "booking_id"))
        .or_else(|| field_string(data, "id"))
        .unwrap_or_default();

    let guest_phone = first_of(&guest, &["phone_number", "phone"])
        .or_else(|| first_of_each(&[&booking, data], &["guest_phone", "phone_number"]))
        .unwrap_or_default();

    let status = field_string(&booking, "status")
        .or_else(|| field_string(data, "status"))
        .unwrap_or_default()
        .to_lowercase();

    let action = first_of(data, &["action", "event"])
        .unwrap_or_default()
        .to_lowercase();

    let (arrival_raw, departure_raw) = resolve_dates(&booking, data);

    Booking {
        booking_id,
        property_id,
        property_name,
        guest_name: resolve_guest_name(&guest, &booking),
        guest_phone,
        arrival_raw,
        departure_raw,
        status,
        action,
    }
}
