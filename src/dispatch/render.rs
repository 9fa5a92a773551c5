//! Plain-text notification rendering for booking requests.

use crate::booking::model::Language;
use crate::booking::payload::BookingRequest;

struct Labels {
    subject: &'static str,
    name: &'static str,
    email: &'static str,
    phone: &'static str,
    service: &'static str,
    message: &'static str,
    legal: &'static str,
    calendar: &'static str,
    reference: &'static str,
}

const DE: Labels = Labels {
    subject: "Neue Buchungsanfrage",
    name: "Name",
    email: "E-Mail",
    phone: "Telefon",
    service: "Leistung",
    message: "Nachricht",
    legal: "AGB und Datenschutz akzeptiert",
    calendar: "Kalender",
    reference: "Referenz",
};

const EN: Labels = Labels {
    subject: "New booking request",
    name: "Name",
    email: "Email",
    phone: "Phone",
    service: "Service",
    message: "Message",
    legal: "Terms and privacy accepted",
    calendar: "Calendar",
    reference: "Reference",
};

fn labels(language: Language) -> &'static Labels {
    match language {
        Language::De => &DE,
        Language::En => &EN,
    }
}

/// Subject line, e.g. `Neue Buchungsanfrage: GroupWorkshop (Anna)`.
pub fn subject(request: &BookingRequest) -> String {
    format!(
        "{}: {} ({})",
        labels(request.language).subject,
        request.service_category(),
        request.name
    )
}

/// Body listing identity fields, the category's populated fields and the
/// acknowledgement flags.
pub fn body(request: &BookingRequest) -> String {
    let l = labels(request.language);
    let mut lines = vec![
        format!("{}: {}", l.name, request.name),
        format!("{}: {}", l.email, request.email),
        format!("{}: {}", l.phone, request.phone),
        format!("{}: {}", l.service, request.service_category()),
    ];

    if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&request.details) {
        for (key, value) in fields {
            if key == "serviceCategory" {
                continue;
            }
            lines.push(format!("{key}: {}", display_value(&value)));
        }
    }

    if let Some(ref message) = request.message {
        lines.push(String::new());
        lines.push(format!("{}:", l.message));
        lines.push(message.clone());
        lines.push(String::new());
    }

    let accepted = request.terms_accepted && request.privacy_accepted;
    lines.push(format!("{}: {}", l.legal, yes_no(request.language, accepted)));
    if let Some(ref link) = request.calendar_link {
        lines.push(format!("{}: {}", l.calendar, link));
    }
    lines.push(format!("{}: {}", l.reference, request.idempotency_key));

    lines.join("\n")
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn yes_no(language: Language, value: bool) -> &'static str {
    match (language, value) {
        (Language::De, true) => "ja",
        (Language::De, false) => "nein",
        (Language::En, true) => "yes",
        (Language::En, false) => "no",
    }
}
