//! Field schema registry: which fields each service category requires,
//! which are optional, and what values they accept.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::model::{
    EventType, FocusArea, GroupSize, GuestCount, MusicStyle, PreferredSlot, ServiceCategory,
    SessionType, SkillLevel, WorkshopDuration, WorkshopTheme,
};
use crate::error::BookingError;

/// Maximum number of workshop time slots a visitor may pick.
pub const PREFERRED_SLOT_LIMIT: usize = 3;

/// Every field a booking draft knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    // Identity and acknowledgement fields, valid for every category.
    Name,
    Email,
    Phone,
    Message,
    ServiceCategory,
    TermsAccepted,
    PrivacyAccepted,
    // IndividualLesson
    SessionType,
    SkillLevel,
    FocusAreas,
    PreferredDate,
    PreferredTime,
    // PerformanceCoaching
    EventType,
    EventDate,
    GuestCount,
    MusicPreferences,
    // GroupWorkshop
    #[serde(alias = "theme")]
    WorkshopTheme,
    Duration,
    GroupSize,
    PreferredSlots,
}

impl FieldName {
    /// Fields that live in a category detail bag.
    pub const DETAIL_FIELDS: &'static [FieldName] = &[
        Self::SessionType,
        Self::SkillLevel,
        Self::FocusAreas,
        Self::PreferredDate,
        Self::PreferredTime,
        Self::EventType,
        Self::EventDate,
        Self::GuestCount,
        Self::MusicPreferences,
        Self::WorkshopTheme,
        Self::Duration,
        Self::GroupSize,
        Self::PreferredSlots,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Message => "message",
            Self::ServiceCategory => "serviceCategory",
            Self::TermsAccepted => "termsAccepted",
            Self::PrivacyAccepted => "privacyAccepted",
            Self::SessionType => "sessionType",
            Self::SkillLevel => "skillLevel",
            Self::FocusAreas => "focusAreas",
            Self::PreferredDate => "preferredDate",
            Self::PreferredTime => "preferredTime",
            Self::EventType => "eventType",
            Self::EventDate => "eventDate",
            Self::GuestCount => "guestCount",
            Self::MusicPreferences => "musicPreferences",
            Self::WorkshopTheme => "workshopTheme",
            Self::Duration => "duration",
            Self::GroupSize => "groupSize",
            Self::PreferredSlots => "preferredSlots",
        }
    }

    /// Whether this field belongs to a category detail bag.
    pub fn is_detail(&self) -> bool {
        Self::DETAIL_FIELDS.contains(self)
    }

    /// Whether updates to this field toggle set membership instead of overwriting.
    pub fn is_set_valued(&self) -> bool {
        matches!(
            self,
            Self::FocusAreas | Self::MusicPreferences | Self::PreferredSlots
        )
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldName {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "theme" {
            return Ok(Self::WorkshopTheme);
        }
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Unknown field: {}", s))
    }
}

/// Allowed value domain of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueConstraint {
    /// Free text.
    Text,
    /// Exactly one of the listed values.
    OneOf { values: &'static [&'static str] },
    /// A set of the listed values, optionally bounded in size.
    Tags {
        values: &'static [&'static str],
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    /// ISO calendar date (`YYYY-MM-DD`), today or later.
    FutureDate,
    /// Wall-clock time (`HH:MM`).
    Time,
}

/// Field layout for one service category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub category: ServiceCategory,
    pub required_fields: Vec<FieldName>,
    pub optional_fields: Vec<FieldName>,
    pub field_domains: BTreeMap<FieldName, ValueConstraint>,
}

impl Schema {
    /// Whether `field` is declared (required or optional) for this category.
    pub fn declares(&self, field: FieldName) -> bool {
        self.required_fields.contains(&field) || self.optional_fields.contains(&field)
    }

    pub fn constraint(&self, field: FieldName) -> Option<&ValueConstraint> {
        self.field_domains.get(&field)
    }

    /// Upper bound on a set-valued field, if one is declared.
    pub fn selection_limit(&self, field: FieldName) -> Option<usize> {
        match self.constraint(field)? {
            ValueConstraint::Tags { max, .. } => *max,
            _ => None,
        }
    }
}

static REGISTRY: LazyLock<[Schema; 3]> = LazyLock::new(|| {
    [
        Schema {
            category: ServiceCategory::IndividualLesson,
            required_fields: vec![FieldName::SessionType, FieldName::SkillLevel],
            optional_fields: vec![
                FieldName::FocusAreas,
                FieldName::PreferredDate,
                FieldName::PreferredTime,
            ],
            field_domains: BTreeMap::from([
                (FieldName::SessionType, one_of(SessionType::WIRE)),
                (FieldName::SkillLevel, one_of(SkillLevel::WIRE)),
                (FieldName::FocusAreas, tags(FocusArea::WIRE, None)),
                (FieldName::PreferredDate, ValueConstraint::FutureDate),
                (FieldName::PreferredTime, ValueConstraint::Time),
            ]),
        },
        Schema {
            category: ServiceCategory::PerformanceCoaching,
            required_fields: vec![FieldName::EventType, FieldName::EventDate],
            optional_fields: vec![FieldName::GuestCount, FieldName::MusicPreferences],
            field_domains: BTreeMap::from([
                (FieldName::EventType, one_of(EventType::WIRE)),
                (FieldName::EventDate, ValueConstraint::FutureDate),
                (FieldName::GuestCount, one_of(GuestCount::WIRE)),
                (FieldName::MusicPreferences, tags(MusicStyle::WIRE, None)),
            ]),
        },
        Schema {
            category: ServiceCategory::GroupWorkshop,
            required_fields: vec![FieldName::WorkshopTheme, FieldName::Duration],
            optional_fields: vec![FieldName::GroupSize, FieldName::PreferredSlots],
            field_domains: BTreeMap::from([
                (FieldName::WorkshopTheme, one_of(WorkshopTheme::WIRE)),
                (FieldName::Duration, one_of(WorkshopDuration::WIRE)),
                (FieldName::GroupSize, one_of(GroupSize::WIRE)),
                (
                    FieldName::PreferredSlots,
                    tags(PreferredSlot::WIRE, Some(PREFERRED_SLOT_LIMIT)),
                ),
            ]),
        },
    ]
});

fn one_of(values: &'static [&'static str]) -> ValueConstraint {
    ValueConstraint::OneOf { values }
}

fn tags(values: &'static [&'static str], max: Option<usize>) -> ValueConstraint {
    ValueConstraint::Tags { values, max }
}

/// Look up the schema for a category. An unset category has no schema.
pub fn lookup(category: Option<ServiceCategory>) -> Result<&'static Schema, BookingError> {
    let category = category.ok_or(BookingError::SchemaNotFound)?;
    REGISTRY
        .iter()
        .find(|s| s.category == category)
        .ok_or(BookingError::SchemaNotFound)
}

/// Look up a schema by its (possibly user-supplied) category name.
pub fn lookup_by_name(name: &str) -> Result<&'static Schema, BookingError> {
    lookup(name.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_required_fields() {
        for category in ServiceCategory::ALL {
            let schema = lookup(Some(*category)).unwrap();
            assert_eq!(schema.category, *category);
            assert!(!schema.required_fields.is_empty(), "{category} has no required fields");
        }
    }

    #[test]
    fn unset_category_is_schema_not_found() {
        assert!(matches!(lookup(None), Err(BookingError::SchemaNotFound)));
        assert!(matches!(
            lookup_by_name("Karaoke"),
            Err(BookingError::SchemaNotFound)
        ));
    }

    #[test]
    fn every_declared_field_has_a_domain() {
        for category in ServiceCategory::ALL {
            let schema = lookup(Some(*category)).unwrap();
            for field in schema.required_fields.iter().chain(&schema.optional_fields) {
                assert!(field.is_detail());
                assert!(
                    schema.constraint(*field).is_some(),
                    "{field} in {category} has no domain"
                );
            }
        }
    }

    #[test]
    fn schemas_do_not_share_detail_fields() {
        let lesson = lookup(Some(ServiceCategory::IndividualLesson)).unwrap();
        let coaching = lookup(Some(ServiceCategory::PerformanceCoaching)).unwrap();
        assert!(!lesson.declares(FieldName::EventType));
        assert!(!coaching.declares(FieldName::SessionType));
        assert!(coaching.declares(FieldName::EventDate));
    }

    #[test]
    fn workshop_slots_are_capped() {
        let schema = lookup(Some(ServiceCategory::GroupWorkshop)).unwrap();
        assert_eq!(
            schema.selection_limit(FieldName::PreferredSlots),
            Some(PREFERRED_SLOT_LIMIT)
        );
        assert_eq!(schema.selection_limit(FieldName::Duration), None);
    }

    #[test]
    fn field_name_parsing() {
        assert_eq!("sessionType".parse::<FieldName>().unwrap(), FieldName::SessionType);
        assert_eq!("theme".parse::<FieldName>().unwrap(), FieldName::WorkshopTheme);
        assert_eq!("workshopTheme".parse::<FieldName>().unwrap(), FieldName::WorkshopTheme);
        assert!("favouriteColour".parse::<FieldName>().is_err());
    }

    #[test]
    fn schema_serializes_domains() {
        let schema = lookup(Some(ServiceCategory::GroupWorkshop)).unwrap();
        let json = serde_json::to_value(schema).unwrap();
        assert_eq!(json["category"], "GroupWorkshop");
        assert_eq!(json["fieldDomains"]["preferredSlots"]["kind"], "tags");
        assert_eq!(json["fieldDomains"]["preferredSlots"]["max"], 3);
        assert_eq!(json["fieldDomains"]["groupSize"]["values"][3], "30+");
    }
}
