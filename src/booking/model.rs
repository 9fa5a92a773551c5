//! Booking data model: service categories, value domains, and the
//! per-category detail bags.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::schema::FieldName;

/// Declares a closed set of values with a fixed wire string per variant.
///
/// Parsing is lenient about case and `-`/`_`/space separators so that
/// `"one-to-one"`, `"one_to_one"` and `"OneToOne"` all resolve.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation of every variant.
            pub const WIRE: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize(v.as_str()) == wanted)
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

choice_enum! {
    /// Top-level offering chosen in the first step.
    ServiceCategory {
        IndividualLesson => "IndividualLesson",
        PerformanceCoaching => "PerformanceCoaching",
        GroupWorkshop => "GroupWorkshop",
    }
}

impl ServiceCategory {
    /// Resolve the `service` query parameter used by marketing links.
    ///
    /// Accepts the canonical names plus the short page slugs. Anything else
    /// yields `None` and the visitor has to pick manually.
    pub fn from_query(value: &str) -> Option<Self> {
        if let Ok(category) = value.parse() {
            return Some(category);
        }
        match normalize(value).as_str() {
            "lesson" | "lessons" | "singing" | "gesangsunterricht" => Some(Self::IndividualLesson),
            "coaching" | "performance" | "events" => Some(Self::PerformanceCoaching),
            "workshop" | "workshops" => Some(Self::GroupWorkshop),
            _ => None,
        }
    }
}

choice_enum! {
    SessionType {
        OneToOne => "OneToOne",
        Group => "Group",
        Online => "Online",
    }
}

choice_enum! {
    SkillLevel {
        Beginner => "Beginner",
        Intermediate => "Intermediate",
        Advanced => "Advanced",
    }
}

choice_enum! {
    /// Focus tags for individual lessons.
    FocusArea {
        Breathing => "Breathing",
        Technique => "Technique",
        Range => "Range",
        Repertoire => "Repertoire",
        StagePresence => "StagePresence",
        Interpretation => "Interpretation",
    }
}

choice_enum! {
    EventType {
        Wedding => "Wedding",
        Corporate => "Corporate",
        Private => "Private",
        Other => "Other",
    }
}

choice_enum! {
    /// Bucketed guest count for performance bookings.
    GuestCount {
        UpTo50 => "1-50",
        UpTo100 => "51-100",
        UpTo200 => "101-200",
        Over200 => "200+",
    }
}

choice_enum! {
    MusicStyle {
        Classical => "Classical",
        Jazz => "Jazz",
        Pop => "Pop",
        Musical => "Musical",
        Soul => "Soul",
        Gospel => "Gospel",
    }
}

choice_enum! {
    WorkshopTheme {
        Improvisation => "Improvisation",
        VocalHealth => "VocalHealth",
        Performance => "Performance",
    }
}

choice_enum! {
    WorkshopDuration {
        TwoHours => "TwoHours",
        FourHours => "FourHours",
        FullDay => "FullDay",
        MultiDay => "MultiDay",
    }
}

choice_enum! {
    /// Bucketed participant count for workshops.
    GroupSize {
        Small => "5-10",
        Medium => "11-20",
        Large => "21-30",
        ExtraLarge => "30+",
    }
}

choice_enum! {
    /// Weekday/weekend × time-of-day grid for workshop scheduling.
    PreferredSlot {
        WeekdayMorning => "WeekdayMorning",
        WeekdayAfternoon => "WeekdayAfternoon",
        WeekdayEvening => "WeekdayEvening",
        WeekendMorning => "WeekendMorning",
        WeekendAfternoon => "WeekendAfternoon",
        WeekendEvening => "WeekendEvening",
    }
}

choice_enum! {
    /// Legal documents the visitor must acknowledge before submitting.
    LegalDocument {
        Terms => "terms",
        Privacy => "privacy",
    }
}

choice_enum! {
    /// Content language of the session.
    Language {
        De => "de",
        En => "en",
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::De
    }
}

/// Details for an individual lesson request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LessonDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<SkillLevel>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub focus_areas: BTreeSet<FocusArea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<NaiveTime>,
}

/// Details for a performance coaching (event) request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoachingDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_count: Option<GuestCount>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub music_preferences: BTreeSet<MusicStyle>,
}

/// Details for a group workshop request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkshopDetails {
    #[serde(rename = "workshopTheme", skip_serializing_if = "Option::is_none")]
    pub theme: Option<WorkshopTheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<WorkshopDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<GroupSize>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub preferred_slots: BTreeSet<PreferredSlot>,
}

/// Category-specific detail bag. Exactly one variant is live per draft, so
/// fields of an abandoned category cannot linger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "serviceCategory")]
pub enum DetailBag {
    IndividualLesson(LessonDetails),
    PerformanceCoaching(CoachingDetails),
    GroupWorkshop(WorkshopDetails),
}

impl DetailBag {
    /// An empty bag for the given category.
    pub fn empty(category: ServiceCategory) -> Self {
        match category {
            ServiceCategory::IndividualLesson => Self::IndividualLesson(LessonDetails::default()),
            ServiceCategory::PerformanceCoaching => {
                Self::PerformanceCoaching(CoachingDetails::default())
            }
            ServiceCategory::GroupWorkshop => Self::GroupWorkshop(WorkshopDetails::default()),
        }
    }

    pub fn category(&self) -> ServiceCategory {
        match self {
            Self::IndividualLesson(_) => ServiceCategory::IndividualLesson,
            Self::PerformanceCoaching(_) => ServiceCategory::PerformanceCoaching,
            Self::GroupWorkshop(_) => ServiceCategory::GroupWorkshop,
        }
    }

    /// Whether `field` currently holds a value. Set-valued fields count as
    /// populated when non-empty.
    pub fn is_populated(&self, field: FieldName) -> bool {
        match (self, field) {
            (Self::IndividualLesson(d), FieldName::SessionType) => d.session_type.is_some(),
            (Self::IndividualLesson(d), FieldName::SkillLevel) => d.skill_level.is_some(),
            (Self::IndividualLesson(d), FieldName::FocusAreas) => !d.focus_areas.is_empty(),
            (Self::IndividualLesson(d), FieldName::PreferredDate) => d.preferred_date.is_some(),
            (Self::IndividualLesson(d), FieldName::PreferredTime) => d.preferred_time.is_some(),
            (Self::PerformanceCoaching(d), FieldName::EventType) => d.event_type.is_some(),
            (Self::PerformanceCoaching(d), FieldName::EventDate) => d.event_date.is_some(),
            (Self::PerformanceCoaching(d), FieldName::GuestCount) => d.guest_count.is_some(),
            (Self::PerformanceCoaching(d), FieldName::MusicPreferences) => {
                !d.music_preferences.is_empty()
            }
            (Self::GroupWorkshop(d), FieldName::WorkshopTheme) => d.theme.is_some(),
            (Self::GroupWorkshop(d), FieldName::Duration) => d.duration.is_some(),
            (Self::GroupWorkshop(d), FieldName::GroupSize) => d.group_size.is_some(),
            (Self::GroupWorkshop(d), FieldName::PreferredSlots) => !d.preferred_slots.is_empty(),
            _ => false,
        }
    }

    /// The calendar date stored under `field`, if it is a date field of this bag.
    pub fn date(&self, field: FieldName) -> Option<NaiveDate> {
        match (self, field) {
            (Self::IndividualLesson(d), FieldName::PreferredDate) => d.preferred_date,
            (Self::PerformanceCoaching(d), FieldName::EventDate) => d.event_date,
            _ => None,
        }
    }

    /// Names of every populated field, in schema order.
    pub fn populated_fields(&self) -> Vec<FieldName> {
        FieldName::DETAIL_FIELDS
            .iter()
            .copied()
            .filter(|f| self.is_populated(*f))
            .collect()
    }
}
