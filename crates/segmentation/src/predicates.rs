//! Attribute predicates — the closed set of named audience queries over
//! stored user and activity data.

use chrono::{DateTime, Duration, Utc};

use crate::filter::InvalidFilter;

/// Default look-back window for `inactive`.
pub const DEFAULT_INACTIVE_DAYS: u32 = 30;

/// Default look-back window for `new_signups`.
pub const DEFAULT_NEW_SIGNUP_DAYS: u32 = 7;

/// Upper bound accepted for any `days` window.
pub const MAX_WINDOW_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributePredicate {
    /// No transactions recorded within the window. Users who never
    /// transacted match.
    Inactive { days: u32 },
    CompletedOnboarding,
    IncompleteOnboarding,
    /// Account created within the window.
    NewSignups { days: u32 },
    NoAssets,
    HasLiabilities,
}

impl AttributePredicate {
    pub const NAMES: [&'static str; 6] = [
        "inactive",
        "completed_onboarding",
        "incomplete_onboarding",
        "new_signups",
        "no_assets",
        "has_liabilities",
    ];

    /// Build a predicate from its wire name and optional window.
    pub fn from_parts(name: &str, days: Option<u32>) -> Result<Self, InvalidFilter> {
        let predicate = match name {
            "inactive" => Self::Inactive {
                days: window(name, days, DEFAULT_INACTIVE_DAYS)?,
            },
            "new_signups" => Self::NewSignups {
                days: window(name, days, DEFAULT_NEW_SIGNUP_DAYS)?,
            },
            "completed_onboarding" => Self::CompletedOnboarding,
            "incomplete_onboarding" => Self::IncompleteOnboarding,
            "no_assets" => Self::NoAssets,
            "has_liabilities" => Self::HasLiabilities,
            other => {
                return Err(InvalidFilter::new(format!(
                    "unknown attribute `{other}`; expected one of: {}",
                    Self::NAMES.join(", ")
                )))
            }
        };

        if days.is_some() && predicate.days().is_none() {
            return Err(InvalidFilter::new(format!(
                "attribute `{name}` does not take a `days` window"
            )));
        }

        Ok(predicate)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive { .. } => "inactive",
            Self::CompletedOnboarding => "completed_onboarding",
            Self::IncompleteOnboarding => "incomplete_onboarding",
            Self::NewSignups { .. } => "new_signups",
            Self::NoAssets => "no_assets",
            Self::HasLiabilities => "has_liabilities",
        }
    }

    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Inactive { days } | Self::NewSignups { days } => Some(*days),
            _ => None,
        }
    }

    /// Start of the look-back window relative to `as_of`, for windowed predicates.
    pub fn window_start(&self, as_of: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days()
            .map(|days| as_of - Duration::days(i64::from(days)))
    }
}

fn window(name: &str, days: Option<u32>, default: u32) -> Result<u32, InvalidFilter> {
    match days {
        None => Ok(default),
        Some(d) if (1..=MAX_WINDOW_DAYS).contains(&d) => Ok(d),
        Some(d) => Err(InvalidFilter::new(format!(
            "attribute `{name}` window must be between 1 and {MAX_WINDOW_DAYS} days, got {d}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windowed_predicates_use_defaults() {
        assert_eq!(
            AttributePredicate::from_parts("inactive", None).unwrap(),
            AttributePredicate::Inactive { days: 30 }
        );
        assert_eq!(
            AttributePredicate::from_parts("new_signups", Some(14)).unwrap(),
            AttributePredicate::NewSignups { days: 14 }
        );
    }

    #[test]
    fn test_every_name_round_trips() {
        for name in AttributePredicate::NAMES {
            let predicate = AttributePredicate::from_parts(name, None).unwrap();
            assert_eq!(predicate.name(), name);
        }
    }

    #[test]
    fn test_rejects_unknown_and_bad_windows() {
        assert!(AttributePredicate::from_parts("rich_users", None).is_err());
        assert!(AttributePredicate::from_parts("inactive", Some(0)).is_err());
        assert!(AttributePredicate::from_parts("inactive", Some(MAX_WINDOW_DAYS + 1)).is_err());
        assert!(AttributePredicate::from_parts("no_assets", Some(5)).is_err());
    }

    #[test]
    fn test_window_start() {
        let as_of = Utc::now();
        let predicate = AttributePredicate::Inactive { days: 30 };
        assert_eq!(
            predicate.window_start(as_of),
            Some(as_of - Duration::days(30))
        );
        assert_eq!(AttributePredicate::NoAssets.window_start(as_of), None);
    }
}
