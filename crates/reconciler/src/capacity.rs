//! Capacity policy: fixed throughput vs autoscale.
//!
//! A database is either provisioned with a fixed throughput, configured for
//! autoscale, or has no dedicated capacity at all. The two provisioned modes
//! are mutually exclusive everywhere: in desired configuration, in the
//! payloads sent to the remote, and in persisted state.

use serde::{Deserialize, Serialize};

use crate::client::{CreateUpdateOptions, ThroughputSettings, ThroughputUpdate};
use crate::error::{Error, Result};

/// Autoscale block of the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutoscaleSettings {
    pub max_throughput: Option<i64>,
}

impl AutoscaleSettings {
    /// Autoscale settings with the given ceiling.
    #[must_use]
    pub const fn with_max_throughput(max_throughput: i64) -> Self {
        Self {
            max_throughput: Some(max_throughput),
        }
    }
}

/// Desired (or observed) capacity of a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Capacity {
    /// Manually provisioned request units per second.
    Fixed(i64),
    Autoscale(AutoscaleSettings),
    /// No dedicated capacity requested or present.
    #[default]
    Unset,
}

/// Which of the two provisioned modes a capacity is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    Manual,
    Autoscale,
}

impl std::fmt::Display for CapacityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Autoscale => write!(f, "autoscale"),
        }
    }
}

impl std::str::FromStr for CapacityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "autoscale" => Ok(Self::Autoscale),
            other => Err(format!("unknown capacity mode '{other}'")),
        }
    }
}

impl Capacity {
    /// Build a capacity from the two raw configuration fields.
    ///
    /// A zero throughput counts as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConflictingCapacityMode`] when both are supplied.
    pub fn from_fields(
        database: &str,
        account: &str,
        throughput: Option<i64>,
        autoscale_settings: Option<AutoscaleSettings>,
    ) -> Result<Self> {
        match (throughput.filter(|t| *t != 0), autoscale_settings) {
            (Some(_), Some(_)) => Err(Error::conflicting_capacity_mode(
                database,
                account,
                "`throughput` and `autoscale_settings` cannot both be set",
            )),
            (Some(t), None) => Ok(Self::Fixed(t)),
            (None, Some(settings)) => Ok(Self::Autoscale(settings)),
            (None, None) => Ok(Self::Unset),
        }
    }

    /// Whether a manual throughput is set.
    #[must_use]
    pub const fn has_fixed_throughput(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    #[must_use]
    pub const fn has_autoscale(&self) -> bool {
        matches!(self, Self::Autoscale(_))
    }

    /// Autoscale without a ceiling: keep whatever the remote already has.
    #[must_use]
    pub const fn is_autoscale_without_max(&self) -> bool {
        matches!(
            self,
            Self::Autoscale(AutoscaleSettings {
                max_throughput: None
            })
        )
    }

    /// The provisioned mode, if any.
    #[must_use]
    pub const fn mode(&self) -> Option<CapacityMode> {
        match self {
            Self::Fixed(_) => Some(CapacityMode::Manual),
            Self::Autoscale(_) => Some(CapacityMode::Autoscale),
            Self::Unset => None,
        }
    }

    /// Throughput field as persisted.
    #[must_use]
    pub const fn throughput(&self) -> Option<i64> {
        match self {
            Self::Fixed(t) => Some(*t),
            _ => None,
        }
    }

    /// Autoscale field as persisted.
    #[must_use]
    pub fn autoscale_settings(&self) -> Option<AutoscaleSettings> {
        match self {
            Self::Autoscale(settings) => Some(settings.clone()),
            _ => None,
        }
    }

    /// Options for the create/update request.
    ///
    /// Zero throughput is never sent; the remote treats it as an invalid
    /// instruction rather than "no throughput".
    #[must_use]
    pub fn to_create_options(&self) -> CreateUpdateOptions {
        match self {
            Self::Fixed(t) if *t != 0 => CreateUpdateOptions {
                throughput: Some(*t),
                autoscale_settings: None,
            },
            Self::Autoscale(settings) => CreateUpdateOptions {
                throughput: None,
                autoscale_settings: Some(settings.clone()),
            },
            _ => CreateUpdateOptions::default(),
        }
    }

    /// Payload for a separate throughput update; `None` means no change.
    #[must_use]
    pub fn to_update_payload(&self) -> Option<ThroughputUpdate> {
        match self {
            Self::Fixed(t) if *t != 0 => Some(ThroughputUpdate::Manual { throughput: *t }),
            Self::Autoscale(settings) => Some(ThroughputUpdate::Autoscale {
                settings: settings.clone(),
            }),
            _ => None,
        }
    }

    /// Observed capacity from a throughput response.
    ///
    /// When autoscale settings are reported they win: the throughput the
    /// remote reports alongside them is the current scaled value, not a
    /// manual setting.
    #[must_use]
    pub fn from_remote(settings: &ThroughputSettings) -> Self {
        match (&settings.autoscale_settings, settings.throughput) {
            (Some(autoscale), _) => Self::Autoscale(autoscale.clone()),
            (None, Some(t)) => Self::Fixed(t),
            (None, None) => Self::Unset,
        }
    }
}

/// Reject an update that crosses directly between the provisioned modes.
///
/// Going from manual to autoscale (or back) has to be done as its own step
/// through a throughput migration before the new mode's values are applied.
///
/// # Errors
///
/// Returns [`Error::ConflictingCapacityMode`] on a crossover.
pub fn check_mode_transition(
    database: &str,
    account: &str,
    prior: &Capacity,
    desired: &Capacity,
) -> Result<()> {
    match (prior.mode(), desired.mode()) {
        (Some(from), Some(to)) if from != to => Err(Error::conflicting_capacity_mode(
            database,
            account,
            format!(
                "switching from {from} to {to} throughput in a single update is not supported; \
                 migrate the throughput mode first"
            ),
        )),
        _ => Ok(()),
    }
}

/// Whether the update path needs a separate throughput call.
///
/// An autoscale block without `max_throughput` leaves the current ceiling
/// alone.
#[must_use]
pub fn has_throughput_change(prior: &Capacity, desired: &Capacity) -> bool {
    match desired {
        Capacity::Unset | Capacity::Fixed(0) => false,
        _ if desired.is_autoscale_without_max() => false,
        _ => prior != desired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_from_fields_rejects_both_modes() {
        let result = Capacity::from_fields(
            "orders",
            "acct1",
            Some(400),
            Some(AutoscaleSettings::with_max_throughput(4000)),
        );
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(ErrorKind::ConflictingCapacityMode)
        );
    }

    #[test]
    fn test_from_fields_treats_zero_as_unset() {
        let result = Capacity::from_fields("orders", "acct1", Some(0), None);
        assert_eq!(result.ok(), Some(Capacity::Unset));
    }

    #[test]
    fn test_create_options_are_exclusive() {
        let fixed = Capacity::Fixed(400).to_create_options();
        assert_eq!(fixed.throughput, Some(400));
        assert!(fixed.autoscale_settings.is_none());

        let auto = Capacity::Autoscale(AutoscaleSettings::with_max_throughput(4000))
            .to_create_options();
        assert!(auto.throughput.is_none());
        assert_eq!(
            auto.autoscale_settings,
            Some(AutoscaleSettings::with_max_throughput(4000))
        );

        assert_eq!(Capacity::Unset.to_create_options(), CreateUpdateOptions::default());
        assert_eq!(Capacity::Fixed(0).to_create_options(), CreateUpdateOptions::default());
    }

    #[test]
    fn test_update_payload() {
        assert_eq!(
            Capacity::Fixed(500).to_update_payload(),
            Some(ThroughputUpdate::Manual { throughput: 500 })
        );
        assert!(Capacity::Unset.to_update_payload().is_none());
    }

    #[test]
    fn test_from_remote_prefers_autoscale() {
        let settings = ThroughputSettings {
            throughput: Some(400),
            autoscale_settings: Some(AutoscaleSettings::with_max_throughput(4000)),
        };
        let observed = Capacity::from_remote(&settings);
        assert!(observed.has_autoscale());
        assert!(observed.throughput().is_none());
    }

    #[test]
    fn test_crossover_is_rejected() {
        let auto = Capacity::Autoscale(AutoscaleSettings::with_max_throughput(4000));
        let fixed = Capacity::Fixed(400);

        for (prior, desired) in [(&fixed, &auto), (&auto, &fixed)] {
            let result = check_mode_transition("orders", "acct1", prior, desired);
            assert_eq!(
                result.err().map(|e| e.kind()),
                Some(ErrorKind::ConflictingCapacityMode)
            );
        }

        assert!(check_mode_transition("orders", "acct1", &fixed, &Capacity::Fixed(800)).is_ok());
        assert!(check_mode_transition("orders", "acct1", &Capacity::Unset, &auto).is_ok());
        assert!(check_mode_transition("orders", "acct1", &fixed, &Capacity::Unset).is_ok());
    }

    #[test]
    fn test_throughput_change_detection() {
        assert!(has_throughput_change(&Capacity::Fixed(400), &Capacity::Fixed(800)));
        assert!(!has_throughput_change(&Capacity::Fixed(400), &Capacity::Fixed(400)));
        assert!(!has_throughput_change(&Capacity::Fixed(400), &Capacity::Unset));
    }

    #[test]
    fn test_autoscale_without_max_keeps_prior_ceiling() {
        let prior = Capacity::Autoscale(AutoscaleSettings::with_max_throughput(5000));
        let desired = Capacity::Autoscale(AutoscaleSettings::default());

        assert!(desired.is_autoscale_without_max());
        assert!(!prior.is_autoscale_without_max());
        assert!(!has_throughput_change(&prior, &desired));
        assert!(has_throughput_change(
            &prior,
            &Capacity::Autoscale(AutoscaleSettings::with_max_throughput(6000))
        ));
    }

    #[test]
    fn test_mode_predicates() {
        let fixed = Capacity::Fixed(400);
        let auto = Capacity::Autoscale(AutoscaleSettings::with_max_throughput(4000));

        assert!(fixed.has_fixed_throughput());
        assert!(!fixed.has_autoscale());
        assert!(auto.has_autoscale());
        assert!(!auto.has_fixed_throughput());
        assert!(!Capacity::Unset.has_fixed_throughput());
        assert!(!Capacity::Unset.has_autoscale());
        assert_eq!(fixed.mode(), Some(CapacityMode::Manual));
        assert_eq!(auto.mode(), Some(CapacityMode::Autoscale));
        assert_eq!(Capacity::Unset.mode(), None);
    }
}
