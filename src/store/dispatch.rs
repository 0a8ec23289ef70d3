//! The reason-propagation fan-out table
//!
//! Declares, in one place, exactly which downstream reason flags each
//! upstream change dirties. Fan-out is a broadcast: a single upstream change
//! sets its flag on every listed slice independently, and clearing one
//! slice's flag (by rerunning that slice) never clears the others.

use crate::fit::FitReason;
use crate::run::RunReason;
use crate::sensitivity::SensitivityReason;

/// An upstream change kind, as classified by the store's reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamChange {
    ModelChanged,
    ParameterValueChanged,
    EndTimeChanged,
    NumberOfReplicatesChanged,
    DataChanged,
    LinkChanged,
    ParameterToVaryChanged,
    AdvancedSettingsChanged,
    SensitivityOptionsChanged,
    MultiSensitivityOptionsChanged,
}

/// A single reason flag on a single downstream slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget {
    Run(RunReason),
    Fit(FitReason),
    Sensitivity(SensitivityReason),
    MultiSensitivity(SensitivityReason),
}

/// Downstream flags dirtied by one upstream change
///
/// Fit targets are ignored outside fit apps when the store applies them.
pub fn fan_out(change: UpstreamChange) -> &'static [FlagTarget] {
    use FlagTarget::*;
    match change {
        UpstreamChange::ModelChanged => &[
            Run(RunReason::ModelChanged),
            Fit(FitReason::ModelChanged),
            Sensitivity(SensitivityReason::ModelChanged),
            MultiSensitivity(SensitivityReason::ModelChanged),
        ],
        UpstreamChange::ParameterValueChanged => &[
            Run(RunReason::ParameterValueChanged),
            Fit(FitReason::ParameterValueChanged),
            Sensitivity(SensitivityReason::ParameterValueChanged),
            MultiSensitivity(SensitivityReason::ParameterValueChanged),
        ],
        UpstreamChange::EndTimeChanged => &[
            Run(RunReason::EndTimeChanged),
            Sensitivity(SensitivityReason::EndTimeChanged),
            MultiSensitivity(SensitivityReason::EndTimeChanged),
        ],
        UpstreamChange::NumberOfReplicatesChanged => &[
            Run(RunReason::NumberOfReplicatesChanged),
            Sensitivity(SensitivityReason::NumberOfReplicatesChanged),
            MultiSensitivity(SensitivityReason::NumberOfReplicatesChanged),
        ],
        UpstreamChange::DataChanged => &[Fit(FitReason::DataChanged)],
        UpstreamChange::LinkChanged => &[
            Fit(FitReason::LinkChanged),
            Sensitivity(SensitivityReason::LinkChanged),
            MultiSensitivity(SensitivityReason::LinkChanged),
        ],
        UpstreamChange::ParameterToVaryChanged => &[Fit(FitReason::ParameterToVaryChanged)],
        UpstreamChange::AdvancedSettingsChanged => &[
            Fit(FitReason::AdvancedSettingsChanged),
            Sensitivity(SensitivityReason::AdvancedSettingsChanged),
            MultiSensitivity(SensitivityReason::AdvancedSettingsChanged),
        ],
        UpstreamChange::SensitivityOptionsChanged => {
            &[Sensitivity(SensitivityReason::SensitivityOptionsChanged)]
        }
        UpstreamChange::MultiSensitivityOptionsChanged => {
            &[MultiSensitivity(SensitivityReason::SensitivityOptionsChanged)]
        }
    }
}
