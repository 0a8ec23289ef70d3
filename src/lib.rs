//! State-reconciliation core for an interactive ODE modelling tool
//!
//! Users edit model code, upload data, tweak parameters and trigger
//! long-running computations (compile, run, fit, sensitivity batches). Each
//! concern lives in its own state slice, and a reason-tagged dirty-tracking
//! protocol decides, per pane, whether displayed output is stale and why.
//! The numerics themselves (integration, optimization) live behind the
//! [`runner`] boundary.

pub mod code;
pub mod data;
pub mod error;
pub mod fit;
pub mod link;
pub mod model;
pub mod run;
pub mod runner;
pub mod sensitivity;
pub mod session;
pub mod store;

pub use crate::error::{GenericError, WodinError};
pub use crate::store::{AppEvent, AppKind, AppState};

pub mod prelude {
    pub mod state {
        pub use crate::code::CodeState;
        pub use crate::data::{parse_data, DataError, DataState, FitData};
        pub use crate::fit::{
            CancellationToken, FitError, FitReason, FitState, FitTask, FitUpdateRequiredReasons,
            StepOutcome,
        };
        pub use crate::link::LinkState;
        pub use crate::model::{ArtifactHandle, CompiledModel, ModelState, ParameterDefinition};
        pub use crate::run::{
            ParameterSet, ParameterSetError, RunReason, RunRequiredReasons, RunResult, RunState,
        };
        pub use crate::sensitivity::{
            BatchResult, MultiSensitivityState, Scale, SensitivityReason, SensitivityState,
            SensitivityUpdateRequiredReasons, SettingsError, Variation, VaryingParameterSettings,
        };
    }
    pub mod store {
        pub use crate::store::{
            fan_out, AdvancedSettings, AppEvent, AppKind, AppState, FlagTarget, UpstreamChange,
        };
    }
    pub mod runner {
        pub use crate::runner::{
            FitOptimizer, FitResult, RunOptions, Runner, RunnerError, SimplexFit, Solution,
        };
    }
    pub mod session {
        pub use crate::session::SessionSnapshot;
    }
}
