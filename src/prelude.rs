//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use pixelpress::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{PxpError, Result};

// Catalog
pub use crate::catalog::{CATALOG, ContextEntry, ContextId};

// Validation
pub use crate::validate::{ImageFormat, RejectReason, UploadCandidate, validate};

// Presentation
pub use crate::present::{ComparisonView, ProcessingStage, format_size, simulated_optimized_size};

// Wizard core
pub use crate::wizard::model::{Stage, WizardCmd, WizardModel, WizardMsg};
pub use crate::wizard::update::update;

// Quota
pub use crate::quota::{Clock, QuotaLedger, SystemClock};

// Session
pub use crate::session::{OptimizeOutcome, RunOutcome, SessionRuntime, optimize_once};
