//! Flag store port: persistence for the single override flag.

use std::future::Future;

use climacal_domain::error::ClimateError;
use climacal_domain::flag::OverrideFlag;

/// Repository holding at most one [`OverrideFlag`].
pub trait FlagStore {
    /// Load the persisted flag, if any.
    fn load(&self) -> impl Future<Output = Result<Option<OverrideFlag>, ClimateError>> + Send;

    /// Persist `flag`, replacing the previous one. `None` clears it.
    fn save(
        &self,
        flag: Option<OverrideFlag>,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send;
}

impl<T: FlagStore + Send + Sync> FlagStore for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<Option<OverrideFlag>, ClimateError>> + Send {
        (**self).load()
    }

    fn save(
        &self,
        flag: Option<OverrideFlag>,
    ) -> impl Future<Output = Result<(), ClimateError>> + Send {
        (**self).save(flag)
    }
}
