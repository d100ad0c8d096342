//! Source status reporting

use crate::Result;

/// Where the consumer reports whether the source database is reachable.
///
/// Reporting is best-effort: callers log failures and keep processing.
pub trait SourceContext: Send + Sync {
    fn set_ok(&self) -> Result<()>;

    fn set_error(&self, reason: &str) -> Result<()>;
}

/// Context that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContext;

impl SourceContext for NoopContext {
    fn set_ok(&self) -> Result<()> {
        Ok(())
    }

    fn set_error(&self, _reason: &str) -> Result<()> {
        Ok(())
    }
}
