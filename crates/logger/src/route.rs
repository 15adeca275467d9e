use crate::level::Severity;

/// Which of the two sinks a record is destined for.
///
/// The routes partition every severity at or above the configured floor:
/// anything below [`Severity::Warn`] goes to the info sink, everything else
/// to the warn sink. Nothing is ever written to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Info,
    Warn,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Info, Route::Warn];

    /// Route predicate: does this route accept a record at `severity`
    /// given the process-wide minimum `floor`?
    pub fn accepts(self, severity: Severity, floor: Severity) -> bool {
        if severity < floor {
            return false;
        }
        match self {
            Route::Info => severity < Severity::Warn,
            Route::Warn => severity >= Severity::Warn,
        }
    }

    /// The single route accepting `severity`, or `None` when it falls
    /// below the floor.
    pub fn for_severity(severity: Severity, floor: Severity) -> Option<Route> {
        Route::ALL
            .into_iter()
            .find(|route| route.accepts(severity, floor))
    }
}
