//! Recoverable conditions the pipeline surfaces instead of failing outright. Collected into a
//! [`WarningsBag`] and returned alongside the success value, per the fatal/recoverable split in
//! the error handling design.

use crate::stacking::model::ConstraintEdge;

#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// C3: a file's extension or contents defeated the best-effort parser. The path still
    /// carries an empty symbol record and remains in the path set.
    ParseIgnored { path: String, reason: String },

    /// C4/C5: a path was moved to a different group because the alternative scored high enough.
    LowConfidenceAssignment {
        path: String,
        from: String,
        to: String,
        confidence: f64,
    },

    /// C6: an edge was dropped while breaking a cycle.
    CycleEdgeDropped { edge: ConstraintEdge },

    /// C5: co-change incorporation wanted historical data that wasn't available for some pair.
    MissingCochangeData { reason: String },
}

/// Ordered collection of warnings accumulated across C3–C6. Order of insertion is preserved;
/// nothing here ever aborts the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarningsBag(Vec<Warning>);

impl WarningsBag {
    pub fn new() -> Self {
        WarningsBag(Vec::new())
    }

    pub fn push(&mut self, warning: Warning) {
        self.0.push(warning);
    }

    pub fn push_parse_ignored(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.push(Warning::ParseIgnored {
            path: path.into(),
            reason: reason.into(),
        });
    }

    pub fn push_reassignment(
        &mut self,
        path: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        confidence: f64,
    ) {
        self.push(Warning::LowConfidenceAssignment {
            path: path.into(),
            from: from.into(),
            to: to.into(),
            confidence,
        });
    }

    pub fn push_cycle_edge_dropped(&mut self, edge: ConstraintEdge) {
        self.push(Warning::CycleEdgeDropped { edge });
    }

    pub fn push_missing_cochange(&mut self, reason: impl Into<String>) {
        self.push(Warning::MissingCochangeData {
            reason: reason.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn extend(&mut self, other: WarningsBag) {
        self.0.extend(other.0);
    }
}
